//! The dashboard pipeline: filter state, cached fact loading, aggregation.
//!
//! Every request rebuilds a [`FilterState`] from its query parameters
//! against the current catalog snapshot, resolves it to a municipality
//! code set, loads the (cached) fact table and runs the aggregation
//! engine over it.

use pib_dashboard_analytics::{
    final_year_slice, geographic_rollup, kpis, ranking, sector_composition, time_series,
};
use pib_dashboard_analytics_models::{KpiReport, RankingOrder};
use pib_dashboard_catalog::Catalog;
use pib_dashboard_filter::{FilterError, FilterState};
use pib_dashboard_loader::{FactLoader, LoadError, LoadedFacts};
use pib_dashboard_pib_models::ViewMode;
use pib_dashboard_server_models::{DashboardQueryParams, DashboardResponse, Notice};

/// Errors that can occur while building a dashboard.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// A query parameter has an unusable value.
    #[error("Invalid parameter {name}: {value:?}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The filters are inconsistent.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Facts could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl DashboardError {
    /// Whether the failure comes from the request rather than from storage.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. } | Self::Filter(FilterError::InvalidYearRange { .. })
        )
    }

    /// Whether repeating the request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Load(e) | Self::Filter(FilterError::Load(e)) => e.is_retryable(),
            Self::InvalidParameter { .. } | Self::Filter(FilterError::InvalidYearRange { .. }) => {
                false
            }
        }
    }
}

/// Applies `params` to a fresh filter state.
///
/// # Errors
///
/// * [`DashboardError::InvalidParameter`] for an unknown view mode
/// * [`DashboardError::Filter`] for an inverted year range or if the
///   municipality catalog cannot be loaded
pub async fn build_filter(
    catalog: &Catalog,
    loader: &FactLoader,
    params: &DashboardQueryParams,
) -> Result<FilterState, DashboardError> {
    let mut state = FilterState::new(catalog.snapshot().await);

    if params.from.is_some() || params.to.is_some() {
        let current = state.year_range();
        state.set_year_range(
            params.from.unwrap_or(current.start),
            params.to.unwrap_or(current.end),
        )?;
    }

    state.set_units(&params.unit_list());
    state
        .set_municipalities(&params.municipality_list(), loader)
        .await?;

    if let Some(view) = params.view.as_deref() {
        let view_mode: ViewMode =
            view.trim()
                .parse()
                .map_err(|_| DashboardError::InvalidParameter {
                    name: "view",
                    value: view.to_string(),
                })?;
        state.set_view_mode(view_mode);
    }
    if let Some(size) = params.ranking {
        state.set_ranking_size(size);
    }
    if let Some(highlight) = params.highlight_capitals {
        state.set_highlight_capitals(highlight);
    }

    Ok(state)
}

/// Resolves `state` and loads its fact table.
///
/// # Errors
///
/// Returns [`DashboardError`] if the municipality catalog or the facts
/// cannot be loaded.
pub async fn load(
    state: &mut FilterState,
    loader: &FactLoader,
) -> Result<(LoadedFacts, bool), DashboardError> {
    let codes = state.resolve_municipality_codes(loader).await?;
    let loaded = loader.load_facts(state.year_range(), &codes).await?;
    Ok((loaded, codes.is_empty()))
}

/// Runs the whole pipeline for `params`.
///
/// # Errors
///
/// Returns [`DashboardError`] if the filters are invalid or data cannot be
/// loaded.
pub async fn run(
    catalog: &Catalog,
    loader: &FactLoader,
    params: &DashboardQueryParams,
) -> Result<DashboardResponse, DashboardError> {
    let mut state = build_filter(catalog, loader, params).await?;
    let (loaded, empty_selection) = load(&mut state, loader).await?;

    let range = state.year_range();
    let view_mode = state.view_mode();
    let facts = loaded.facts.as_slice();
    let final_year = final_year_slice(facts, range.end);

    let report = kpis(facts, range);
    let notice = if empty_selection {
        Some(Notice::EmptySelection)
    } else if facts.is_empty() {
        Some(Notice::NoRows)
    } else if let KpiReport::NoDataForFinalYear { year } = report {
        Some(Notice::NoDataForFinalYear { year })
    } else {
        None
    };
    if let Some(notice) = notice {
        log::debug!("{} ({})", notice.message(), state.summary());
    }

    let top = ranking(
        &final_year,
        view_mode,
        state.ranking_size(),
        RankingOrder::Top,
        state.highlight_capitals(),
    );
    let bottom = params.bottom.unwrap_or(false).then(|| {
        ranking(
            &final_year,
            view_mode,
            state.ranking_size(),
            RankingOrder::Bottom,
            state.highlight_capitals(),
        )
    });

    Ok(DashboardResponse {
        fingerprint: loaded.fingerprint.to_string(),
        selection: state.selection(),
        summary: state.summary(),
        notice,
        row_count: facts.len(),
        kpis: report,
        time_series: time_series(facts, view_mode),
        ranking: top,
        bottom_ranking: bottom,
        sector_composition: sector_composition(&final_year),
        geographic_rollup: geographic_rollup(&final_year, view_mode),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use pib_dashboard_database::PibStore;
    use pib_dashboard_database::memory::MemoryStore;
    use pib_dashboard_loader::LoaderSettings;
    use pib_dashboard_pib_models::{Municipality, Sector};

    use super::*;

    fn municipality(code: i64, name: &str, unit_code: i32, is_capital: bool) -> Municipality {
        Municipality {
            code,
            name: name.to_string(),
            unit_code,
            is_capital,
            longitude: Some(-46.0),
            latitude: Some(-23.0),
        }
    }

    fn store() -> Arc<MemoryStore> {
        let mut store = MemoryStore::new()
            .with_unit(35, "SP", "São Paulo")
            .with_unit(33, "RJ", "Rio de Janeiro")
            .with_municipality(municipality(3_550_308, "São Paulo", 35, true))
            .with_municipality(municipality(3_509_502, "Campinas", 35, false))
            .with_municipality(municipality(3_548_500, "Santos", 35, false))
            .with_municipality(municipality(3_304_557, "Rio de Janeiro", 33, true));
        for year in 2015..=2020 {
            let growth = f64::from(year - 2015);
            store = store
                .with_fact(year, 3_550_308, 700.0 + growth, 50.0, [1.0, 150.0, 500.0, 49.0])
                .with_fact(year, 3_509_502, 70.0, 35.0, [2.0, 30.0, 30.0, 8.0])
                .with_fact(year, 3_304_557, 350.0, 50.0, [1.0, 80.0, 220.0, 49.0]);
        }
        // Santos has no fact in the final year.
        store = store.with_fact(2015, 3_548_500, 40.0, 90.0, [1.0, 10.0, 25.0, 4.0]);
        Arc::new(store)
    }

    async fn pipeline(store: &Arc<MemoryStore>) -> (Catalog, FactLoader) {
        let catalog = Catalog::load(
            Arc::clone(store) as Arc<dyn PibStore>,
            pib_dashboard_catalog::DEFAULT_REFRESH_INTERVAL,
        )
        .await
        .unwrap();
        let loader = FactLoader::new(
            Arc::clone(store) as Arc<dyn PibStore>,
            LoaderSettings::default(),
        );
        (catalog, loader)
    }

    fn params(from: i32, to: i32, units: &str, municipalities: &str) -> DashboardQueryParams {
        DashboardQueryParams {
            from: Some(from),
            to: Some(to),
            units: Some(units.to_string()),
            municipalities: Some(municipalities.to_string()),
            ..DashboardQueryParams::default()
        }
    }

    #[tokio::test]
    async fn sao_paulo_wildcard_scenario() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let response = run(&catalog, &loader, &params(2015, 2020, "SP", ""))
            .await
            .unwrap();

        let kpis = response.kpis.kpis().unwrap().clone();
        // São Paulo and Campinas have 2020 rows; Santos only has 2015.
        assert_eq!(kpis.municipality_count, 2);
        // Industry 180, services 530, agriculture 3.
        assert_eq!(kpis.dominant_sector, Sector::Services);
        assert!((kpis.total_gdp - 775.0).abs() < 1e-9);
        let start_total = 700.0 + 70.0 + 40.0;
        let expected_delta = (775.0 - start_total) / start_total * 100.0;
        assert!((kpis.delta_pct.unwrap() - expected_delta).abs() < 1e-9);

        assert_eq!(response.selection.unit_codes, BTreeSet::from([35]));
        assert_eq!(response.selection.municipality_codes, None);
        assert_eq!(response.summary.units, "SP");
        assert_eq!(response.summary.municipalities, "ALL");
        assert_eq!(response.notice, None);
        assert_eq!(response.time_series.len(), 6);
        assert_eq!(response.ranking.entries[0].display_name, "São Paulo 🏛️");
        assert!(response.bottom_ranking.is_none());
    }

    #[tokio::test]
    async fn identical_requests_share_the_cached_fetch() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let first = run(&catalog, &loader, &params(2018, 2020, "SP,RJ", ""))
            .await
            .unwrap();
        let second = run(&catalog, &loader, &params(2018, 2020, "RJ, SP", ""))
            .await
            .unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(store.calls.facts.load(Ordering::SeqCst), 1);
        assert_eq!(store.calls.municipalities.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn view_ranking_and_bottom_parameters_apply() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let response = run(
            &catalog,
            &loader,
            &DashboardQueryParams {
                view: Some("per_capita".to_string()),
                ranking: Some(1),
                highlight_capitals: Some(false),
                bottom: Some(true),
                ..params(2020, 2020, "ALL", "")
            },
        )
        .await
        .unwrap();

        assert_eq!(response.selection.view_mode, ViewMode::PerCapita);
        assert_eq!(response.ranking.entries.len(), 1);
        assert_eq!(response.ranking.entries[0].display_name, "Rio de Janeiro");
        let bottom = response.bottom_ranking.unwrap();
        assert_eq!(bottom.entries[0].name, "Campinas");
        // Single-year range: no delta.
        assert_eq!(response.kpis.kpis().unwrap().delta_pct, None);
    }

    #[tokio::test]
    async fn missing_final_year_is_a_notice() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let response = run(&catalog, &loader, &params(2015, 2020, "SP", "Santos"))
            .await
            .unwrap();

        assert_eq!(
            response.notice,
            Some(Notice::NoDataForFinalYear { year: 2020 })
        );
        assert_eq!(response.row_count, 1);
        assert!(response.ranking.entries.is_empty());
    }

    #[tokio::test]
    async fn unmatched_municipalities_are_an_empty_selection() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let response = run(&catalog, &loader, &params(2015, 2020, "SP", "Atlantis"))
            .await
            .unwrap();

        assert_eq!(response.notice, Some(Notice::EmptySelection));
        assert_eq!(response.row_count, 0);
        assert_eq!(store.calls.facts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inverted_range_is_a_client_error() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let err = run(&catalog, &loader, &params(2020, 2015, "SP", ""))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_view_is_a_client_error() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        let err = run(
            &catalog,
            &loader,
            &DashboardQueryParams {
                view: Some("MEDIAN".to_string()),
                ..DashboardQueryParams::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DashboardError::InvalidParameter { name: "view", .. }));
    }

    #[tokio::test]
    async fn storage_failure_is_retryable() {
        let store = store();
        let (catalog, loader) = pipeline(&store).await;

        store.set_unavailable(true);
        let err = run(&catalog, &loader, &params(2015, 2020, "SP", ""))
            .await
            .unwrap_err();

        assert!(!err.is_client_error());
        assert!(err.is_retryable());
    }
}
