#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the GDP dashboard server.
//!
//! These types are serialized to JSON for the REST API. They wrap the
//! aggregate records of the analytics engine so the API contract can
//! evolve independently of the engine.

use chrono::{DateTime, Utc};
use pib_dashboard_cache::CacheStats;
use pib_dashboard_analytics_models::{
    GeographicRollup, KpiReport, Ranking, SectorComposition, TimeSeriesPoint,
};
use pib_dashboard_pib_models::{FederativeUnit, FilterSelection, FilterSummary, Year};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Counters of the fact-table cache.
    pub fact_cache: CacheStats,
    /// Counters of the municipality-list cache.
    pub municipality_cache: CacheStats,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable description.
    pub error: String,
    /// Whether repeating the request may succeed.
    pub retryable: bool,
}

/// Reference dimensions served to the filter widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCatalog {
    /// Years with facts, newest first.
    pub years: Vec<Year>,
    /// Federative units ordered by abbreviation.
    pub units: Vec<FederativeUnit>,
    /// When the catalog was last read from storage.
    pub refreshed_at: DateTime<Utc>,
}

/// Query parameters for the municipalities endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityQueryParams {
    /// Comma-separated unit abbreviations, or `ALL`.
    pub units: Option<String>,
}

/// Query parameters shared by the dashboard and export endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQueryParams {
    /// First year of the range.
    pub from: Option<Year>,
    /// Last year of the range.
    pub to: Option<Year>,
    /// Comma-separated unit abbreviations, or `ALL`.
    pub units: Option<String>,
    /// Comma-separated municipality names. Empty means all.
    pub municipalities: Option<String>,
    /// `TOTAL` or `PER_CAPITA`.
    pub view: Option<String>,
    /// Number of ranked municipalities.
    pub ranking: Option<usize>,
    /// Whether to mark capitals in rankings.
    pub highlight_capitals: Option<bool>,
    /// Whether to include the bottom-N ranking.
    pub bottom: Option<bool>,
}

/// Splits a comma-separated parameter into trimmed, non-empty items.
#[must_use]
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl MunicipalityQueryParams {
    /// The requested unit abbreviations.
    #[must_use]
    pub fn unit_list(&self) -> Vec<String> {
        split_list(self.units.as_deref())
    }
}

impl DashboardQueryParams {
    /// The requested unit abbreviations.
    #[must_use]
    pub fn unit_list(&self) -> Vec<String> {
        split_list(self.units.as_deref())
    }

    /// The requested municipality names.
    #[must_use]
    pub fn municipality_list(&self) -> Vec<String> {
        split_list(self.municipalities.as_deref())
    }
}

/// Informational condition attached to a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notice {
    /// The filters select no municipality.
    EmptySelection,
    /// The final year of the range has no rows.
    #[serde(rename_all = "camelCase")]
    NoDataForFinalYear {
        /// The final year.
        year: Year,
    },
    /// The filters select municipalities but no fact matches them.
    NoRows,
}

impl Notice {
    /// Message shown to the user.
    #[must_use]
    pub fn message(self) -> String {
        match self {
            Self::EmptySelection => "No municipality matches the selected filters.".to_string(),
            Self::NoDataForFinalYear { year } => format!("No data available for {year}."),
            Self::NoRows => "No data found for the selected filters.".to_string(),
        }
    }
}

/// Full dashboard for one filter selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Identifies the selection. Clients drop responses whose fingerprint
    /// no longer matches their current filters.
    pub fingerprint: String,
    pub selection: FilterSelection,
    pub summary: FilterSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    /// Number of fact rows behind this dashboard.
    pub row_count: usize,
    pub kpis: KpiReport,
    pub time_series: Vec<TimeSeriesPoint>,
    pub ranking: Ranking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom_ranking: Option<Ranking>,
    pub sector_composition: SectorComposition,
    pub geographic_rollup: GeographicRollup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_are_trimmed_and_skip_blanks() {
        assert_eq!(
            split_list(Some(" SP, RJ ,,")),
            vec!["SP".to_string(), "RJ".to_string()]
        );
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }

    #[test]
    fn dashboard_params_use_camel_case() {
        let params: DashboardQueryParams = serde_json::from_value(serde_json::json!({
            "from": 2015,
            "highlightCapitals": false,
            "municipalities": "Campinas,Santos",
        }))
        .unwrap();

        assert_eq!(params.from, Some(2015));
        assert_eq!(params.highlight_capitals, Some(false));
        assert_eq!(params.municipality_list(), vec!["Campinas", "Santos"]);
    }

    #[test]
    fn notices_are_tagged_by_kind() {
        let json = serde_json::to_value(Notice::NoDataForFinalYear { year: 2020 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "NO_DATA_FOR_FINAL_YEAR", "year": 2020 })
        );
        assert_eq!(
            Notice::NoDataForFinalYear { year: 2020 }.message(),
            "No data available for 2020."
        );
    }
}
