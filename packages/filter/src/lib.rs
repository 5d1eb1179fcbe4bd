#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-session filter state.
//!
//! The selection is hierarchical: years, then federative units, then
//! municipalities of those units. Changing the unit set invalidates the
//! derived municipality catalog and drops selected municipalities that no
//! longer belong to it, so the selection never points at an excluded
//! municipality.
//!
//! An empty municipality selection is a wildcard meaning every
//! municipality of the selected units.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pib_dashboard_catalog::CatalogSnapshot;
use pib_dashboard_loader::{LoadError, MunicipalityDirectory};
use pib_dashboard_pib_models::{
    FilterSelection, FilterSummary, Municipality, MunicipalityCode, UnitCode, ViewMode, Year,
    YearRange,
};

/// Sentinel selecting every federative unit.
pub const ALL: &str = "ALL";

/// Ranking size of a fresh selection.
pub const DEFAULT_RANKING_SIZE: usize = 10;

/// Largest accepted ranking size.
pub const MAX_RANKING_SIZE: usize = 30;

/// Number of years before the newest one selected by default.
pub const DEFAULT_YEAR_SPAN: Year = 5;

/// Errors that can occur while updating the filter state.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The range starts after it ends.
    #[error("Invalid year range: {start} is after {end}")]
    InvalidYearRange {
        /// Requested first year.
        start: Year,
        /// Requested last year.
        end: Year,
    },

    /// The municipality catalog could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Clone, PartialEq)]
enum MunicipalitySelection {
    /// Every municipality of the selected units.
    All,
    /// Explicitly chosen municipalities, keyed by code.
    Only(BTreeMap<MunicipalityCode, Municipality>),
}

/// The user's current selection plus the municipality catalog derived from
/// the selected units.
#[derive(Debug, Clone)]
pub struct FilterState {
    catalog: Arc<CatalogSnapshot>,
    year_range: YearRange,
    unit_codes: BTreeSet<UnitCode>,
    municipalities: MunicipalitySelection,
    view_mode: ViewMode,
    ranking_size: usize,
    highlight_capitals: bool,
    municipality_catalog: Option<Arc<Vec<Municipality>>>,
}

impl FilterState {
    /// A fresh selection: the last [`DEFAULT_YEAR_SPAN`] years up to the
    /// newest one, every unit, every municipality, total GDP, top 10 with
    /// capitals highlighted.
    #[must_use]
    pub fn new(catalog: Arc<CatalogSnapshot>) -> Self {
        let max = catalog.max_year();
        let min = catalog.min_year();
        let unit_codes = catalog.all_unit_codes();

        Self {
            year_range: YearRange {
                start: (max - DEFAULT_YEAR_SPAN).max(min),
                end: max,
            },
            unit_codes,
            catalog,
            municipalities: MunicipalitySelection::All,
            view_mode: ViewMode::default(),
            ranking_size: DEFAULT_RANKING_SIZE,
            highlight_capitals: true,
            municipality_catalog: None,
        }
    }

    /// Selected range of fiscal years.
    #[must_use]
    pub const fn year_range(&self) -> YearRange {
        self.year_range
    }

    /// Selected federative units.
    #[must_use]
    pub const fn unit_codes(&self) -> &BTreeSet<UnitCode> {
        &self.unit_codes
    }

    /// Active metric.
    #[must_use]
    pub const fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Number of municipalities in each ranking.
    #[must_use]
    pub const fn ranking_size(&self) -> usize {
        self.ranking_size
    }

    /// Whether capitals are marked in rankings.
    #[must_use]
    pub const fn highlight_capitals(&self) -> bool {
        self.highlight_capitals
    }

    /// Whether the municipality selection is the wildcard.
    #[must_use]
    pub const fn is_all_municipalities(&self) -> bool {
        matches!(self.municipalities, MunicipalitySelection::All)
    }

    /// Sets the year range, clamping both ends to the available years.
    ///
    /// Returns the range actually applied.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidYearRange`] if `start > end`; the
    /// previous range is kept.
    pub fn set_year_range(&mut self, start: Year, end: Year) -> Result<YearRange, FilterError> {
        if start > end {
            return Err(FilterError::InvalidYearRange { start, end });
        }

        let min = self.catalog.min_year();
        let max = self.catalog.max_year();
        self.year_range = YearRange {
            start: start.clamp(min, max),
            end: end.clamp(min, max),
        };
        Ok(self.year_range)
    }

    /// Selects federative units by abbreviation.
    ///
    /// An empty selection, or one containing [`ALL`], selects every unit.
    /// Unknown abbreviations are ignored. When the unit set changes, the
    /// derived municipality catalog is dropped and selected municipalities
    /// of deselected units are removed; if that empties the selection it
    /// falls back to the wildcard.
    pub fn set_units<S: AsRef<str>>(&mut self, selected: &[S]) {
        let wants_all = selected.is_empty()
            || selected
                .iter()
                .any(|s| s.as_ref().trim().eq_ignore_ascii_case(ALL));

        let unit_codes = if wants_all {
            self.catalog.all_unit_codes()
        } else {
            selected
                .iter()
                .filter_map(|abbr| {
                    let unit = self.catalog.unit_by_abbreviation(abbr.as_ref());
                    if unit.is_none() {
                        log::warn!("Ignoring unknown federative unit '{}'", abbr.as_ref());
                    }
                    unit.map(|u| u.code)
                })
                .collect()
        };

        if unit_codes == self.unit_codes {
            return;
        }

        self.unit_codes = unit_codes;
        self.municipality_catalog = None;

        if let MunicipalitySelection::Only(selected) = &mut self.municipalities {
            let before = selected.len();
            selected.retain(|_, m| self.unit_codes.contains(&m.unit_code));
            let dropped = before - selected.len();
            if dropped > 0 {
                log::debug!("Dropped {dropped} municipalities outside the new unit selection");
                if selected.is_empty() {
                    self.municipalities = MunicipalitySelection::All;
                }
            }
        }
    }

    /// Municipalities of the selected units, ordered by name.
    ///
    /// Derived once per unit selection.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Load`] if the list cannot be fetched.
    pub async fn municipalities_for_current_units(
        &mut self,
        directory: &dyn MunicipalityDirectory,
    ) -> Result<Arc<Vec<Municipality>>, FilterError> {
        if let Some(list) = &self.municipality_catalog {
            return Ok(Arc::clone(list));
        }

        let list = directory.municipalities_for_units(&self.unit_codes).await?;
        self.municipality_catalog = Some(Arc::clone(&list));
        Ok(list)
    }

    /// Drops the derived municipality catalog so the next lookup re-reads
    /// it from `directory`.
    pub fn invalidate_municipality_catalog(&mut self) {
        self.municipality_catalog = None;
    }

    /// Selects municipalities by name within the selected units.
    ///
    /// An empty selection is the wildcard. A name shared by municipalities
    /// of different units selects all of them. Unknown names are ignored,
    /// so a selection made only of unknown names matches nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Load`] if the municipality catalog cannot be
    /// fetched.
    pub async fn set_municipalities<S: AsRef<str>>(
        &mut self,
        names: &[S],
        directory: &dyn MunicipalityDirectory,
    ) -> Result<(), FilterError> {
        let names: BTreeSet<&str> = names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .collect();

        if names.is_empty() {
            self.municipalities = MunicipalitySelection::All;
            return Ok(());
        }

        let catalog = self.municipalities_for_current_units(directory).await?;
        let mut selected = BTreeMap::new();
        for name in names {
            let before = selected.len();
            selected.extend(
                catalog
                    .iter()
                    .filter(|m| m.name == name)
                    .map(|m| (m.code, m.clone())),
            );
            if selected.len() == before {
                log::warn!("Ignoring unknown municipality '{name}'");
            }
        }

        self.municipalities = MunicipalitySelection::Only(selected);
        Ok(())
    }

    /// Codes of the municipalities the selection covers.
    ///
    /// The wildcard yields every municipality of the selected units.
    /// Selected municipalities that are missing from the current catalog
    /// are removed from the selection and logged.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Load`] if the municipality catalog cannot be
    /// fetched.
    pub async fn resolve_municipality_codes(
        &mut self,
        directory: &dyn MunicipalityDirectory,
    ) -> Result<BTreeSet<MunicipalityCode>, FilterError> {
        let catalog = self.municipalities_for_current_units(directory).await?;
        let available: BTreeSet<MunicipalityCode> = catalog.iter().map(|m| m.code).collect();

        let MunicipalitySelection::Only(selected) = &mut self.municipalities else {
            return Ok(available);
        };

        let outside: Vec<MunicipalityCode> = selected
            .keys()
            .filter(|code| !available.contains(code))
            .copied()
            .collect();

        if !outside.is_empty() {
            log::error!(
                "Municipality selection {outside:?} is outside units {:?}; re-deriving it",
                self.unit_codes
            );
            selected.retain(|code, _| available.contains(code));
            if selected.is_empty() {
                self.municipalities = MunicipalitySelection::All;
                return Ok(available);
            }
        }

        Ok(selected.keys().copied().collect())
    }

    /// Switches between total GDP and GDP per capita.
    pub const fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    /// Sets the ranking size, clamped to `1..=MAX_RANKING_SIZE`. Returns
    /// the size applied.
    pub fn set_ranking_size(&mut self, size: usize) -> usize {
        self.ranking_size = size.clamp(1, MAX_RANKING_SIZE);
        self.ranking_size
    }

    /// Turns capital marking in rankings on or off.
    pub const fn set_highlight_capitals(&mut self, highlight: bool) {
        self.highlight_capitals = highlight;
    }

    /// The selection as a plain record.
    #[must_use]
    pub fn selection(&self) -> FilterSelection {
        FilterSelection {
            year_range: self.year_range,
            unit_codes: self.unit_codes.clone(),
            municipality_codes: match &self.municipalities {
                MunicipalitySelection::All => None,
                MunicipalitySelection::Only(selected) => Some(selected.keys().copied().collect()),
            },
            view_mode: self.view_mode,
            ranking_size: self.ranking_size,
            highlight_capitals: self.highlight_capitals,
        }
    }

    /// One-line description of the active filters.
    #[must_use]
    pub fn summary(&self) -> FilterSummary {
        let all_units = self.catalog.all_unit_codes();
        let units = if !all_units.is_empty() && self.unit_codes == all_units {
            ALL.to_string()
        } else {
            self.catalog
                .units
                .iter()
                .filter(|u| self.unit_codes.contains(&u.code))
                .map(|u| u.abbreviation.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let municipalities = match &self.municipalities {
            MunicipalitySelection::All => ALL.to_string(),
            MunicipalitySelection::Only(selected) => format!("{} selected", selected.len()),
        };

        FilterSummary {
            period: self.year_range.to_string(),
            units,
            municipalities,
        }
    }
}
