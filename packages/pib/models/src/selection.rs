//! The user's filter selection as a plain record.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MunicipalityCode, UnitCode, ViewMode, YearRange};

/// A resolved filter selection.
///
/// `municipality_codes` is always a subset of the municipalities that
/// belong to `unit_codes`; `None` means every municipality of the selected
/// units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    /// Inclusive range of fiscal years.
    pub year_range: YearRange,
    /// Selected federative units.
    pub unit_codes: BTreeSet<UnitCode>,
    /// Explicitly selected municipalities.
    pub municipality_codes: Option<BTreeSet<MunicipalityCode>>,
    /// Whether values are total GDP or GDP per capita.
    pub view_mode: ViewMode,
    /// Number of municipalities in each ranking.
    pub ranking_size: usize,
    /// Whether capitals are marked in rankings.
    pub highlight_capitals: bool,
}

/// Human-readable description of the active filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    /// `start-end`.
    pub period: String,
    /// `ALL` or the comma-joined unit abbreviations.
    pub units: String,
    /// `ALL` or `N selected`.
    pub municipalities: String,
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Period: {} | Units: {} | Municipalities: {}",
            self.period, self.units, self.municipalities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_as_one_line() {
        let summary = FilterSummary {
            period: "2015-2020".to_string(),
            units: "ALL".to_string(),
            municipalities: "3 selected".to_string(),
        };
        assert_eq!(
            summary.to_string(),
            "Period: 2015-2020 | Units: ALL | Municipalities: 3 selected"
        );
    }
}
