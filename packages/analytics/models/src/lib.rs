#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate result types produced by the aggregation engine.
//!
//! Each type is a plain record handed to the presentation layer, which
//! turns it into a chart, a metric card or a table. They serialize to
//! camelCase JSON.

use pib_dashboard_pib_models::{MunicipalityCode, Region, Sector, UnitCode, ViewMode, Year};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Marker appended to capital names when capitals are highlighted.
pub const CAPITAL_MARKER: &str = "🏛️";

/// One point of a yearly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Fiscal year.
    pub year: Year,
    /// Sum of total GDP or mean GDP per capita, depending on the view mode.
    pub value: f64,
    /// Percent change from the previous year. Absent for the first year
    /// and when the previous value is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
}

/// Headline indicators over the final-year slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Year of the slice the indicators were computed over.
    pub final_year: Year,
    /// Sum of total GDP in the final year.
    pub total_gdp: f64,
    /// Percent change of total GDP from the first year of the range.
    /// Absent for single-year ranges and when the first-year total is zero.
    pub delta_pct: Option<f64>,
    /// Total GDP divided by the estimated population, `0` without population.
    pub per_capita_avg: f64,
    /// Distinct municipalities with a final-year fact.
    pub municipality_count: usize,
    /// Sector with the largest summed value among agriculture, industry and
    /// services. Ties go to the earlier sector in that order.
    pub dominant_sector: Sector,
}

/// Outcome of a KPI computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KpiReport {
    /// The final year has rows.
    Ready(Kpis),
    /// No row falls in the final year of the range.
    #[serde(rename_all = "camelCase")]
    NoDataForFinalYear {
        /// The final year that had no rows.
        year: Year,
    },
}

impl KpiReport {
    /// The indicators, if the final year had data.
    #[must_use]
    pub const fn kpis(&self) -> Option<&Kpis> {
        match self {
            Self::Ready(kpis) => Some(kpis),
            Self::NoDataForFinalYear { .. } => None,
        }
    }
}

/// Direction of a ranking.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RankingOrder {
    /// Largest values first.
    #[default]
    Top,
    /// Smallest values first.
    Bottom,
}

/// A ranked municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    /// IBGE code with check digit.
    pub municipality_code: MunicipalityCode,
    /// Municipality name as stored.
    pub name: String,
    /// Name shown to the user, with [`CAPITAL_MARKER`] for capitals when
    /// highlighting is on.
    pub display_name: String,
    /// Two-letter abbreviation of the municipality's unit.
    pub unit_abbreviation: String,
    /// Whether the municipality is a state capital.
    pub is_capital: bool,
    /// Total GDP summed over the range, or mean GDP per capita.
    pub value: f64,
}

/// A ranking together with the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    /// Metric the entries were ranked by.
    pub view_mode: ViewMode,
    /// Whether the largest or the smallest values come first.
    pub order: RankingOrder,
    /// At most the requested number of entries, in rank order.
    pub entries: Vec<RankingEntry>,
}

/// Summed value of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorTotal {
    /// Sector the value belongs to.
    pub sector: Sector,
    /// Display label, e.g. `Agropecuária`.
    pub label: String,
    /// Sum of the sector's value over the slice.
    pub value: f64,
}

/// Summed sector values of one federative unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSectorTotals {
    /// IBGE code of the unit.
    pub unit_code: UnitCode,
    /// Two-letter abbreviation of the unit.
    pub unit_abbreviation: String,
    /// One entry per sector, in declared sector order.
    pub sectors: Vec<SectorTotal>,
}

/// Sector breakdown of a slice, aggregated and per unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorComposition {
    /// One entry per sector, in declared sector order.
    pub aggregate: Vec<SectorTotal>,
    /// One entry per unit, ordered by abbreviation.
    pub by_unit: Vec<UnitSectorTotals>,
}

/// A municipality positioned on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// IBGE code with check digit.
    pub municipality_code: MunicipalityCode,
    /// Municipality name.
    pub name: String,
    /// Two-letter abbreviation of the municipality's unit.
    pub unit_abbreviation: String,
    /// Whether the municipality is a state capital.
    pub is_capital: bool,
    /// Degrees east, negative in Brazil.
    pub longitude: f64,
    /// Degrees north.
    pub latitude: f64,
    /// Sum of the metric over the municipality's rows.
    pub value: f64,
}

/// Aggregate of one federative unit inside a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRollup {
    /// IBGE code of the unit.
    pub unit_code: UnitCode,
    /// Two-letter abbreviation of the unit.
    pub unit_abbreviation: String,
    /// Full name of the unit.
    pub unit_name: String,
    /// Sum of the metric over the unit's rows.
    pub value: f64,
    /// Distinct municipalities of the unit.
    pub municipality_count: usize,
}

/// Aggregate of one region, with its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRollup {
    /// `None` collects units whose region is unknown.
    pub region: Option<Region>,
    /// Sum of the metric over the region's units.
    pub value: f64,
    /// Distinct municipalities of the region.
    pub municipality_count: usize,
    /// Units ordered by abbreviation.
    pub units: Vec<UnitRollup>,
}

/// Map points plus the region → unit hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicRollup {
    /// Rows with both coordinates present.
    pub points: Vec<GeoPoint>,
    /// Regions in code order, unknown region last.
    pub regions: Vec<RegionRollup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kpi_report_is_tagged_by_status() {
        let json = serde_json::to_value(KpiReport::NoDataForFinalYear { year: 2021 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "NO_DATA_FOR_FINAL_YEAR", "year": 2021 })
        );
    }

    #[test]
    fn absent_growth_rate_is_omitted() {
        let json = serde_json::to_value(TimeSeriesPoint {
            year: 2020,
            value: 1.0,
            growth_rate: None,
        })
        .unwrap();
        assert!(json.get("growthRate").is_none());
    }

    #[test]
    fn ranking_order_parses_case_insensitively() {
        assert_eq!(
            "bottom".parse::<RankingOrder>().unwrap(),
            RankingOrder::Bottom
        );
        assert_eq!(RankingOrder::Top.to_string(), "TOP");
    }
}
