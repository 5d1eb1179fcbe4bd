#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Municipal GDP fact and reference dimension types.
//!
//! These types describe the three denormalized tables the dashboard reads
//! (yearly GDP facts, municipalities, federative units) and the selector
//! enums that the filter state and the aggregation engine share.

pub mod regions;
pub mod selection;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use regions::Region;
pub use selection::{FilterSelection, FilterSummary};

/// Fiscal year of a GDP record.
pub type Year = i32;

/// IBGE municipality code (with check digit), e.g. `3550308` for São Paulo.
pub type MunicipalityCode = i64;

/// IBGE federative unit code, e.g. `35` for São Paulo.
pub type UnitCode = i32;

/// An inclusive range of fiscal years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRange {
    /// First year of the range.
    pub start: Year,
    /// Last year of the range (the "final year").
    pub end: Year,
}

impl YearRange {
    /// Creates a year range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearRangeError`] if `start > end`.
    pub const fn new(start: Year, end: Year) -> Result<Self, InvalidYearRangeError> {
        if start > end {
            return Err(InvalidYearRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering a single year.
    #[must_use]
    pub const fn single(year: Year) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    /// Whether the range contains no years at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether `year` falls inside the range.
    #[must_use]
    pub const fn contains(&self, year: Year) -> bool {
        year >= self.start && year <= self.end
    }

    /// Whether the range starts and ends on the same year.
    #[must_use]
    pub const fn is_single_year(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Error returned when a year range starts after it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidYearRangeError {
    /// Requested first year.
    pub start: Year,
    /// Requested last year.
    pub end: Year,
}

impl std::fmt::Display for InvalidYearRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid year range {}-{}: start must not be after end",
            self.start, self.end
        )
    }
}

impl std::error::Error for InvalidYearRangeError {}

/// A Brazilian federative unit (state or federal district).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederativeUnit {
    /// IBGE unit code (`cd_uf`).
    pub code: UnitCode,
    /// Two-letter abbreviation (`sigla_uf`), e.g. `"SP"`.
    pub abbreviation: String,
    /// Full name (`nome_uf`).
    pub name: String,
    /// Macro-region the unit belongs to.
    pub region: Option<Region>,
}

/// A municipality as stored in the `municipio` dimension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    /// IBGE municipality code, unique and stable.
    pub code: MunicipalityCode,
    /// Municipality name.
    pub name: String,
    /// Code of the federative unit the municipality belongs to.
    pub unit_code: UnitCode,
    /// Whether the municipality is a state capital.
    pub is_capital: bool,
    /// Seat longitude, when known.
    pub longitude: Option<f64>,
    /// Seat latitude, when known.
    pub latitude: Option<f64>,
}

/// Display mode for GDP values.
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
pub enum ViewMode {
    /// Total GDP.
    #[default]
    Total,
    /// GDP per capita.
    PerCapita,
}

impl ViewMode {
    /// Human-readable label used in chart titles.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Total => "PIB Total",
            Self::PerCapita => "PIB Per Capita",
        }
    }

    /// The value a single fact contributes under this view mode.
    #[must_use]
    pub const fn value_of(self, fact: &GdpFact) -> f64 {
        match self {
            Self::Total => fact.total_gdp,
            Self::PerCapita => fact.gdp_per_capita,
        }
    }
}

/// Economic sector of a value-added breakdown.
///
/// The declaration order is significant: it is the tie-break order when
/// picking a dominant sector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Sector {
    /// Agriculture and livestock (`vl_agropecuaria`).
    Agriculture,
    /// Industry (`vl_industria`).
    Industry,
    /// Services (`vl_servicos`).
    Services,
    /// Public administration (`vl_administracao`).
    PublicAdministration,
}

impl Sector {
    /// Every sector, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Agriculture,
        Self::Industry,
        Self::Services,
        Self::PublicAdministration,
    ];

    /// Sectors eligible to be reported as dominant.
    pub const DOMINANCE_CANDIDATES: [Self; 3] = [Self::Agriculture, Self::Industry, Self::Services];

    /// Portuguese display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Agriculture => "Agropecuária",
            Self::Industry => "Indústria",
            Self::Services => "Serviços",
            Self::PublicAdministration => "Adm. Pública",
        }
    }
}

/// One GDP record for a (municipality, year) pair, joined with the
/// municipality and federative unit attributes needed downstream.
///
/// The struct is flat so it can be written directly as a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdpFact {
    /// Fiscal year.
    pub year: Year,
    /// Municipality code.
    pub municipality_code: MunicipalityCode,
    /// Municipality name.
    pub municipality_name: String,
    /// Whether the municipality is a state capital.
    pub is_capital: bool,
    /// Seat longitude, when known.
    pub longitude: Option<f64>,
    /// Seat latitude, when known.
    pub latitude: Option<f64>,
    /// Federative unit code.
    pub unit_code: UnitCode,
    /// Federative unit abbreviation.
    pub unit_abbreviation: String,
    /// Federative unit name.
    pub unit_name: String,
    /// Macro-region of the unit.
    pub region: Option<Region>,
    /// Total GDP (`vl_pib`).
    pub total_gdp: f64,
    /// GDP per capita (`vl_pib_per_capta`).
    pub gdp_per_capita: f64,
    /// Agriculture value added.
    pub agriculture: f64,
    /// Industry value added.
    pub industry: f64,
    /// Services value added.
    pub services: f64,
    /// Public administration value added.
    pub public_administration: f64,
    /// Total gross value added, when reported.
    pub gross_value_total: Option<f64>,
    /// Taxes net of subsidies, when reported.
    pub subsidies: Option<f64>,
    /// Population estimate. `None` until the loader derives it.
    pub estimated_population: Option<u64>,
}

impl GdpFact {
    /// Value added by `sector`.
    #[must_use]
    pub const fn sector_value(&self, sector: Sector) -> f64 {
        match sector {
            Sector::Agriculture => self.agriculture,
            Sector::Industry => self.industry,
            Sector::Services => self.services,
            Sector::PublicAdministration => self.public_administration,
        }
    }

    /// The estimated population, `0` if it has not been derived.
    #[must_use]
    pub fn population(&self) -> u64 {
        self.estimated_population.unwrap_or(0)
    }

    /// Estimates population as `total_gdp / gdp_per_capita`, truncated.
    ///
    /// Yields `0` whenever the quotient is undefined or not positive
    /// (zero or negative per-capita value, non-finite inputs).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn derive_population(total_gdp: f64, gdp_per_capita: f64) -> u64 {
        if gdp_per_capita.is_nan() || gdp_per_capita <= 0.0 || !total_gdp.is_finite() {
            return 0;
        }
        let estimate = total_gdp / gdp_per_capita;
        if estimate.is_finite() && estimate > 0.0 {
            estimate as u64
        } else {
            0
        }
    }

    /// Fills `estimated_population` if absent. Existing values are kept.
    pub fn ensure_population(&mut self) {
        if self.estimated_population.is_none() {
            self.estimated_population = Some(Self::derive_population(
                self.total_gdp,
                self.gdp_per_capita,
            ));
        }
    }

    /// Whether both coordinates are present.
    #[must_use]
    pub const fn has_coordinates(&self) -> bool {
        self.longitude.is_some() && self.latitude.is_some()
    }
}
