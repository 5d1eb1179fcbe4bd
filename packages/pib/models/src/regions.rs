//! IBGE macro-region utilities.
//!
//! Brazil's 27 federative units group into five macro-regions. The first
//! digit of a unit's IBGE code is its region code, so a region can be
//! derived even when the `cd_regiao` column is missing.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// IBGE federative unit codes for the 26 states + the Federal District.
pub const UNIT_CODES: &[i32] = &[
    11, 12, 13, 14, 15, 16, 17, 21, 22, 23, 24, 25, 26, 27, 28, 29, 31, 32, 33, 35, 41, 42, 43,
    50, 51, 52, 53,
];

/// Brazilian macro-region.
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
pub enum Region {
    /// Code 1.
    #[strum(serialize = "Norte")]
    Norte = 1,
    /// Code 2.
    #[strum(serialize = "Nordeste")]
    Nordeste = 2,
    /// Code 3.
    #[strum(serialize = "Sudeste")]
    Sudeste = 3,
    /// Code 4.
    #[strum(serialize = "Sul")]
    Sul = 4,
    /// Code 5.
    #[strum(serialize = "Centro-Oeste")]
    CentroOeste = 5,
}

impl Region {
    /// Returns the numeric IBGE region code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps an IBGE region code (`cd_regiao`) to a region.
    ///
    /// Returns `None` for unrecognized codes.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Norte),
            2 => Some(Self::Nordeste),
            3 => Some(Self::Sudeste),
            4 => Some(Self::Sul),
            5 => Some(Self::CentroOeste),
            _ => None,
        }
    }

    /// Derives the region from a two-digit IBGE unit code.
    ///
    /// Returns `None` for codes outside [`UNIT_CODES`].
    #[must_use]
    pub fn for_unit_code(unit_code: i32) -> Option<Self> {
        if UNIT_CODES.contains(&unit_code) {
            Self::from_code(unit_code / 10)
        } else {
            None
        }
    }

    /// Resolves a region from the stored region code, falling back to the
    /// unit code when the stored value is missing or unrecognized.
    #[must_use]
    pub fn resolve(region_code: Option<i32>, unit_code: i32) -> Option<Self> {
        region_code
            .and_then(Self::from_code)
            .or_else(|| Self::for_unit_code(unit_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_count() {
        assert_eq!(UNIT_CODES.len(), 27);
    }

    #[test]
    fn every_unit_has_a_region() {
        for code in UNIT_CODES {
            assert!(Region::for_unit_code(*code).is_some(), "no region for {code}");
        }
    }

    #[test]
    fn code_roundtrip() {
        for region in [
            Region::Norte,
            Region::Nordeste,
            Region::Sudeste,
            Region::Sul,
            Region::CentroOeste,
        ] {
            assert_eq!(Region::from_code(region.code()), Some(region));
        }
    }

    #[test]
    fn known_units() {
        assert_eq!(Region::for_unit_code(35), Some(Region::Sudeste));
        assert_eq!(Region::for_unit_code(53), Some(Region::CentroOeste));
        assert_eq!(Region::for_unit_code(43), Some(Region::Sul));
        assert_eq!(Region::for_unit_code(99), None);
        assert_eq!(Region::for_unit_code(18), None);
    }

    #[test]
    fn stored_code_wins_over_derivation() {
        assert_eq!(Region::resolve(Some(2), 35), Some(Region::Nordeste));
        assert_eq!(Region::resolve(Some(9), 35), Some(Region::Sudeste));
        assert_eq!(Region::resolve(None, 21), Some(Region::Nordeste));
    }

    #[test]
    fn display_names() {
        assert_eq!(Region::CentroOeste.to_string(), "Centro-Oeste");
        assert_eq!("Sul".parse::<Region>().unwrap(), Region::Sul);
    }
}
