//! Map points and the region → unit rollup.

use std::collections::{BTreeMap, BTreeSet};

use pib_dashboard_analytics_models::{GeoPoint, GeographicRollup, RegionRollup, UnitRollup};
use pib_dashboard_pib_models::{GdpFact, MunicipalityCode, Region, ViewMode};

struct UnitAccumulator<'a> {
    fact: &'a GdpFact,
    value: f64,
    municipalities: BTreeSet<MunicipalityCode>,
}

fn point(fact: &GdpFact, value: f64) -> Option<GeoPoint> {
    Some(GeoPoint {
        municipality_code: fact.municipality_code,
        name: fact.municipality_name.clone(),
        unit_abbreviation: fact.unit_abbreviation.clone(),
        is_capital: fact.is_capital,
        longitude: fact.longitude?,
        latitude: fact.latitude?,
        value,
    })
}

/// Builds the map points and the region → unit hierarchy of a final-year
/// slice.
///
/// Rows missing either coordinate are left out of the points but still
/// count in the rollup. Regions are ordered by code with units of an
/// unknown region last; units are ordered by abbreviation.
#[must_use]
pub fn geographic_rollup(facts: &[GdpFact], view_mode: ViewMode) -> GeographicRollup {
    let points = facts
        .iter()
        .filter_map(|f| point(f, view_mode.value_of(f)))
        .collect();

    // `(false, Some(_))` sorts before `(true, None)`, putting unknown last.
    let mut regions: BTreeMap<(bool, Option<Region>), BTreeMap<&str, UnitAccumulator>> =
        BTreeMap::new();
    for fact in facts {
        let unit = regions
            .entry((fact.region.is_none(), fact.region))
            .or_default()
            .entry(fact.unit_abbreviation.as_str())
            .or_insert_with(|| UnitAccumulator {
                fact,
                value: 0.0,
                municipalities: BTreeSet::new(),
            });
        unit.value += view_mode.value_of(fact);
        unit.municipalities.insert(fact.municipality_code);
    }

    let regions = regions
        .into_iter()
        .map(|((_, region), units)| {
            let units: Vec<UnitRollup> = units
                .into_values()
                .map(|acc| UnitRollup {
                    unit_code: acc.fact.unit_code,
                    unit_abbreviation: acc.fact.unit_abbreviation.clone(),
                    unit_name: acc.fact.unit_name.clone(),
                    value: acc.value,
                    municipality_count: acc.municipalities.len(),
                })
                .collect();
            RegionRollup {
                region,
                value: units.iter().map(|u| u.value).sum(),
                municipality_count: units.iter().map(|u| u.municipality_count).sum(),
                units,
            }
        })
        .collect();

    GeographicRollup { points, regions }
}
