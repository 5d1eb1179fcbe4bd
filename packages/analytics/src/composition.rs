//! Sector breakdown, aggregated and per federative unit.

use std::collections::BTreeMap;

use pib_dashboard_analytics_models::{SectorComposition, SectorTotal, UnitSectorTotals};
use pib_dashboard_pib_models::{GdpFact, Sector, UnitCode};

fn totals(values: [f64; 4]) -> Vec<SectorTotal> {
    Sector::ALL
        .iter()
        .zip(values)
        .map(|(sector, value)| SectorTotal {
            sector: *sector,
            label: sector.label().to_string(),
            value,
        })
        .collect()
}

fn add(acc: &mut [f64; 4], fact: &GdpFact) {
    for (slot, sector) in acc.iter_mut().zip(Sector::ALL) {
        *slot += fact.sector_value(sector);
    }
}

/// Sums each sector over a final-year slice, overall and per unit.
#[must_use]
pub fn sector_composition(facts: &[GdpFact]) -> SectorComposition {
    if facts.is_empty() {
        return SectorComposition::default();
    }

    let mut aggregate = [0.0; 4];
    let mut by_unit: BTreeMap<&str, (UnitCode, [f64; 4])> = BTreeMap::new();

    for fact in facts {
        add(&mut aggregate, fact);
        let (_, unit) = by_unit
            .entry(fact.unit_abbreviation.as_str())
            .or_insert((fact.unit_code, [0.0; 4]));
        add(unit, fact);
    }

    SectorComposition {
        aggregate: totals(aggregate),
        by_unit: by_unit
            .into_iter()
            .map(|(abbreviation, (unit_code, values))| UnitSectorTotals {
                unit_code,
                unit_abbreviation: abbreviation.to_string(),
                sectors: totals(values),
            })
            .collect(),
    }
}
