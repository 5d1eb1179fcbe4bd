//! Headline indicators over the final-year slice.

use std::collections::BTreeSet;

use pib_dashboard_analytics_models::{KpiReport, Kpis};
use pib_dashboard_pib_models::{GdpFact, Sector, Year, YearRange};

use crate::series::growth_rate;

fn total_gdp_in(facts: &[GdpFact], year: Year) -> f64 {
    facts
        .iter()
        .filter(|f| f.year == year)
        .map(|f| f.total_gdp)
        .sum()
}

/// The candidate sector with the largest sum. Earlier sectors win ties.
fn dominant_sector(slice: &[&GdpFact]) -> Sector {
    let mut best = Sector::DOMINANCE_CANDIDATES[0];
    let mut best_value = f64::NEG_INFINITY;
    for sector in Sector::DOMINANCE_CANDIDATES {
        let value: f64 = slice.iter().map(|f| f.sector_value(sector)).sum();
        if value > best_value {
            best = sector;
            best_value = value;
        }
    }
    best
}

/// Computes the headline indicators for `range`.
///
/// Totals, per-capita average, municipality count and dominant sector are
/// taken over the rows of `range.end`. `delta_pct` compares that total
/// with the total of `range.start`.
#[must_use]
pub fn kpis(facts: &[GdpFact], range: YearRange) -> KpiReport {
    let slice: Vec<&GdpFact> = facts.iter().filter(|f| f.year == range.end).collect();
    if slice.is_empty() {
        return KpiReport::NoDataForFinalYear { year: range.end };
    }

    let total_gdp: f64 = slice.iter().map(|f| f.total_gdp).sum();
    let population: u64 = slice.iter().map(|f| f.population()).sum();

    let delta_pct = if range.is_single_year() {
        None
    } else {
        growth_rate(total_gdp_in(facts, range.start), total_gdp)
    };

    #[allow(clippy::cast_precision_loss)]
    let per_capita_avg = if population == 0 {
        0.0
    } else {
        total_gdp / population as f64
    };

    let municipality_count = slice
        .iter()
        .map(|f| f.municipality_code)
        .collect::<BTreeSet<_>>()
        .len();

    KpiReport::Ready(Kpis {
        final_year: range.end,
        total_gdp,
        delta_pct,
        per_capita_avg,
        municipality_count,
        dominant_sector: dominant_sector(&slice),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fact, with_sectors};

    fn range(start: Year, end: Year) -> YearRange {
        YearRange::new(start, end).unwrap()
    }

    fn ready(report: KpiReport) -> Kpis {
        match report {
            KpiReport::Ready(kpis) => kpis,
            KpiReport::NoDataForFinalYear { year } => panic!("no data for {year}"),
        }
    }

    #[test]
    fn delta_is_percent_change_from_start_year() {
        let facts = vec![
            fact(2015, 1, 60.0, 1.0),
            fact(2015, 2, 40.0, 1.0),
            fact(2020, 1, 100.0, 1.0),
            fact(2020, 2, 50.0, 1.0),
        ];

        let kpis = ready(kpis(&facts, range(2015, 2020)));

        assert!((kpis.total_gdp - 150.0).abs() < f64::EPSILON);
        assert!((kpis.delta_pct.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(kpis.municipality_count, 2);
    }

    #[test]
    fn delta_is_absent_for_zero_start_or_single_year() {
        let facts = vec![fact(2015, 1, 0.0, 1.0), fact(2020, 1, 150.0, 1.0)];

        assert_eq!(ready(kpis(&facts, range(2015, 2020))).delta_pct, None);
        assert_eq!(ready(kpis(&facts, range(2020, 2020))).delta_pct, None);
        // A start year without rows sums to zero as well.
        assert_eq!(ready(kpis(&facts, range(2016, 2020))).delta_pct, None);
    }

    #[test]
    fn per_capita_average_uses_estimated_population() {
        // Populations 10 and 30.
        let facts = vec![fact(2020, 1, 100.0, 10.0), fact(2020, 2, 300.0, 10.0)];

        let kpis = ready(kpis(&facts, range(2020, 2020)));

        assert!((kpis.per_capita_avg - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn per_capita_average_is_zero_without_population() {
        let facts = vec![fact(2020, 1, 100.0, 0.0)];

        assert!(ready(kpis(&facts, range(2020, 2020))).per_capita_avg.abs() < f64::EPSILON);
    }

    #[test]
    fn dominant_sector_ties_go_to_declared_order() {
        let facts = vec![
            with_sectors(fact(2020, 1, 25.0, 1.0), [6.0, 4.0, 5.0, 100.0]),
            with_sectors(fact(2020, 2, 25.0, 1.0), [4.0, 6.0, 0.0, 100.0]),
        ];

        // Agriculture 10, industry 10, services 5; public administration
        // is not a candidate.
        assert_eq!(
            ready(kpis(&facts, range(2020, 2020))).dominant_sector,
            Sector::Agriculture
        );
    }

    #[test]
    fn dominant_sector_picks_the_largest_sum() {
        let facts = vec![with_sectors(fact(2020, 1, 25.0, 1.0), [1.0, 2.0, 3.0, 0.0])];

        assert_eq!(
            ready(kpis(&facts, range(2020, 2020))).dominant_sector,
            Sector::Services
        );
    }

    #[test]
    fn empty_final_year_is_reported_explicitly() {
        let facts = vec![fact(2019, 1, 100.0, 1.0)];

        assert_eq!(
            kpis(&facts, range(2019, 2020)),
            KpiReport::NoDataForFinalYear { year: 2020 }
        );
        assert_eq!(
            kpis(&[], range(2020, 2020)),
            KpiReport::NoDataForFinalYear { year: 2020 }
        );
    }

    #[test]
    fn municipalities_are_counted_once() {
        let facts = vec![fact(2020, 1, 1.0, 1.0), fact(2020, 1, 2.0, 1.0)];

        assert_eq!(ready(kpis(&facts, range(2020, 2020))).municipality_count, 1);
    }
}
