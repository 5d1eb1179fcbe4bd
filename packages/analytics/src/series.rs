//! Yearly series with year-over-year growth.

use std::collections::BTreeMap;

use pib_dashboard_analytics_models::TimeSeriesPoint;
use pib_dashboard_pib_models::{GdpFact, ViewMode, Year};

#[derive(Default)]
struct YearAccumulator {
    total_gdp: f64,
    per_capita_sum: f64,
    rows: usize,
}

/// Percent change from `previous` to `current`, `None` when `previous` is
/// zero.
#[must_use]
pub fn growth_rate(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// Groups `facts` by year, ascending.
///
/// The value is the sum of total GDP for [`ViewMode::Total`] and the mean
/// GDP per capita for [`ViewMode::PerCapita`]. Each point after the first
/// carries the percent change from the previous year when that value is
/// non-zero.
#[must_use]
pub fn time_series(facts: &[GdpFact], view_mode: ViewMode) -> Vec<TimeSeriesPoint> {
    let mut by_year: BTreeMap<Year, YearAccumulator> = BTreeMap::new();
    for fact in facts {
        let acc = by_year.entry(fact.year).or_default();
        acc.total_gdp += fact.total_gdp;
        acc.per_capita_sum += fact.gdp_per_capita;
        acc.rows += 1;
    }

    let mut previous: Option<f64> = None;
    by_year
        .into_iter()
        .map(|(year, acc)| {
            #[allow(clippy::cast_precision_loss)]
            let value = match view_mode {
                ViewMode::Total => acc.total_gdp,
                ViewMode::PerCapita => acc.per_capita_sum / acc.rows as f64,
            };
            let growth = previous.and_then(|prev| growth_rate(prev, value));
            previous = Some(value);
            TimeSeriesPoint {
                year,
                value,
                growth_rate: growth,
            }
        })
        .collect()
}
