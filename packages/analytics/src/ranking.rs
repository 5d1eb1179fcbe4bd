//! Top-N and bottom-N municipality rankings.

use std::cmp::Ordering;

use pib_dashboard_analytics_models::{CAPITAL_MARKER, Ranking, RankingEntry, RankingOrder};
use pib_dashboard_pib_models::{GdpFact, ViewMode};

fn display_name(fact: &GdpFact, highlight_capitals: bool) -> String {
    if highlight_capitals && fact.is_capital {
        format!("{} {CAPITAL_MARKER}", fact.municipality_name)
    } else {
        fact.municipality_name.clone()
    }
}

/// Ranks the rows of a final-year slice by their `view_mode` value.
///
/// [`RankingOrder::Top`] sorts descending and [`RankingOrder::Bottom`]
/// ascending; equal values are ordered by ascending municipality code in
/// both cases. `n` is clamped to `1..=facts.len()`.
#[must_use]
pub fn ranking(
    facts: &[GdpFact],
    view_mode: ViewMode,
    n: usize,
    order: RankingOrder,
    highlight_capitals: bool,
) -> Ranking {
    let mut rows: Vec<(&GdpFact, f64)> = facts.iter().map(|f| (f, view_mode.value_of(f))).collect();

    rows.sort_by(|(a, av), (b, bv)| {
        let by_value = match order {
            RankingOrder::Top => bv.total_cmp(av),
            RankingOrder::Bottom => av.total_cmp(bv),
        };
        match by_value {
            Ordering::Equal => a.municipality_code.cmp(&b.municipality_code),
            other => other,
        }
    });

    let n = n.clamp(1, rows.len().max(1));
    let entries = rows
        .into_iter()
        .take(n)
        .map(|(fact, value)| RankingEntry {
            municipality_code: fact.municipality_code,
            name: fact.municipality_name.clone(),
            display_name: display_name(fact, highlight_capitals),
            unit_abbreviation: fact.unit_abbreviation.clone(),
            is_capital: fact.is_capital,
            value,
        })
        .collect();

    Ranking {
        view_mode,
        order,
        entries,
    }
}
