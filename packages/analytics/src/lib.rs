#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation engine for municipal GDP facts.
//!
//! Every function here is a pure function of the fact table it is given:
//! no I/O, no hidden state. Empty input degrades to empty output or an
//! explicit "no data" value, never to an error.
//!
//! Most views work on the final-year slice, the rows whose year equals the
//! end of the selected range; see [`final_year_slice`].

pub mod composition;
pub mod geography;
pub mod kpis;
pub mod ranking;
pub mod series;

use pib_dashboard_pib_models::{GdpFact, Year};

pub use composition::sector_composition;
pub use geography::geographic_rollup;
pub use kpis::kpis;
pub use ranking::ranking;
pub use series::time_series;

/// Rows of `facts` whose year is `year`.
#[must_use]
pub fn final_year_slice(facts: &[GdpFact], year: Year) -> Vec<GdpFact> {
    facts.iter().filter(|f| f.year == year).cloned().collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::fact;
    use super::*;

    #[test]
    fn final_year_slice_keeps_only_that_year() {
        let facts = vec![fact(2019, 1, 1.0, 1.0), fact(2020, 1, 2.0, 1.0), fact(2020, 2, 3.0, 1.0)];

        let slice = final_year_slice(&facts, 2020);

        assert_eq!(slice.len(), 2);
        assert!(slice.iter().all(|f| f.year == 2020));
        assert!(final_year_slice(&facts, 2021).is_empty());
    }
}
