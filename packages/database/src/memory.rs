//! In-memory [`PibStore`] used by tests and local demos.
//!
//! Joins facts with their dimensions the same way the SQL query does
//! (inner join on municipality and unit) and can inject failures and
//! latency to exercise the cache and loader error paths.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pib_dashboard_pib_models::{
    FederativeUnit, GdpFact, Municipality, MunicipalityCode, Region, UnitCode, Year, YearRange,
};

use crate::{DbError, PibStore};

/// A raw `pib_municipios` row before the dimension join.
#[derive(Debug, Clone, PartialEq)]
struct FactSeed {
    year: Year,
    municipality_code: MunicipalityCode,
    total_gdp: f64,
    gdp_per_capita: f64,
    sectors: [f64; 4],
}

#[derive(Debug, Default)]
struct Tables {
    units: Vec<FederativeUnit>,
    municipalities: Vec<Municipality>,
    facts: Vec<FactSeed>,
}

/// Number of calls received per store operation.
#[derive(Debug, Default)]
pub struct CallCounts {
    /// `fetch_years` calls.
    pub years: AtomicUsize,
    /// `fetch_units` calls.
    pub units: AtomicUsize,
    /// `fetch_municipalities` calls.
    pub municipalities: AtomicUsize,
    /// `fetch_facts` calls.
    pub facts: AtomicUsize,
}

/// A [`PibStore`] holding its tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    failures_remaining: AtomicUsize,
    delay_ms: AtomicU64,
    /// Per-operation call counters.
    pub calls: CallCounts,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a federative unit. The region is derived from the unit code.
    #[must_use]
    pub fn with_unit(self, code: UnitCode, abbreviation: &str, name: &str) -> Self {
        self.lock().units.push(FederativeUnit {
            code,
            abbreviation: abbreviation.to_string(),
            name: name.to_string(),
            region: Region::for_unit_code(code),
        });
        self
    }

    /// Adds a municipality.
    #[must_use]
    pub fn with_municipality(self, municipality: Municipality) -> Self {
        self.lock().municipalities.push(municipality);
        self
    }

    /// Adds a fact row. `sectors` holds agriculture, industry, services and
    /// public administration, in that order.
    #[must_use]
    pub fn with_fact(
        self,
        year: Year,
        municipality_code: MunicipalityCode,
        total_gdp: f64,
        gdp_per_capita: f64,
        sectors: [f64; 4],
    ) -> Self {
        self.add_fact(year, municipality_code, total_gdp, gdp_per_capita, sectors);
        self
    }

    /// Adds a fact row to a store that is already shared.
    pub fn add_fact(
        &self,
        year: Year,
        municipality_code: MunicipalityCode,
        total_gdp: f64,
        gdp_per_capita: f64,
        sectors: [f64; 4],
    ) {
        self.lock().facts.push(FactSeed {
            year,
            municipality_code,
            total_gdp,
            gdp_per_capita,
            sectors,
        });
    }

    /// Makes every subsequent call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Delays every call by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        #[allow(clippy::cast_possible_truncation)]
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), DbError> {
        counter.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Connection {
                message: "store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PibStore for MemoryStore {
    async fn fetch_years(&self) -> Result<Vec<Year>, DbError> {
        self.enter(&self.calls.years).await?;
        let years: BTreeSet<Year> = self.lock().facts.iter().map(|f| f.year).collect();
        Ok(years.into_iter().rev().collect())
    }

    async fn fetch_units(&self) -> Result<Vec<FederativeUnit>, DbError> {
        self.enter(&self.calls.units).await?;
        let mut units = self.lock().units.clone();
        units.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));
        Ok(units)
    }

    async fn fetch_municipalities(
        &self,
        unit_codes: &[UnitCode],
    ) -> Result<Vec<Municipality>, DbError> {
        self.enter(&self.calls.municipalities).await?;
        let mut municipalities: Vec<Municipality> = self
            .lock()
            .municipalities
            .iter()
            .filter(|m| unit_codes.contains(&m.unit_code))
            .cloned()
            .collect();
        municipalities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(municipalities)
    }

    async fn fetch_facts(
        &self,
        range: YearRange,
        municipality_codes: &[MunicipalityCode],
    ) -> Result<Vec<GdpFact>, DbError> {
        self.enter(&self.calls.facts).await?;
        let tables = self.lock();

        Ok(tables
            .facts
            .iter()
            .filter(|seed| {
                range.contains(seed.year) && municipality_codes.contains(&seed.municipality_code)
            })
            .filter_map(|seed| {
                let municipality = tables
                    .municipalities
                    .iter()
                    .find(|m| m.code == seed.municipality_code)?;
                let unit = tables
                    .units
                    .iter()
                    .find(|u| u.code == municipality.unit_code)?;
                Some(GdpFact {
                    year: seed.year,
                    municipality_code: seed.municipality_code,
                    municipality_name: municipality.name.clone(),
                    is_capital: municipality.is_capital,
                    longitude: municipality.longitude,
                    latitude: municipality.latitude,
                    unit_code: unit.code,
                    unit_abbreviation: unit.abbreviation.clone(),
                    unit_name: unit.name.clone(),
                    region: unit.region,
                    total_gdp: seed.total_gdp,
                    gdp_per_capita: seed.gdp_per_capita,
                    agriculture: seed.sectors[0],
                    industry: seed.sectors[1],
                    services: seed.sectors[2],
                    public_administration: seed.sectors[3],
                    gross_value_total: None,
                    subsidies: None,
                    estimated_population: None,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn municipality(code: i64, name: &str, unit_code: i32) -> Municipality {
        Municipality {
            code,
            name: name.to_string(),
            unit_code,
            is_capital: false,
            longitude: None,
            latitude: None,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_unit(35, "SP", "São Paulo")
            .with_unit(33, "RJ", "Rio de Janeiro")
            .with_municipality(municipality(3_509_502, "Campinas", 35))
            .with_municipality(municipality(3_304_557, "Rio de Janeiro", 33))
            .with_municipality(municipality(3_500_105, "Adamantina", 35))
            .with_fact(2019, 3_509_502, 10.0, 1.0, [1.0, 2.0, 3.0, 4.0])
            .with_fact(2020, 3_509_502, 12.0, 1.0, [1.0, 2.0, 3.0, 4.0])
            .with_fact(2020, 3_304_557, 20.0, 2.0, [1.0, 2.0, 3.0, 4.0])
            .with_fact(2020, 9_999_999, 1.0, 1.0, [0.0; 4])
    }

    #[tokio::test]
    async fn years_are_distinct_and_descending() {
        assert_eq!(store().fetch_years().await.unwrap(), vec![2020, 2019]);
    }

    #[tokio::test]
    async fn units_are_ordered_by_abbreviation() {
        let units = store().fetch_units().await.unwrap();
        let abbrs: Vec<&str> = units.iter().map(|u| u.abbreviation.as_str()).collect();
        assert_eq!(abbrs, vec!["RJ", "SP"]);
        assert_eq!(units[1].region, Some(Region::Sudeste));
    }

    #[tokio::test]
    async fn municipalities_are_filtered_and_ordered_by_name() {
        let list = store().fetch_municipalities(&[35]).await.unwrap();
        let names: Vec<&str> = list.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Adamantina", "Campinas"]);
        assert!(store().fetch_municipalities(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn facts_are_joined_and_filtered() {
        let store = store();
        let facts = store
            .fetch_facts(
                YearRange::single(2020),
                &[3_509_502, 3_304_557, 9_999_999],
            )
            .await
            .unwrap();
        // The orphan fact has no municipality row and drops out of the join.
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|f| f.estimated_population.is_none()));
        assert!(facts.iter().any(|f| f.unit_abbreviation == "RJ"));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = store();
        store.fail_next(1);
        assert!(store.fetch_years().await.is_err());
        assert!(store.fetch_years().await.is_ok());
        assert_eq!(store.calls.years.load(Ordering::SeqCst), 2);

        store.set_unavailable(true);
        assert!(store.fetch_units().await.is_err());
        store.set_unavailable(false);
        assert!(store.fetch_units().await.is_ok());
    }
}
