//! The storage collaborator consumed by the catalog and the fact loader.

use std::sync::Arc;

use async_trait::async_trait;
use pib_dashboard_pib_models::{
    FederativeUnit, GdpFact, Municipality, MunicipalityCode, UnitCode, Year, YearRange,
};
use switchy_database::Database;

use crate::{DbError, queries};

/// Read-only access to the GDP tables.
///
/// Implementations must return an empty list, not an error, when nothing
/// matches.
#[async_trait]
pub trait PibStore: Send + Sync {
    /// Every year with at least one fact, newest first.
    async fn fetch_years(&self) -> Result<Vec<Year>, DbError>;

    /// Every federative unit, ordered by abbreviation.
    async fn fetch_units(&self) -> Result<Vec<FederativeUnit>, DbError>;

    /// Municipalities belonging to any of `unit_codes`, ordered by name.
    async fn fetch_municipalities(
        &self,
        unit_codes: &[UnitCode],
    ) -> Result<Vec<Municipality>, DbError>;

    /// Facts for `municipality_codes` in the inclusive `range`, joined with
    /// their dimensions. Row order is unspecified.
    async fn fetch_facts(
        &self,
        range: YearRange,
        municipality_codes: &[MunicipalityCode],
    ) -> Result<Vec<GdpFact>, DbError>;
}

/// [`PibStore`] backed by a `switchy_database` connection.
pub struct DatabaseStore {
    db: Arc<dyn Database>,
}

impl DatabaseStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

impl std::fmt::Debug for DatabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl PibStore for DatabaseStore {
    async fn fetch_years(&self) -> Result<Vec<Year>, DbError> {
        queries::get_years(self.db.as_ref()).await
    }

    async fn fetch_units(&self) -> Result<Vec<FederativeUnit>, DbError> {
        queries::get_units(self.db.as_ref()).await
    }

    async fn fetch_municipalities(
        &self,
        unit_codes: &[UnitCode],
    ) -> Result<Vec<Municipality>, DbError> {
        queries::get_municipalities_by_units(self.db.as_ref(), unit_codes).await
    }

    async fn fetch_facts(
        &self,
        range: YearRange,
        municipality_codes: &[MunicipalityCode],
    ) -> Result<Vec<GdpFact>, DbError> {
        queries::get_facts(self.db.as_ref(), range, municipality_codes).await
    }
}
