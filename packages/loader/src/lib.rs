#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fact and municipality loading for the dashboard pipeline.
//!
//! [`FactLoader`] turns a resolved selection (year range plus municipality
//! codes) into a fact table, going through a [`QueryCache`] so identical
//! selections share one storage round-trip. Every row leaving the loader
//! carries an `estimated_population`.
//!
//! Storage failures surface as [`LoadError::DataUnavailable`]; the caller
//! keeps whatever it rendered last and may retry.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pib_dashboard_cache::{CacheStats, Fingerprint, QueryCache};
use pib_dashboard_database::{DbError, PibStore};
use pib_dashboard_pib_models::{GdpFact, Municipality, MunicipalityCode, UnitCode, YearRange};

/// Default lifetime of a cached fact table.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default number of cached fact tables.
pub const DEFAULT_CAPACITY: usize = 128;

/// Default bound on a single storage fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while loading dashboard data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The store could not deliver the requested rows.
    #[error("Data unavailable: {message}")]
    DataUnavailable {
        /// Description of what went wrong.
        message: String,
        /// Whether repeating the request may succeed.
        retryable: bool,
    },
}

impl LoadError {
    /// Whether repeating the request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::DataUnavailable { retryable, .. } => *retryable,
        }
    }
}

impl From<DbError> for LoadError {
    fn from(error: DbError) -> Self {
        // A row that fails to decode will fail the same way next time.
        let retryable = !matches!(error, DbError::Conversion { .. });
        Self::DataUnavailable {
            message: error.to_string(),
            retryable,
        }
    }
}

/// Source of the municipality list for a set of federative units.
#[async_trait]
pub trait MunicipalityDirectory: Send + Sync {
    /// Municipalities belonging to `unit_codes`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::DataUnavailable`] if the list cannot be fetched.
    async fn municipalities_for_units(
        &self,
        unit_codes: &BTreeSet<UnitCode>,
    ) -> Result<Arc<Vec<Municipality>>, LoadError>;
}

/// Tuning knobs for [`FactLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Lifetime of cached results.
    pub ttl: Duration,
    /// Maximum number of cached fact tables.
    pub capacity: usize,
    /// Bound on each storage fetch.
    pub fetch_timeout: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// A fact table together with the fingerprint of the selection that
/// produced it.
#[derive(Debug, Clone)]
pub struct LoadedFacts {
    /// Identifies the selection; equal selections share a fingerprint.
    pub fingerprint: Fingerprint,
    /// Joined fact rows, each with `estimated_population` set.
    pub facts: Arc<Vec<GdpFact>>,
}

/// Cache key for a fact selection.
///
/// The municipality codes are treated as a set, so order and duplicates do
/// not matter.
#[must_use]
pub fn facts_fingerprint<'a>(
    range: YearRange,
    codes: impl IntoIterator<Item = &'a MunicipalityCode>,
) -> Fingerprint {
    Fingerprint::builder("facts")
        .field("years", range)
        .set("municipalities", codes)
        .finish()
}

/// Cache key for a municipality list.
#[must_use]
pub fn municipalities_fingerprint<'a>(
    unit_codes: impl IntoIterator<Item = &'a UnitCode>,
) -> Fingerprint {
    Fingerprint::builder("municipalities")
        .set("units", unit_codes)
        .finish()
}

/// Fills `estimated_population` on every row that lacks it.
fn with_population(mut facts: Vec<GdpFact>) -> Vec<GdpFact> {
    for fact in &mut facts {
        fact.ensure_population();
    }
    facts
}

async fn with_timeout<T, F>(timeout: Duration, what: &str, fetch: F) -> Result<T, LoadError>
where
    F: std::future::Future<Output = Result<T, DbError>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result.map_err(|e| {
            log::warn!("Fetching {what} failed: {e}");
            LoadError::from(e)
        }),
        Err(_) => {
            log::warn!("Fetching {what} timed out after {timeout:?}");
            Err(LoadError::DataUnavailable {
                message: format!("fetching {what} timed out after {}s", timeout.as_secs()),
                retryable: true,
            })
        }
    }
}

/// Cached loader for fact tables and municipality lists.
pub struct FactLoader {
    store: Arc<dyn PibStore>,
    facts: Arc<QueryCache<Vec<GdpFact>, LoadError>>,
    municipalities: Arc<QueryCache<Vec<Municipality>, LoadError>>,
    settings: LoaderSettings,
}

impl std::fmt::Debug for FactLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactLoader")
            .field("facts", &self.facts)
            .field("municipalities", &self.municipalities)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FactLoader {
    /// Creates a loader over `store` with empty caches.
    #[must_use]
    pub fn new(store: Arc<dyn PibStore>, settings: LoaderSettings) -> Self {
        Self {
            store,
            facts: Arc::new(QueryCache::new("facts", settings.capacity)),
            municipalities: Arc::new(QueryCache::new("municipalities", settings.capacity)),
            settings,
        }
    }

    /// Counters of the fact-table cache.
    #[must_use]
    pub fn fact_cache_stats(&self) -> CacheStats {
        self.facts.stats()
    }

    /// Counters of the municipality-list cache.
    #[must_use]
    pub fn municipality_cache_stats(&self) -> CacheStats {
        self.municipalities.stats()
    }

    /// Loads the facts for `codes` within `range`.
    ///
    /// An empty range or an empty code set yields an empty table without a
    /// storage round-trip. The fetch runs on its own task: if the caller
    /// stops waiting (for example because a newer selection superseded
    /// this one) the fetch still completes and populates the cache.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::DataUnavailable`] if the store fails or does
    /// not answer within the configured timeout.
    pub async fn load_facts(
        &self,
        range: YearRange,
        codes: &BTreeSet<MunicipalityCode>,
    ) -> Result<LoadedFacts, LoadError> {
        let fingerprint = facts_fingerprint(range, codes);

        if range.is_empty() || codes.is_empty() {
            log::debug!("Empty selection for {range}, skipping fetch");
            return Ok(LoadedFacts {
                fingerprint,
                facts: Arc::new(Vec::new()),
            });
        }

        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.facts);
        let codes: Vec<MunicipalityCode> = codes.iter().copied().collect();
        let LoaderSettings {
            ttl, fetch_timeout, ..
        } = self.settings;
        let key = fingerprint.clone();

        let task = tokio::spawn(async move {
            cache
                .get_or_compute(&key, ttl, || async move {
                    log::info!(
                        "Loading facts for {} municipalities ({range})",
                        codes.len()
                    );
                    let facts =
                        with_timeout(fetch_timeout, "facts", store.fetch_facts(range, &codes))
                            .await?;
                    log::info!("Loaded {} fact rows ({range})", facts.len());
                    Ok::<_, LoadError>(with_population(facts))
                })
                .await
        });

        let facts = task.await.map_err(|e| LoadError::DataUnavailable {
            message: format!("fact loading task failed: {e}"),
            retryable: true,
        })??;

        Ok(LoadedFacts { fingerprint, facts })
    }
}

#[async_trait]
impl MunicipalityDirectory for FactLoader {
    async fn municipalities_for_units(
        &self,
        unit_codes: &BTreeSet<UnitCode>,
    ) -> Result<Arc<Vec<Municipality>>, LoadError> {
        if unit_codes.is_empty() {
            return Ok(Arc::new(Vec::new()));
        }

        let fingerprint = municipalities_fingerprint(unit_codes);
        let codes: Vec<UnitCode> = unit_codes.iter().copied().collect();
        let timeout = self.settings.fetch_timeout;
        let store = &self.store;

        self.municipalities
            .get_or_compute(&fingerprint, self.settings.ttl, || async move {
                let list =
                    with_timeout(timeout, "municipalities", store.fetch_municipalities(&codes))
                        .await?;
                log::debug!(
                    "Loaded {} municipalities for {} units",
                    list.len(),
                    codes.len()
                );
                Ok::<_, LoadError>(list)
            })
            .await
    }
}
