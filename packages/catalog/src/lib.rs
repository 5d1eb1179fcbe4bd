#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference dimensions for the dashboard: the years that have facts and
//! the federative units.
//!
//! The [`Catalog`] is loaded once at startup and shared by every session.
//! It serves an immutable [`CatalogSnapshot`] that is replaced wholesale
//! when the refresh interval elapses. A failed refresh is logged and the
//! previous snapshot keeps being served.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pib_dashboard_database::PibStore;
use pib_dashboard_pib_models::{FederativeUnit, UnitCode, Year};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Default interval between catalog refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Errors that can occur while loading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog cannot be built, so no valid filter exists.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what went wrong.
        message: String,
    },
}

/// An immutable view of the reference dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    /// Years with at least one fact, newest first. Never empty.
    pub years: Vec<Year>,
    /// Federative units ordered by abbreviation.
    pub units: Vec<FederativeUnit>,
    /// When this snapshot was read from storage.
    pub refreshed_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// The oldest available year.
    #[must_use]
    pub fn min_year(&self) -> Year {
        self.years.iter().copied().min().unwrap_or_default()
    }

    /// The newest available year.
    #[must_use]
    pub fn max_year(&self) -> Year {
        self.years.iter().copied().max().unwrap_or_default()
    }

    /// Looks up a unit by abbreviation, ignoring case.
    #[must_use]
    pub fn unit_by_abbreviation(&self, abbreviation: &str) -> Option<&FederativeUnit> {
        self.units
            .iter()
            .find(|u| u.abbreviation.eq_ignore_ascii_case(abbreviation.trim()))
    }

    /// Looks up a unit by code.
    #[must_use]
    pub fn unit_by_code(&self, code: UnitCode) -> Option<&FederativeUnit> {
        self.units.iter().find(|u| u.code == code)
    }

    /// Codes of every known unit.
    #[must_use]
    pub fn all_unit_codes(&self) -> BTreeSet<UnitCode> {
        self.units.iter().map(|u| u.code).collect()
    }
}

struct Current {
    snapshot: Arc<CatalogSnapshot>,
    checked_at: Instant,
}

/// Process-wide, periodically refreshed reference dimensions.
pub struct Catalog {
    store: Arc<dyn PibStore>,
    refresh_interval: Duration,
    current: RwLock<Current>,
    refreshing: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("refresh_interval", &self.refresh_interval)
            .field("snapshot", &self.current())
            .finish_non_exhaustive()
    }
}

async fn fetch_snapshot(store: &dyn PibStore) -> Result<CatalogSnapshot, CatalogError> {
    let years = store
        .fetch_years()
        .await
        .map_err(|e| CatalogError::Configuration {
            message: format!("Failed to load years: {e}"),
        })?;

    if years.is_empty() {
        return Err(CatalogError::Configuration {
            message: "No years with GDP facts found".to_string(),
        });
    }

    let units = store
        .fetch_units()
        .await
        .map_err(|e| CatalogError::Configuration {
            message: format!("Failed to load federative units: {e}"),
        })?;

    Ok(CatalogSnapshot {
        years,
        units,
        refreshed_at: Utc::now(),
    })
}

impl Catalog {
    /// Loads the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Configuration`] if storage is unreachable or
    /// holds no years with facts.
    pub async fn load(
        store: Arc<dyn PibStore>,
        refresh_interval: Duration,
    ) -> Result<Self, CatalogError> {
        let snapshot = fetch_snapshot(store.as_ref()).await?;
        log::info!(
            "Catalog loaded: {} years ({}-{}), {} units",
            snapshot.years.len(),
            snapshot.min_year(),
            snapshot.max_year(),
            snapshot.units.len()
        );

        Ok(Self {
            store,
            refresh_interval,
            current: RwLock::new(Current {
                snapshot: Arc::new(snapshot),
                checked_at: Instant::now(),
            }),
            refreshing: tokio::sync::Mutex::new(()),
        })
    }

    /// The snapshot currently served, without checking staleness.
    #[must_use]
    pub fn current(&self) -> Arc<CatalogSnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current.snapshot)
    }

    /// The current snapshot, refreshed first if the interval has elapsed.
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        if self.is_stale() {
            self.refresh_if_stale().await;
        }
        self.current()
    }

    /// Available years, newest first.
    pub async fn years(&self) -> Vec<Year> {
        self.snapshot().await.years.clone()
    }

    /// Federative units ordered by abbreviation.
    pub async fn units(&self) -> Vec<FederativeUnit> {
        self.snapshot().await.units.clone()
    }

    fn is_stale(&self) -> bool {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current.checked_at.elapsed() >= self.refresh_interval
    }

    async fn refresh_if_stale(&self) {
        // Another caller is already refreshing; keep serving the current snapshot.
        let Ok(_guard) = self.refreshing.try_lock() else {
            return;
        };
        if !self.is_stale() {
            return;
        }

        log::debug!("Refreshing catalog");
        let result = fetch_snapshot(self.store.as_ref()).await;

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.checked_at = Instant::now();
        match result {
            Ok(snapshot) => {
                log::info!(
                    "Catalog refreshed: {} years, {} units",
                    snapshot.years.len(),
                    snapshot.units.len()
                );
                current.snapshot = Arc::new(snapshot);
            }
            Err(e) => {
                log::warn!(
                    "Catalog refresh failed, keeping snapshot from {}: {e}",
                    current.snapshot.refreshed_at
                );
            }
        }
    }
}
