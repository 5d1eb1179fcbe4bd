#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage access for the GDP dashboard.
//!
//! The relational store holds three denormalized tables: `pib_municipios`
//! (yearly GDP facts), `municipio` and `unidade_federacao`. Queries run as
//! raw SQL through `switchy_database::Database::query_raw_params()` and
//! are exposed to the rest of the workspace through the [`PibStore`]
//! trait so the pipeline never depends on a concrete backend.

pub mod db;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod queries;
pub mod store;

pub use store::{DatabaseStore, PibStore};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The store could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
