#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the municipal GDP dashboard.
//!
//! Serves the catalog, the municipality lists, the computed dashboard and
//! a CSV export of the filtered facts. The catalog and the fact cache are
//! shared by every request; each request carries its own filter state.

pub mod config;
pub mod dashboard;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use pib_dashboard_catalog::Catalog;
use pib_dashboard_database::{DatabaseStore, PibStore, db};
use pib_dashboard_loader::FactLoader;

pub use config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// Reference dimensions.
    pub catalog: Arc<Catalog>,
    /// Cached fact and municipality loader.
    pub loader: Arc<FactLoader>,
}

impl AppState {
    /// Loads the catalog from `store` and wires up the loader.
    ///
    /// # Errors
    ///
    /// Returns [`pib_dashboard_catalog::CatalogError`] if the catalog cannot
    /// be loaded.
    pub async fn load(
        store: Arc<dyn PibStore>,
        config: &ServerConfig,
    ) -> Result<Self, pib_dashboard_catalog::CatalogError> {
        let catalog = Catalog::load(Arc::clone(&store), config.catalog_refresh).await?;
        let loader = FactLoader::new(store, config.loader_settings());

        Ok(Self {
            catalog: Arc::new(catalog),
            loader: Arc::new(loader),
        })
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/catalog", web::get().to(handlers::catalog))
            .route("/municipalities", web::get().to(handlers::municipalities))
            .route("/dashboard", web::get().to(handlers::dashboard))
            .route("/facts.csv", web::get().to(handlers::facts_csv)),
    );
}

/// Starts the dashboard API server.
///
/// Reads the configuration from the environment, connects to the
/// database, loads the catalog and starts the Actix-Web HTTP server.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the database connection fails or the catalog cannot be
/// loaded.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env();

    log::info!("Connecting to database...");
    let db_conn = db::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    let store: Arc<dyn PibStore> = Arc::new(DatabaseStore::new(Arc::from(db_conn)));

    log::info!("Loading catalog...");
    let state = web::Data::new(
        AppState::load(store, &config)
            .await
            .expect("Failed to load catalog"),
    );

    let ServerConfig { bind_addr, port, .. } = config;
    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
