//! HTTP handler functions for the GDP dashboard API.

use actix_web::{HttpResponse, http::header, web};
use chrono::Utc;
use pib_dashboard_filter::FilterState;
use pib_dashboard_pib_models::GdpFact;
use pib_dashboard_server_models::{
    ApiCatalog, ApiError, ApiHealth, DashboardQueryParams, MunicipalityQueryParams,
};

use crate::AppState;
use crate::dashboard::{self, DashboardError};

/// `GET /api/health`
///
/// Reports the server version and the loader cache counters.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        fact_cache: state.loader.fact_cache_stats(),
        municipality_cache: state.loader.municipality_cache_stats(),
    })
}

/// `GET /api/catalog`
///
/// Returns the available years and federative units.
pub async fn catalog(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.catalog.snapshot().await;
    HttpResponse::Ok().json(ApiCatalog {
        years: snapshot.years.clone(),
        units: snapshot.units.clone(),
        refreshed_at: snapshot.refreshed_at,
    })
}

/// `GET /api/municipalities`
///
/// Lists the municipalities of the requested units, ordered by name.
pub async fn municipalities(
    state: web::Data<AppState>,
    params: web::Query<MunicipalityQueryParams>,
) -> HttpResponse {
    let mut filter = FilterState::new(state.catalog.snapshot().await);
    filter.set_units(&params.unit_list());

    match filter
        .municipalities_for_current_units(state.loader.as_ref())
        .await
    {
        Ok(list) => HttpResponse::Ok().json(list.as_slice()),
        Err(e) => error_response(&DashboardError::from(e), "query municipalities"),
    }
}

/// `GET /api/dashboard`
///
/// Computes every aggregate for the requested filters.
pub async fn dashboard(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    match dashboard::run(&state.catalog, &state.loader, &params).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e, "build dashboard"),
    }
}

/// `GET /api/facts.csv`
///
/// Exports the filtered fact table as CSV.
pub async fn facts_csv(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let loaded = match dashboard::build_filter(&state.catalog, &state.loader, &params).await {
        Ok(mut filter) => dashboard::load(&mut filter, &state.loader).await,
        Err(e) => Err(e),
    };
    let (loaded, _) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return error_response(&e, "export facts"),
    };

    match to_csv(&loaded.facts) {
        Ok(body) => {
            let filename = format!("pib_municipios_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
            HttpResponse::Ok()
                .content_type("text/csv; charset=utf-8")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ))
                .body(body)
        }
        Err(e) => {
            log::error!("Failed to serialize {} facts: {e}", loaded.facts.len());
            HttpResponse::InternalServerError().json(ApiError {
                error: "Failed to export facts".to_string(),
                retryable: false,
            })
        }
    }
}

/// Serializes `facts` with a header row.
fn to_csv(facts: &[GdpFact]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for fact in facts {
        writer.serialize(fact)?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

fn error_response(e: &DashboardError, action: &str) -> HttpResponse {
    let body = ApiError {
        error: e.to_string(),
        retryable: e.is_retryable(),
    };

    if e.is_client_error() {
        log::warn!("Rejected request to {action}: {e}");
        HttpResponse::BadRequest().json(body)
    } else if e.is_retryable() {
        log::error!("Failed to {action}: {e}");
        HttpResponse::ServiceUnavailable().json(body)
    } else {
        log::error!("Failed to {action}: {e}");
        HttpResponse::InternalServerError().json(body)
    }
}

#[cfg(test)]
mod tests {
    use pib_dashboard_pib_models::Region;

    use super::*;

    fn fact(code: i64, name: &str) -> GdpFact {
        GdpFact {
            year: 2020,
            municipality_code: code,
            municipality_name: name.to_string(),
            is_capital: false,
            longitude: None,
            latitude: None,
            unit_code: 35,
            unit_abbreviation: "SP".to_string(),
            unit_name: "São Paulo".to_string(),
            region: Some(Region::Sudeste),
            total_gdp: 70.0,
            gdp_per_capita: 35.0,
            agriculture: 2.0,
            industry: 30.0,
            services: 30.0,
            public_administration: 8.0,
            gross_value_total: None,
            subsidies: None,
            estimated_population: Some(2),
        }
    }

    #[test]
    fn csv_has_a_header_and_one_line_per_fact() {
        let body = to_csv(&[fact(3_509_502, "Campinas"), fact(3_548_500, "Santos")]).unwrap();
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("year,"));
        assert!(lines[1].contains("Campinas"));
        assert!(lines[2].starts_with("2020,3548500,Santos,"));
    }

    #[test]
    fn empty_export_is_empty() {
        assert!(to_csv(&[]).unwrap().is_empty());
    }
}
