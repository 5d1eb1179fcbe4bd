//! Raw SQL queries against the GDP tables.
//!
//! Columns whose storage type varies between dumps (the year is stored as
//! text in some loads, monetary values as `NUMERIC`) are cast in SQL so the
//! decoded [`switchy_database::Row`] values have a predictable type.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use pib_dashboard_pib_models::{
    FederativeUnit, GdpFact, Municipality, MunicipalityCode, Region, UnitCode, Year, YearRange,
};
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

/// Maximum number of `IN (...)` parameters bound per statement.
const MAX_IN_PARAMS: usize = 1000;

/// Builds `$start, $start+1, ...` for `count` positional parameters.
fn placeholders(start_idx: usize, count: usize) -> String {
    let mut out = String::new();
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "${}", start_idx + i);
    }
    out
}

/// Returns every year that has at least one fact row, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_years(db: &dyn Database) -> Result<Vec<Year>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT DISTINCT CAST(ano_pib AS INTEGER) AS ano_pib
             FROM pib_municipios
             ORDER BY ano_pib DESC",
            &[],
        )
        .await?;

    rows.iter()
        .map(|row| {
            row.to_value::<i32>("ano_pib")
                .map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse ano_pib: {e}"),
                })
        })
        .collect()
}

/// Returns every federative unit, ordered by abbreviation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_units(db: &dyn Database) -> Result<Vec<FederativeUnit>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT CAST(cd_uf AS INTEGER) AS cd_uf, sigla_uf, nome_uf,
                    CAST(cd_regiao AS INTEGER) AS cd_regiao
             FROM unidade_federacao
             ORDER BY sigla_uf",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let code: i32 = row.to_value("cd_uf").unwrap_or(0);
            let region_code: Option<i32> = row.to_value("cd_regiao").unwrap_or(None);
            FederativeUnit {
                code,
                abbreviation: row.to_value("sigla_uf").unwrap_or_default(),
                name: row.to_value("nome_uf").unwrap_or_default(),
                region: Region::resolve(region_code, code),
            }
        })
        .collect())
}

/// Returns the municipalities of the given federative units, ordered by
/// name.
///
/// An empty `unit_codes` slice yields an empty list without touching the
/// database.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_municipalities_by_units(
    db: &dyn Database,
    unit_codes: &[UnitCode],
) -> Result<Vec<Municipality>, DbError> {
    if unit_codes.is_empty() {
        return Ok(Vec::new());
    }

    // There are only 27 units, so a single statement always suffices.
    let sql = format!(
        "SELECT CAST(codigo_municipio_dv AS BIGINT) AS codigo_municipio_dv,
                nome_municipio,
                CAST(cd_uf AS INTEGER) AS cd_uf,
                CAST(municipio_capital AS INTEGER) AS municipio_capital,
                CAST(longitude AS DOUBLE PRECISION) AS longitude,
                CAST(latitude AS DOUBLE PRECISION) AS latitude
         FROM municipio
         WHERE CAST(cd_uf AS INTEGER) IN ({})
         ORDER BY nome_municipio",
        placeholders(1, unit_codes.len())
    );
    let params: Vec<DatabaseValue> = unit_codes
        .iter()
        .map(|code| DatabaseValue::Int32(*code))
        .collect();

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(rows
        .iter()
        .map(|row| Municipality {
            code: row.to_value("codigo_municipio_dv").unwrap_or(0),
            name: row.to_value("nome_municipio").unwrap_or_default(),
            unit_code: row.to_value("cd_uf").unwrap_or(0),
            is_capital: row
                .to_value::<Option<i32>>("municipio_capital")
                .unwrap_or(None)
                .is_some_and(|v| v != 0),
            longitude: row.to_value("longitude").unwrap_or(None),
            latitude: row.to_value("latitude").unwrap_or(None),
        })
        .collect())
}

/// Returns the GDP facts for `municipality_codes` within `range`, joined
/// with municipality and federative unit attributes.
///
/// Codes are bound in chunks of [`MAX_IN_PARAMS`]; rows come back in no
/// particular order. `estimated_population` is left unset for the loader
/// to derive.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn get_facts(
    db: &dyn Database,
    range: YearRange,
    municipality_codes: &[MunicipalityCode],
) -> Result<Vec<GdpFact>, DbError> {
    let mut facts = Vec::new();

    if range.is_empty() || municipality_codes.is_empty() {
        return Ok(facts);
    }

    for chunk in municipality_codes.chunks(MAX_IN_PARAMS) {
        let sql = format!(
            "SELECT CAST(p.ano_pib AS INTEGER) AS ano_pib,
                    CAST(p.codigo_municipio_dv AS BIGINT) AS codigo_municipio_dv,
                    CAST(p.vl_pib AS DOUBLE PRECISION) AS vl_pib,
                    CAST(p.vl_pib_per_capta AS DOUBLE PRECISION) AS vl_pib_per_capta,
                    CAST(p.vl_agropecuaria AS DOUBLE PRECISION) AS vl_agropecuaria,
                    CAST(p.vl_industria AS DOUBLE PRECISION) AS vl_industria,
                    CAST(p.vl_servicos AS DOUBLE PRECISION) AS vl_servicos,
                    CAST(p.vl_administracao AS DOUBLE PRECISION) AS vl_administracao,
                    m.nome_municipio,
                    CAST(m.municipio_capital AS INTEGER) AS municipio_capital,
                    CAST(m.longitude AS DOUBLE PRECISION) AS longitude,
                    CAST(m.latitude AS DOUBLE PRECISION) AS latitude,
                    CAST(u.cd_uf AS INTEGER) AS cd_uf,
                    u.sigla_uf, u.nome_uf,
                    CAST(u.cd_regiao AS INTEGER) AS cd_regiao
             FROM pib_municipios p
             JOIN municipio m ON p.codigo_municipio_dv = m.codigo_municipio_dv
             JOIN unidade_federacao u ON m.cd_uf = u.cd_uf
             WHERE CAST(p.ano_pib AS INTEGER) BETWEEN $1 AND $2
               AND CAST(p.codigo_municipio_dv AS BIGINT) IN ({})",
            placeholders(3, chunk.len())
        );

        let mut params = Vec::with_capacity(chunk.len() + 2);
        params.push(DatabaseValue::Int32(range.start));
        params.push(DatabaseValue::Int32(range.end));
        params.extend(chunk.iter().map(|code| DatabaseValue::Int64(*code)));

        let rows = db.query_raw_params(&sql, &params).await?;
        log::debug!(
            "Fetched {} fact rows for {} municipalities ({range})",
            rows.len(),
            chunk.len()
        );

        for row in &rows {
            facts.push(fact_from_row(row)?);
        }
    }

    Ok(facts)
}

/// Decodes one row of the fact query.
///
/// The year and the municipality code identify the fact, so a value that
/// does not decode is an error. Every other column falls back to a default.
fn fact_from_row(row: &Row) -> Result<GdpFact, DbError> {
    let year = row
        .to_value::<i32>("ano_pib")
        .map_err(|e| DbError::Conversion {
            message: format!("Failed to parse ano_pib: {e}"),
        })?;
    let municipality_code = row
        .to_value::<i64>("codigo_municipio_dv")
        .map_err(|e| DbError::Conversion {
            message: format!("Failed to parse codigo_municipio_dv: {e}"),
        })?;
    let unit_code: i32 = row.to_value("cd_uf").unwrap_or(0);
    let region_code: Option<i32> = row.to_value("cd_regiao").unwrap_or(None);

    Ok(GdpFact {
        year,
        municipality_code,
        municipality_name: row.to_value("nome_municipio").unwrap_or_default(),
        is_capital: row
            .to_value::<Option<i32>>("municipio_capital")
            .unwrap_or(None)
            .is_some_and(|v| v != 0),
        longitude: row.to_value("longitude").unwrap_or(None),
        latitude: row.to_value("latitude").unwrap_or(None),
        unit_code,
        unit_abbreviation: row.to_value("sigla_uf").unwrap_or_default(),
        unit_name: row.to_value("nome_uf").unwrap_or_default(),
        region: Region::resolve(region_code, unit_code),
        total_gdp: row.to_value("vl_pib").unwrap_or(0.0),
        gdp_per_capita: row.to_value("vl_pib_per_capta").unwrap_or(0.0),
        agriculture: row.to_value("vl_agropecuaria").unwrap_or(0.0),
        industry: row.to_value("vl_industria").unwrap_or(0.0),
        services: row.to_value("vl_servicos").unwrap_or(0.0),
        public_administration: row.to_value("vl_administracao").unwrap_or(0.0),
        gross_value_total: None,
        subsidies: None,
        estimated_population: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(1, 3), "$1, $2, $3");
        assert_eq!(placeholders(3, 2), "$3, $4");
        assert_eq!(placeholders(1, 0), "");
    }

    fn row(columns: &[(&str, DatabaseValue)]) -> Row {
        Row {
            columns: columns
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn fact_row_is_decoded() {
        let fact = fact_from_row(&row(&[
            ("ano_pib", DatabaseValue::Int32(2021)),
            ("codigo_municipio_dv", DatabaseValue::Int64(3_550_308)),
            ("nome_municipio", DatabaseValue::String("São Paulo".to_string())),
            ("cd_uf", DatabaseValue::Int32(35)),
        ]))
        .unwrap();

        assert_eq!(fact.year, 2021);
        assert_eq!(fact.municipality_code, 3_550_308);
        assert_eq!(fact.municipality_name, "São Paulo");
        assert_eq!(fact.unit_code, 35);
    }

    #[test]
    fn undecodable_year_is_a_conversion_error() {
        let err = fact_from_row(&row(&[
            ("ano_pib", DatabaseValue::String("n/a".to_string())),
            ("codigo_municipio_dv", DatabaseValue::Int64(3_550_308)),
        ]))
        .unwrap_err();

        assert!(matches!(err, DbError::Conversion { ref message } if message.contains("ano_pib")));
    }

    #[test]
    fn undecodable_municipality_code_is_a_conversion_error() {
        let err = fact_from_row(&row(&[
            ("ano_pib", DatabaseValue::Int32(2021)),
            ("codigo_municipio_dv", DatabaseValue::String("n/a".to_string())),
        ]))
        .unwrap_err();

        assert!(matches!(
            err,
            DbError::Conversion { ref message } if message.contains("codigo_municipio_dv")
        ));
    }
}
