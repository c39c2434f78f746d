//! Farm client profiles — the destination of everything the pipeline extracts.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::pipeline::sync::FormDataState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmProfile {
    pub id: Uuid,
    pub name: String,
    pub legal_form: Option<String>,
    pub siren: Option<String>,
    pub siret: Option<String>,
    pub cui: Option<String>,
    pub iban: Option<String>,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub turnover: Option<f64>,
    pub employee_count: Option<i64>,
    pub land_area_ha: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FarmProfile {
    /// New empty profile with just a display name.
    pub fn new(name: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            legal_form: None,
            siren: None,
            siret: None,
            cui: None,
            iban: None,
            address: None,
            contact_email: None,
            contact_phone: None,
            turnover: None,
            employee_count: None,
            land_area_ha: None,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn insert_farm(conn: &Connection, farm: &FarmProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO farms (id, name, legal_form, siren, siret, cui, iban, address,
         contact_email, contact_phone, turnover, employee_count, land_area_ha,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            farm.id.to_string(),
            farm.name,
            farm.legal_form,
            farm.siren,
            farm.siret,
            farm.cui,
            farm.iban,
            farm.address,
            farm.contact_email,
            farm.contact_phone,
            farm.turnover,
            farm.employee_count,
            farm.land_area_ha,
            farm.created_at.to_string(),
            farm.updated_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_farm(conn: &Connection, id: &Uuid) -> Result<Option<FarmProfile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, legal_form, siren, siret, cui, iban, address,
         contact_email, contact_phone, turnover, employee_count, land_area_ha,
         created_at, updated_at
         FROM farms WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(FarmRow {
            id: row.get::<_, String>(0)?,
            name: row.get(1)?,
            legal_form: row.get(2)?,
            siren: row.get(3)?,
            siret: row.get(4)?,
            cui: row.get(5)?,
            iban: row.get(6)?,
            address: row.get(7)?,
            contact_email: row.get(8)?,
            contact_phone: row.get(9)?,
            turnover: row.get(10)?,
            employee_count: row.get(11)?,
            land_area_ha: row.get(12)?,
            created_at: row.get::<_, String>(13)?,
            updated_at: row.get::<_, String>(14)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(farm_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Apply recognized form fields to the farm row.
///
/// The form is the single source downstream persistence consumes; only the
/// columns the profile actually carries are mapped, everything else stays in
/// `form_data` for the consultant UI.
pub fn apply_form_to_profile(
    conn: &Connection,
    farm_id: &Uuid,
    form: &FormDataState,
) -> Result<usize, DatabaseError> {
    let mut applied = 0usize;

    let text = |key: &str| form.get(key).and_then(|v| v.as_str().map(String::from));
    let number = |key: &str| form.get(key).and_then(|v| v.as_f64());

    let mappings: Vec<(&str, Option<String>)> = vec![
        ("farm_name", text("farm_name")),
        ("legal_form", text("legal_form")),
        ("siren_number", text("siren_number")),
        ("siret_number", text("siret_number")),
        ("cui_number", text("cui_number")),
        ("iban", text("iban")),
        ("address", text("address")),
        ("contact_email", text("contact_email")),
        ("contact_phone", text("contact_phone")),
    ];

    for (field, value) in mappings {
        if let Some(value) = value {
            let column = match field {
                "farm_name" => "name",
                "siren_number" => "siren",
                "siret_number" => "siret",
                "cui_number" => "cui",
                other => other,
            };
            conn.execute(
                &format!("UPDATE farms SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, Utc::now().naive_utc().to_string(), farm_id.to_string()],
            )?;
            applied += 1;
        }
    }

    if let Some(turnover) = number("turnover") {
        conn.execute(
            "UPDATE farms SET turnover = ?1, updated_at = ?2 WHERE id = ?3",
            params![turnover, Utc::now().naive_utc().to_string(), farm_id.to_string()],
        )?;
        applied += 1;
    }
    if let Some(count) = number("employee_count") {
        conn.execute(
            "UPDATE farms SET employee_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![count as i64, Utc::now().naive_utc().to_string(), farm_id.to_string()],
        )?;
        applied += 1;
    }
    if let Some(area) = number("land_area_ha") {
        conn.execute(
            "UPDATE farms SET land_area_ha = ?1, updated_at = ?2 WHERE id = ?3",
            params![area, Utc::now().naive_utc().to_string(), farm_id.to_string()],
        )?;
        applied += 1;
    }

    Ok(applied)
}

struct FarmRow {
    id: String,
    name: String,
    legal_form: Option<String>,
    siren: Option<String>,
    siret: Option<String>,
    cui: Option<String>,
    iban: Option<String>,
    address: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    turnover: Option<f64>,
    employee_count: Option<i64>,
    land_area_ha: Option<f64>,
    created_at: String,
    updated_at: String,
}

fn farm_from_row(row: FarmRow) -> Result<FarmProfile, DatabaseError> {
    Ok(FarmProfile {
        id: Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
            field: "farms.id".into(),
            value: row.id.clone(),
        })?,
        name: row.name,
        legal_form: row.legal_form,
        siren: row.siren,
        siret: row.siret,
        cui: row.cui,
        iban: row.iban,
        address: row.address,
        contact_email: row.contact_email,
        contact_phone: row.contact_phone,
        turnover: row.turnover,
        employee_count: row.employee_count,
        land_area_ha: row.land_area_ha,
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
    })
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap_or_default()
}
