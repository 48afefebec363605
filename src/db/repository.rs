//! Write-side helpers for the local SQLite schema.
//!
//! The dashboard itself is read-only; these exist to seed a local database
//! (fixtures, demos, imports from an export of the hosted project).

use rusqlite::{params, Connection};

use super::DatabaseError;

/// A patient record to insert. `age_text` is used only when `age` is absent;
/// the column has INTEGER affinity, so numeric text becomes an integer and
/// anything else stays as text.
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<i64>,
    pub age_text: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub last_agent: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub service_name: Option<String>,
    pub service_category: Option<String>,
    pub service_price: Option<f64>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub status: Option<String>,
    pub successful_scheduling: Option<bool>,
    /// Creation timestamp; the column default (now) applies when absent.
    pub created_at: Option<String>,
}

// ═══════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════

pub fn insert_patient(conn: &Connection, patient: &NewPatient) -> Result<i64, DatabaseError> {
    let age: Option<rusqlite::types::Value> = match (&patient.age, &patient.age_text) {
        (Some(age), _) => Some(rusqlite::types::Value::Integer(*age)),
        (None, Some(text)) => Some(rusqlite::types::Value::Text(text.clone())),
        (None, None) => None,
    };

    conn.execute(
        "INSERT INTO patients (name, age, gender, phone, email, location, last_agent, platform)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient.name,
            age,
            patient.gender,
            patient.phone,
            patient.email,
            patient.location,
            patient.last_agent,
            patient.platform,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ═══════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════

pub fn insert_appointment(
    conn: &Connection,
    appt: &NewAppointment,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (patient_id, service_name, service_category, service_price,
         scheduled_date, scheduled_time, status, successful_scheduling, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                 COALESCE(?9, strftime('%Y-%m-%dT%H:%M:%SZ', 'now')))",
        params![
            appt.patient_id,
            appt.service_name,
            appt.service_category,
            appt.service_price,
            appt.scheduled_date,
            appt.scheduled_time,
            appt.status,
            appt.successful_scheduling.map(i32::from),
            appt.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn insert_patient_returns_rowid() {
        let conn = open_memory_database().unwrap();
        let first = insert_patient(&conn, &NewPatient { name: "A".into(), ..Default::default() }).unwrap();
        let second = insert_patient(&conn, &NewPatient { name: "B".into(), ..Default::default() }).unwrap();
        assert_ne!(first, second);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn textual_age_is_kept_as_text() {
        let conn = open_memory_database().unwrap();
        insert_patient(
            &conn,
            &NewPatient {
                name: "A".into(),
                age_text: Some("unknown".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let kind: String = conn
            .query_row("SELECT typeof(age) FROM patients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kind, "text");
    }

    #[test]
    fn appointment_requires_existing_patient() {
        let conn = open_memory_database().unwrap();
        let result = insert_appointment(
            &conn,
            &NewAppointment {
                patient_id: 999,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn appointment_created_at_defaults_to_now() {
        let conn = open_memory_database().unwrap();
        let patient = insert_patient(&conn, &NewPatient { name: "A".into(), ..Default::default() }).unwrap();
        insert_appointment(&conn, &NewAppointment { patient_id: patient, ..Default::default() }).unwrap();
        let created: String = conn
            .query_row("SELECT appointment_created_at FROM appointment_details", [], |row| row.get(0))
            .unwrap();
        assert!(created.ends_with('Z'));
    }
}
