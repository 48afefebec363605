use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use super::error::DashboardError;
use super::types::{DashboardRows, SAMPLE_LIMIT};
use crate::backend::{BackendError, DashboardBackend, Query, Row};
use crate::config::DashboardSettings;
use crate::models::AppointmentRow;

// ---------------------------------------------------------------------------
// Query definitions
// ---------------------------------------------------------------------------

/// Latest appointment-detail rows, newest date first, then newest time.
pub fn sample_query(settings: &DashboardSettings) -> Query {
    let mut query = Query::from(settings.tables.appointment_details.as_str())
        .select(AppointmentRow::COLUMNS)
        .order_desc("scheduled_date")
        .order_desc("scheduled_time")
        .limit(SAMPLE_LIMIT);
    if let Some(flag) = &settings.success_flag_column {
        query = query.select([flag.as_str()]);
    }
    query
}

/// Authoritative patient count over the whole patients table.
pub fn patient_count_query(settings: &DashboardSettings) -> Query {
    Query::from(settings.tables.patients.as_str()).select(["id"])
}

/// Every non-null value of `column` in `table`.
pub fn population_query(table: &str, column: &str) -> Query {
    Query::from(table).select([column]).not_null(column)
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Issue all six queries for one cycle. They are independent, so they run
/// concurrently; the first failure aborts the rest.
pub async fn fetch_dashboard_rows<B: DashboardBackend>(
    backend: &B,
    settings: &DashboardSettings,
) -> Result<DashboardRows, DashboardError> {
    let tables = &settings.tables;

    let sample_q = sample_query(settings);
    let count_q = patient_count_query(settings);
    let agents_q = population_query(&tables.patients, "last_agent");
    let platforms_q = population_query(&tables.patients, "platform");
    let locations_q = population_query(&tables.patients, "location");
    let services_q = population_query(&tables.appointments, "service_category");

    let (sample, total_patients, agents, platforms, locations, services) = tokio::try_join!(
        with_policy("recent_appointments", settings, || backend.select(&sample_q)),
        with_policy("patient_count", settings, || backend.count(&count_q)),
        with_policy("active_agents", settings, || backend.select(&agents_q)),
        with_policy("platforms", settings, || backend.select(&platforms_q)),
        with_policy("locations", settings, || backend.select(&locations_q)),
        with_policy("service_categories", settings, || backend.select(&services_q)),
    )?;

    let mut sample = decode_sample(sample, settings.success_flag_column.as_deref())?;
    sample.truncate(SAMPLE_LIMIT);

    Ok(DashboardRows {
        sample,
        total_patients,
        agents: column_values(&agents, "last_agent"),
        platforms: column_values(&platforms, "platform"),
        locations: column_values(&locations, "location"),
        service_categories: column_values(&services, "service_category"),
    })
}

/// Run one query under the configured timeout, retrying failures with
/// exponential backoff.
async fn with_policy<T, F, Fut>(
    query: &'static str,
    settings: &DashboardSettings,
    op: F,
) -> Result<T, DashboardError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match tokio::time::timeout(settings.query_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(source)) => DashboardError::Backend { query, source },
            Err(_) => DashboardError::Timeout {
                query,
                timeout_ms: settings.query_timeout.as_millis() as u64,
            },
        };

        if attempt >= settings.query_retries {
            return Err(err);
        }
        let delay = backoff_delay(settings.retry_backoff, attempt);
        attempt += 1;
        tracing::warn!(
            query,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Dashboard query failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Decode sample rows. A configured flag column under another name is read
/// as `successful_scheduling`.
fn decode_sample(
    rows: Vec<Row>,
    flag_column: Option<&str>,
) -> Result<Vec<AppointmentRow>, DashboardError> {
    rows.into_iter()
        .map(|mut row| {
            if let Some(flag) = flag_column.filter(|c| *c != "successful_scheduling") {
                if let Some(value) = row.remove(flag) {
                    row.insert("successful_scheduling".into(), value);
                }
            }
            serde_json::from_value(Value::Object(row))
                .map_err(|e| DashboardError::Decode(e.to_string()))
        })
        .collect()
}

/// Trimmed, non-empty textual values of one column.
fn column_values(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .filter_map(|row| match row.get(column)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn sample_query_orders_and_limits() {
        let query = sample_query(&DashboardSettings::default());
        assert_eq!(query.table, "appointment_details");
        assert_eq!(query.limit, Some(50));
        let order: Vec<_> = query.order.iter().map(|o| (o.column.as_str(), o.descending)).collect();
        assert_eq!(order, vec![("scheduled_date", true), ("scheduled_time", true)]);
        assert!(!query.columns.iter().any(|c| c == "successful_scheduling"));
    }

    #[test]
    fn success_flag_column_is_projected_when_configured() {
        let settings = DashboardSettings {
            success_flag_column: Some("successful_scheduling".into()),
            ..Default::default()
        };
        let query = sample_query(&settings);
        assert_eq!(query.columns.last().map(String::as_str), Some("successful_scheduling"));
    }

    #[test]
    fn patient_count_projects_the_key_column() {
        let query = patient_count_query(&DashboardSettings::default());
        assert_eq!(query.table, "patients");
        assert_eq!(query.columns, vec!["id"]);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn population_queries_filter_nulls() {
        let query = population_query("patients", "platform");
        assert_eq!(query.columns, vec!["platform"]);
        assert_eq!(query.filters.len(), 1);
        assert!(query.limit.is_none());
    }

    #[test]
    fn column_values_stringify_and_trim() {
        let rows = vec![
            row(json!({ "platform": " web " })),
            row(json!({ "platform": 7 })),
            row(json!({ "platform": "" })),
            row(json!({ "platform": null })),
            row(json!({ "other": "x" })),
        ];
        assert_eq!(column_values(&rows, "platform"), vec!["web", "7"]);
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    #[test]
    fn oddly_typed_fields_still_decode() {
        let rows = vec![
            row(json!({ "name": "Ana", "gender": 1, "status": false })),
            row(json!({ "name": 12, "gender": "female", "status": "scheduled" })),
        ];
        let decoded = decode_sample(rows, None).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].gender.as_deref(), Some("1"));
        assert_eq!(decoded[0].status.as_deref(), Some("false"));
        assert_eq!(decoded[1].name.as_deref(), Some("12"));
    }

    #[test]
    fn renamed_flag_column_maps_to_success_flag() {
        let rows = vec![row(json!({ "name": "Ana", "booked_ok": true }))];
        let decoded = decode_sample(rows, Some("booked_ok")).unwrap();
        assert_eq!(decoded[0].successful_scheduling, Some(true));
    }
}
