use serde::{Deserialize, Serialize};

use super::lenient;

/// One row of the denormalized appointment-details view.
///
/// Rows are fetched fresh on every dashboard load and never mutated.
/// Decoding is lenient: hosted views hand back ids and ages as numbers or
/// strings depending on the column type, and missing columns default to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentRow {
    #[serde(deserialize_with = "lenient::string_or_number")]
    pub appointment_id: Option<String>,
    #[serde(deserialize_with = "lenient::string_or_number")]
    pub patient_id: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::age")]
    pub age: Option<i64>,
    #[serde(deserialize_with = "lenient::text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub service_name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub service_category: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub service_price: Option<f64>,
    #[serde(deserialize_with = "lenient::text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub scheduled_date: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub scheduled_time: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub appointment_created_at: Option<String>,
    /// Explicit success marker, present only when the view exposes it.
    #[serde(deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub successful_scheduling: Option<bool>,
}

impl AppointmentRow {
    /// Columns projected from the details view, in display order.
    pub const COLUMNS: [&'static str; 12] = [
        "appointment_id",
        "patient_id",
        "name",
        "gender",
        "age",
        "service_name",
        "service_category",
        "service_price",
        "status",
        "scheduled_date",
        "scheduled_time",
        "appointment_created_at",
    ];

    /// Status trimmed and lower-cased; empty when absent.
    pub fn normalized_status(&self) -> String {
        self.status
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }

    /// Gender trimmed and lower-cased; empty when absent.
    pub fn normalized_gender(&self) -> String {
        self.gender
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_row() {
        let row: AppointmentRow = serde_json::from_value(json!({
            "appointment_id": 17,
            "patient_id": "p-1",
            "name": "Ana Souza",
            "gender": "Female",
            "age": 34,
            "service_name": "Cleaning",
            "service_category": "Dental",
            "service_price": 120.5,
            "status": "scheduled",
            "scheduled_date": "2026-03-02",
            "scheduled_time": "09:30",
            "appointment_created_at": "2026-02-28T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(row.appointment_id.as_deref(), Some("17"));
        assert_eq!(row.patient_id.as_deref(), Some("p-1"));
        assert_eq!(row.age, Some(34));
        assert_eq!(row.service_price, Some(120.5));
        assert_eq!(row.successful_scheduling, None);
    }

    #[test]
    fn oddly_typed_text_fields_are_coerced() {
        let row: AppointmentRow = serde_json::from_value(json!({
            "name": ["not", "a", "name"],
            "gender": 1,
            "status": true,
            "service_category": { "id": 3 },
            "scheduled_time": 930
        }))
        .unwrap();

        assert_eq!(row.name, None);
        assert_eq!(row.gender.as_deref(), Some("1"));
        assert_eq!(row.status.as_deref(), Some("true"));
        assert_eq!(row.service_category, None);
        assert_eq!(row.scheduled_time.as_deref(), Some("930"));
    }

    #[test]
    fn missing_columns_default_to_none() {
        let row: AppointmentRow = serde_json::from_value(json!({ "name": "Solo" })).unwrap();
        assert_eq!(row.name.as_deref(), Some("Solo"));
        assert!(row.age.is_none());
        assert!(row.status.is_none());
    }

    #[test]
    fn string_ages_parse_leading_integer() {
        let row: AppointmentRow = serde_json::from_value(json!({ "age": " 42 years" })).unwrap();
        assert_eq!(row.age, Some(42));

        let row: AppointmentRow = serde_json::from_value(json!({ "age": "unknown" })).unwrap();
        assert_eq!(row.age, None);

        let row: AppointmentRow = serde_json::from_value(json!({ "age": null })).unwrap();
        assert_eq!(row.age, None);
    }

    #[test]
    fn success_flag_accepts_integers_and_strings() {
        let row: AppointmentRow =
            serde_json::from_value(json!({ "successful_scheduling": 1 })).unwrap();
        assert_eq!(row.successful_scheduling, Some(true));

        let row: AppointmentRow =
            serde_json::from_value(json!({ "successful_scheduling": "false" })).unwrap();
        assert_eq!(row.successful_scheduling, Some(false));
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        let row = AppointmentRow {
            status: Some("  Scheduled ".into()),
            gender: Some(" MALE".into()),
            ..Default::default()
        };
        assert_eq!(row.normalized_status(), "scheduled");
        assert_eq!(row.normalized_gender(), "male");
        assert_eq!(AppointmentRow::default().normalized_status(), "");
    }
}
