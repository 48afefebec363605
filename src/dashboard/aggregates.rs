use chrono::{DateTime, Utc};

use super::types::*;
use crate::format::percentage_of_total;
use crate::models::AppointmentRow;

/// Age ranges over the sample. Rows without a usable age are skipped.
pub fn bucket_ages(rows: &[AppointmentRow]) -> AgeDistribution {
    let mut buckets = AgeDistribution::default();
    for age in rows.iter().filter_map(|r| r.age) {
        buckets.record(age);
    }
    buckets
}

/// Gender buckets over the sample. Rows with empty or missing gender are skipped.
pub fn bucket_genders(rows: &[AppointmentRow]) -> GenderDistribution {
    let mut buckets = GenderDistribution::default();
    for row in rows {
        buckets.record(&row.normalized_gender());
    }
    buckets
}

/// Whether a row counts as a successful scheduling event.
///
/// An explicit `successful_scheduling` flag wins; otherwise the normalized
/// status must equal `success_status` exactly.
pub fn is_successful(row: &AppointmentRow, success_status: &str) -> bool {
    match row.successful_scheduling {
        Some(flag) => flag,
        None => row.normalized_status() == success_status.trim().to_lowercase(),
    }
}

pub fn count_successful(rows: &[AppointmentRow], success_status: &str) -> u64 {
    rows.iter()
        .filter(|r| is_successful(r, success_status))
        .count() as u64
}

/// Rounded success percentage; 0 for an empty sample.
pub fn success_rate(successful: u64, sample_size: usize) -> u32 {
    percentage_of_total(successful, sample_size as u64).unwrap_or(0)
}

/// Counts per trimmed, non-empty value.
pub fn tally<'a, I>(values: I) -> Tally
where
    I: IntoIterator<Item = &'a String>,
{
    let mut counts = Tally::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Number of distinct trimmed, non-empty values.
pub fn distinct_count<'a, I>(values: I) -> u64
where
    I: IntoIterator<Item = &'a String>,
{
    tally(values).len() as u64
}

/// Reduce one cycle's query results into the published snapshot.
pub fn assemble_snapshot(
    rows: DashboardRows,
    success_status: &str,
    completed_at: DateTime<Utc>,
) -> DashboardSnapshot {
    let DashboardRows {
        mut sample,
        total_patients,
        agents,
        platforms,
        locations,
        service_categories,
    } = rows;
    sample.truncate(SAMPLE_LIMIT);

    let successful = count_successful(&sample, success_status);

    DashboardSnapshot {
        total_patients,
        automations_running: distinct_count(&agents),
        appointments_scheduled: successful,
        age_distribution: bucket_ages(&sample),
        gender_distribution: bucket_genders(&sample),
        service_category_distribution: tally(&service_categories),
        platform_distribution: tally(&platforms),
        location_distribution: tally(&locations),
        scheduling_success_rate: success_rate(successful, sample.len()),
        recent_appointments: sample,
        is_loading: false,
        last_updated: Some(completed_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(age: Option<i64>, gender: Option<&str>, status: Option<&str>) -> AppointmentRow {
        AppointmentRow {
            age,
            gender: gender.map(Into::into),
            status: status.map(Into::into),
            ..Default::default()
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    // ── Age ────────────────────────────────────────────────────────────

    #[test]
    fn age_bucket_boundaries() {
        let rows: Vec<_> = [0, 18, 19, 35, 36, 55, 56, 90]
            .into_iter()
            .map(|a| row(Some(a), None, None))
            .collect();
        let ages = bucket_ages(&rows);
        assert_eq!(ages.values(), [2, 2, 2, 2]);
    }

    #[test]
    fn missing_age_is_not_counted() {
        let rows = vec![row(None, None, None), row(Some(40), None, None)];
        let ages = bucket_ages(&rows);
        assert_eq!(ages.total(), 1);
        assert_eq!(ages.get("36-55"), Some(1));
    }

    #[test]
    fn empty_sample_keeps_all_age_keys() {
        let ages = bucket_ages(&[]);
        let json = serde_json::to_value(ages).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for label in AgeDistribution::LABELS {
            assert_eq!(json[label], 0);
        }
    }

    // ── Gender ─────────────────────────────────────────────────────────

    #[test]
    fn gender_first_letter_match() {
        let rows = vec![
            row(None, Some("Male"), None),
            row(None, Some(" m"), None),
            row(None, Some("FEMALE"), None),
            row(None, Some("non-binary"), None),
            row(None, Some(""), None),
            row(None, Some("   "), None),
            row(None, None, None),
        ];
        let genders = bucket_genders(&rows);
        assert_eq!(genders.values(), [2, 1, 1]);
        // Three rows without a gender leave the sum short of the sample.
        assert_eq!(genders.total(), rows.len() as u64 - 3);
    }

    // ── Success ────────────────────────────────────────────────────────

    #[test]
    fn status_match_is_trimmed_and_case_insensitive() {
        assert!(is_successful(&row(None, None, Some(" Scheduled ")), "scheduled"));
        assert!(!is_successful(&row(None, None, Some("scheduled-later")), "scheduled"));
        assert!(!is_successful(&row(None, None, None), "scheduled"));
    }

    #[test]
    fn explicit_flag_overrides_status() {
        let mut flagged = row(None, None, Some("cancelled"));
        flagged.successful_scheduling = Some(true);
        assert!(is_successful(&flagged, "scheduled"));

        let mut unflagged = row(None, None, Some("scheduled"));
        unflagged.successful_scheduling = Some(false);
        assert!(!is_successful(&unflagged, "scheduled"));
    }

    #[test]
    fn success_rate_rounds_and_handles_empty_sample() {
        assert_eq!(success_rate(2, 3), 67);
        assert_eq!(success_rate(0, 0), 0);
        assert_eq!(success_rate(50, 50), 100);
    }

    // ── Population tallies ─────────────────────────────────────────────

    #[test]
    fn tally_trims_and_skips_empty() {
        let counts = tally(&strings(&["WhatsApp", " WhatsApp ", "Web", "", "  "]));
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["WhatsApp"], 2);
        assert_eq!(counts["Web"], 1);
    }

    #[test]
    fn distinct_count_ignores_duplicates() {
        assert_eq!(distinct_count(&strings(&["bot-a", "bot-b", "bot-a ", ""])), 2);
    }

    // ── Assembly ───────────────────────────────────────────────────────

    #[test]
    fn assemble_reference_scenario() {
        let rows = DashboardRows {
            sample: vec![
                row(Some(10), Some("f"), Some("scheduled")),
                row(Some(40), Some("m"), Some("cancelled")),
                row(Some(70), None, Some("scheduled")),
            ],
            total_patients: 120,
            agents: strings(&["intake-bot", "intake-bot", "reminder-bot"]),
            platforms: strings(&["whatsapp", "web", "whatsapp"]),
            locations: strings(&["Lisbon"]),
            service_categories: strings(&["Dental", "Dental", "Vision"]),
        };
        let now = Utc::now();
        let snapshot = assemble_snapshot(rows, "scheduled", now);

        assert_eq!(snapshot.total_patients, 120);
        assert_eq!(snapshot.automations_running, 2);
        assert_eq!(snapshot.appointments_scheduled, 2);
        assert_eq!(snapshot.age_distribution.values(), [1, 0, 1, 1]);
        assert_eq!(snapshot.gender_distribution.values(), [1, 1, 0]);
        assert_eq!(snapshot.scheduling_success_rate, 67);
        assert_eq!(snapshot.platform_distribution["whatsapp"], 2);
        assert_eq!(snapshot.service_category_distribution["Dental"], 2);
        assert_eq!(snapshot.location_distribution["Lisbon"], 1);
        assert_eq!(snapshot.recent_appointments.len(), 3);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_updated, Some(now));
    }

    #[test]
    fn assemble_caps_sample_size() {
        let rows = DashboardRows {
            sample: (0..75).map(|_| row(Some(30), None, Some("scheduled"))).collect(),
            ..Default::default()
        };
        let snapshot = assemble_snapshot(rows, "scheduled", Utc::now());
        assert_eq!(snapshot.recent_appointments.len(), SAMPLE_LIMIT);
        assert_eq!(snapshot.age_distribution.total(), SAMPLE_LIMIT as u64);
        assert_eq!(snapshot.scheduling_success_rate, 100);
    }

    #[test]
    fn snapshot_serializes_with_contract_keys() {
        let snapshot = DashboardSnapshot::failed(Utc::now());
        let json = serde_json::to_value(&snapshot).unwrap();
        for key in [
            "totalPatients",
            "automationsRunning",
            "appointmentsScheduled",
            "recentAppointments",
            "ageDistribution",
            "genderDistribution",
            "serviceCategoryDistribution",
            "platformDistribution",
            "locationDistribution",
            "schedulingSuccessRate",
            "isLoading",
            "lastUpdated",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["genderDistribution"]["Other"], 0);
        assert!(!json["lastUpdated"].is_null());
    }
}
