//! Pure view-model functions: turn a `DashboardSnapshot` into what a client
//! renders (chart series, location ranking, appointment rows and cards).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dashboard::{AgeDistribution, GenderDistribution, Tally};
use crate::format::{format_time_12h, percentage_of_total, time_passed, PLACEHOLDER};
use crate::models::{AppointmentRow, StatusTone};

pub const MAX_APPOINTMENTS_TABLE: usize = 10;
pub const MAX_APPOINTMENTS_EXPANDED: usize = 12;
pub const MAX_LOCATIONS_DISPLAY: usize = 10;

pub const TABLE_COLUMNS: [&str; 5] = ["DATE", "TIME", "PATIENT NAME", "SERVICE", "STATUS"];

pub const PLATFORM_COLORS: [&str; 12] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#06B6D4", "#F97316", "#84CC16",
    "#EC4899", "#14B8A6", "#F43F5E", "#8B5A2B",
];

pub const SERVICE_COLORS: [&str; 12] = [
    "#007AFF", "#5856D6", "#34C759", "#FF9500", "#FF3B30", "#FFC0CB", "#8B5CF6", "#06B6D4",
    "#F59E0B", "#EF4444", "#10B981", "#6366F1",
];

// ═══════════════════════════════════════════
// Chart series
// ═══════════════════════════════════════════

/// Fixed-label series (age ranges, genders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSeries {
    pub labels: Vec<&'static str>,
    pub data: Vec<u64>,
    pub total: u64,
    /// Index of the first largest bucket.
    pub max_index: usize,
    pub has_data: bool,
}

/// Open-ended series sorted by count, one color per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
    pub colors: Vec<&'static str>,
    pub total: u64,
    pub max_index: usize,
}

fn bucket_series(labels: &[&'static str], data: &[u64]) -> BucketSeries {
    let total = data.iter().sum();
    BucketSeries {
        labels: labels.to_vec(),
        data: data.to_vec(),
        total,
        max_index: first_max_index(data),
        has_data: total > 0,
    }
}

fn first_max_index(data: &[u64]) -> usize {
    let max = data.iter().copied().max().unwrap_or(0);
    data.iter().position(|v| *v == max).unwrap_or(0)
}

pub fn age_series(ages: &AgeDistribution) -> BucketSeries {
    bucket_series(&AgeDistribution::LABELS, &ages.values())
}

pub fn gender_series(genders: &GenderDistribution) -> BucketSeries {
    bucket_series(&GenderDistribution::LABELS, &genders.values())
}

/// Entries by count descending; ties keep label order.
fn sorted_entries(distribution: &Tally) -> Vec<(&String, u64)> {
    let mut entries: Vec<_> = distribution.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

fn palette_series(distribution: &Tally, palette: &[&'static str]) -> Option<ChartSeries> {
    if distribution.is_empty() {
        return None;
    }
    let entries = sorted_entries(distribution);
    let data: Vec<u64> = entries.iter().map(|(_, count)| *count).collect();
    Some(ChartSeries {
        labels: entries.iter().map(|(label, _)| (*label).clone()).collect(),
        colors: (0..data.len()).map(|i| palette[i % palette.len()]).collect(),
        total: data.iter().sum(),
        max_index: first_max_index(&data),
        data,
    })
}

pub fn platform_series(platforms: &Tally) -> Option<ChartSeries> {
    palette_series(platforms, &PLATFORM_COLORS)
}

pub fn service_category_series(categories: &Tally) -> Option<ChartSeries> {
    palette_series(categories, &SERVICE_COLORS)
}

// ═══════════════════════════════════════════
// Locations
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationRank {
    /// 1-based.
    pub rank: usize,
    pub location: String,
    pub count: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRanking {
    pub locations: Vec<LocationRank>,
    /// Sum over all locations, not only the displayed ones.
    pub total_patients: u64,
}

/// Top locations by count. `None` when there is no location data.
pub fn location_ranking(locations: &Tally) -> Option<LocationRanking> {
    let total: u64 = locations.values().sum();
    if total == 0 {
        return None;
    }
    let ranked = sorted_entries(locations)
        .into_iter()
        .take(MAX_LOCATIONS_DISPLAY)
        .enumerate()
        .map(|(i, (location, count))| LocationRank {
            rank: i + 1,
            location: location.clone(),
            count,
            percentage: percentage_of_total(count, total).unwrap_or(0),
        })
        .collect();
    Some(LocationRanking {
        locations: ranked,
        total_patients: total,
    })
}

// ═══════════════════════════════════════════
// Appointments
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    /// Lower-cased status, empty when missing.
    pub status: String,
    pub label: String,
    pub tone: StatusTone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentTableRow {
    pub key: String,
    pub date: String,
    pub time: String,
    pub name: String,
    pub service: String,
    pub status: StatusBadge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCard {
    pub id: String,
    pub inquiry_number: String,
    pub display_date: String,
    pub display_time: String,
    pub time_passed: String,
    pub appointment: AppointmentRow,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Scheduled date, else the date part of the creation timestamp.
fn display_date(row: &AppointmentRow) -> Option<String> {
    non_empty(row.scheduled_date.as_deref())
        .map(str::to_string)
        .or_else(|| {
            non_empty(row.appointment_created_at.as_deref())
                .and_then(|created| created.split('T').next())
                .map(str::to_string)
        })
}

fn status_badge(row: &AppointmentRow) -> StatusBadge {
    let status = row.normalized_status();
    StatusBadge {
        tone: StatusTone::from_status(&status),
        label: non_empty(row.status.as_deref())
            .unwrap_or(PLACEHOLDER)
            .to_string(),
        status,
    }
}

pub fn appointment_table_rows(rows: &[AppointmentRow], limit: usize) -> Vec<AppointmentTableRow> {
    rows.iter()
        .take(limit)
        .enumerate()
        .map(|(idx, row)| AppointmentTableRow {
            key: row.appointment_id.clone().unwrap_or_else(|| idx.to_string()),
            date: display_date(row).unwrap_or_default(),
            time: row.scheduled_time.clone().unwrap_or_default(),
            name: non_empty(row.name.as_deref()).unwrap_or(PLACEHOLDER).to_string(),
            service: non_empty(row.service_name.as_deref())
                .unwrap_or(PLACEHOLDER)
                .to_string(),
            status: status_badge(row),
        })
        .collect()
}

pub fn appointment_cards(
    rows: &[AppointmentRow],
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<AppointmentCard> {
    rows.iter()
        .take(limit)
        .enumerate()
        .map(|(idx, row)| AppointmentCard {
            id: row
                .appointment_id
                .clone()
                .or_else(|| row.patient_id.clone())
                .unwrap_or_else(|| idx.to_string()),
            inquiry_number: row
                .appointment_id
                .clone()
                .unwrap_or_else(|| (idx + 1).to_string()),
            display_date: display_date(row).unwrap_or_else(|| PLACEHOLDER.to_string()),
            display_time: format_time_12h(row.scheduled_time.as_deref()),
            time_passed: time_passed(row.appointment_created_at.as_deref(), now),
            appointment: row.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tally(pairs: &[(&str, u64)]) -> Tally {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn appointment(id: Option<&str>, date: Option<&str>, created: Option<&str>) -> AppointmentRow {
        AppointmentRow {
            appointment_id: id.map(Into::into),
            scheduled_date: date.map(Into::into),
            appointment_created_at: created.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn age_series_keeps_label_order_and_first_max() {
        let ages = AgeDistribution {
            up_to_18: 1,
            from_19_to_35: 3,
            from_36_to_55: 3,
            from_56: 0,
        };
        let series = age_series(&ages);
        assert_eq!(series.labels, vec!["0-18", "19-35", "36-55", "56+"]);
        assert_eq!(series.data, vec![1, 3, 3, 0]);
        assert_eq!(series.total, 7);
        assert_eq!(series.max_index, 1);
        assert!(series.has_data);
    }

    #[test]
    fn empty_gender_series_has_no_data() {
        let series = gender_series(&GenderDistribution::default());
        assert_eq!(series.labels, vec!["Male", "Female", "Other"]);
        assert_eq!(series.max_index, 0);
        assert!(!series.has_data);
    }

    #[test]
    fn platform_series_sorted_descending() {
        let series = platform_series(&tally(&[("web", 2), ("sms", 1), ("whatsapp", 5)])).unwrap();
        assert_eq!(series.labels, vec!["whatsapp", "web", "sms"]);
        assert_eq!(series.data, vec![5, 2, 1]);
        assert_eq!(series.colors, vec!["#3B82F6", "#10B981", "#F59E0B"]);
        assert_eq!(series.total, 8);
        assert_eq!(series.max_index, 0);
    }

    #[test]
    fn palette_cycles_past_its_length() {
        let pairs: Vec<(String, u64)> = (0..14).map(|i| (format!("c{i:02}"), 1)).collect();
        let categories: Tally = pairs.into_iter().collect();
        let series = service_category_series(&categories).unwrap();
        assert_eq!(series.colors.len(), 14);
        assert_eq!(series.colors[12], SERVICE_COLORS[0]);
        assert_eq!(series.colors[13], SERVICE_COLORS[1]);
    }

    #[test]
    fn empty_distribution_has_no_series() {
        assert!(platform_series(&Tally::new()).is_none());
        assert!(service_category_series(&Tally::new()).is_none());
    }

    #[test]
    fn location_ranking_top_ten_with_overall_percentages() {
        let pairs: Vec<(String, u64)> = (1..=12).map(|i| (format!("city{i:02}"), i)).collect();
        let locations: Tally = pairs.into_iter().collect();
        let ranking = location_ranking(&locations).unwrap();

        assert_eq!(ranking.total_patients, 78);
        assert_eq!(ranking.locations.len(), 10);
        assert_eq!(ranking.locations[0].rank, 1);
        assert_eq!(ranking.locations[0].location, "city12");
        assert_eq!(ranking.locations[0].percentage, 15);
        assert_eq!(ranking.locations[9].location, "city03");
    }

    #[test]
    fn no_locations_no_ranking() {
        assert!(location_ranking(&Tally::new()).is_none());
    }

    #[test]
    fn table_rows_fill_placeholders() {
        let rows = vec![
            AppointmentRow {
                appointment_id: Some("a1".into()),
                scheduled_date: Some("2026-03-01".into()),
                scheduled_time: Some("09:30".into()),
                name: Some("Ana".into()),
                service_name: Some("Cleaning".into()),
                status: Some("Confirmed".into()),
                ..Default::default()
            },
            appointment(None, None, Some("2026-02-27T08:15:00Z")),
        ];
        let table = appointment_table_rows(&rows, MAX_APPOINTMENTS_TABLE);

        assert_eq!(table[0].key, "a1");
        assert_eq!(table[0].status.status, "confirmed");
        assert_eq!(table[0].status.label, "Confirmed");
        assert_eq!(table[0].status.tone, StatusTone::Confirmed);

        assert_eq!(table[1].key, "1");
        assert_eq!(table[1].date, "2026-02-27");
        assert_eq!(table[1].time, "");
        assert_eq!(table[1].name, "—");
        assert_eq!(table[1].service, "—");
        assert_eq!(table[1].status.status, "");
        assert_eq!(table[1].status.label, "—");
    }

    #[test]
    fn table_rows_respect_limit() {
        let rows: Vec<_> = (0..15).map(|_| AppointmentRow::default()).collect();
        assert_eq!(appointment_table_rows(&rows, MAX_APPOINTMENTS_TABLE).len(), 10);
        assert_eq!(appointment_cards(&rows, MAX_APPOINTMENTS_EXPANDED, Utc::now()).len(), 12);
    }

    #[test]
    fn cards_format_time_and_elapsed() {
        let now = Utc::now();
        let created = (now - Duration::hours(50)).to_rfc3339();
        let mut row = appointment(Some("77"), Some("2026-03-05"), Some(&created));
        row.scheduled_time = Some("15:45".into());

        let cards = appointment_cards(&[row, AppointmentRow::default()], 12, now);
        assert_eq!(cards[0].id, "77");
        assert_eq!(cards[0].inquiry_number, "77");
        assert_eq!(cards[0].display_date, "2026-03-05");
        assert_eq!(cards[0].display_time, "3:45 PM");
        assert_eq!(cards[0].time_passed, "2 days");

        assert_eq!(cards[1].id, "1");
        assert_eq!(cards[1].inquiry_number, "2");
        assert_eq!(cards[1].display_date, "—");
        assert_eq!(cards[1].display_time, "—");
        assert_eq!(cards[1].time_passed, "0 hours");
    }
}
