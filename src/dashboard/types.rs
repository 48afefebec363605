use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AppointmentRow;

/// Most-recent-first sample size for the recency-biased distributions.
pub const SAMPLE_LIMIT: usize = 50;

/// Open-ended `value → count` distribution.
pub type Tally = BTreeMap<String, u64>;

/// Patients per fixed age range. Always carries exactly the four ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeDistribution {
    #[serde(rename = "0-18")]
    pub up_to_18: u64,
    #[serde(rename = "19-35")]
    pub from_19_to_35: u64,
    #[serde(rename = "36-55")]
    pub from_36_to_55: u64,
    #[serde(rename = "56+")]
    pub from_56: u64,
}

impl AgeDistribution {
    pub const LABELS: [&'static str; 4] = ["0-18", "19-35", "36-55", "56+"];

    pub fn record(&mut self, age: i64) {
        match age {
            i64::MIN..=18 => self.up_to_18 += 1,
            19..=35 => self.from_19_to_35 += 1,
            36..=55 => self.from_36_to_55 += 1,
            _ => self.from_56 += 1,
        }
    }

    /// Counts in `LABELS` order.
    pub fn values(&self) -> [u64; 4] {
        [
            self.up_to_18,
            self.from_19_to_35,
            self.from_36_to_55,
            self.from_56,
        ]
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        Self::LABELS
            .iter()
            .position(|l| *l == label)
            .map(|i| self.values()[i])
    }

    pub fn total(&self) -> u64 {
        self.values().iter().sum()
    }
}

/// Patients per gender bucket. Always carries exactly Male / Female / Other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderDistribution {
    #[serde(rename = "Male")]
    pub male: u64,
    #[serde(rename = "Female")]
    pub female: u64,
    #[serde(rename = "Other")]
    pub other: u64,
}

impl GenderDistribution {
    pub const LABELS: [&'static str; 3] = ["Male", "Female", "Other"];

    /// Bucket a normalized (trimmed, lower-cased) value by its first letter.
    /// Empty values are not counted anywhere.
    pub fn record(&mut self, normalized: &str) {
        match normalized.chars().next() {
            None => {}
            Some('m') => self.male += 1,
            Some('f') => self.female += 1,
            Some(_) => self.other += 1,
        }
    }

    pub fn values(&self) -> [u64; 3] {
        [self.male, self.female, self.other]
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        Self::LABELS
            .iter()
            .position(|l| *l == label)
            .map(|i| self.values()[i])
    }

    pub fn total(&self) -> u64 {
        self.values().iter().sum()
    }
}

/// Complete dashboard state at one point in time.
///
/// Published behind an `Arc` and replaced wholesale on every update;
/// subscribers never observe a partially assembled snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub total_patients: u64,
    pub automations_running: u64,
    pub appointments_scheduled: u64,
    pub recent_appointments: Vec<AppointmentRow>,
    pub age_distribution: AgeDistribution,
    pub gender_distribution: GenderDistribution,
    pub service_category_distribution: Tally,
    pub platform_distribution: Tally,
    pub location_distribution: Tally,
    pub scheduling_success_rate: u32,
    pub is_loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    /// All figures reset, stamped with the failure time.
    pub fn failed(at: DateTime<Utc>) -> Self {
        Self {
            last_updated: Some(at),
            ..Self::default()
        }
    }

    /// Same figures, flagged as loading.
    pub fn loading(&self) -> Self {
        Self {
            is_loading: true,
            ..self.clone()
        }
    }

    /// Equal in every figure, ignoring `is_loading` and `last_updated`.
    pub fn same_figures(&self, other: &Self) -> bool {
        Self {
            is_loading: false,
            last_updated: None,
            ..self.clone()
        } == Self {
            is_loading: false,
            last_updated: None,
            ..other.clone()
        }
    }
}

/// Raw query results for one cycle, before bucketing.
#[derive(Debug, Clone, Default)]
pub struct DashboardRows {
    /// Latest appointment-detail rows, at most `SAMPLE_LIMIT`.
    pub sample: Vec<AppointmentRow>,
    pub total_patients: u64,
    /// Trimmed, non-empty values from full-population scans.
    pub agents: Vec<String>,
    pub platforms: Vec<String>,
    pub locations: Vec<String>,
    pub service_categories: Vec<String>,
}

/// Result of a `load()` / `refresh()` trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh snapshot published.
    Loaded,
    /// A query failed; the reset snapshot was published.
    Failed,
    /// Another cycle was in flight; nothing happened.
    Skipped,
    /// The aggregator was destroyed; nothing was published.
    Destroyed,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
