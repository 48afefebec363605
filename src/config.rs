use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Clinic Pulse";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dashboard refresh cadence when nothing else is configured.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Upper bound on a single backend query before it counts as failed.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_QUERY_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Rows per page for unbounded hosted scans; Supabase's default max-rows.
pub const DEFAULT_PAGE_SIZE: usize = 1_000;
/// Status value that marks a successful scheduling event.
pub const DEFAULT_SUCCESS_STATUS: &str = "scheduled";

/// Default tracing filter, overridden by `RUST_LOG`.
pub fn default_log_filter() -> &'static str {
    "clinic_pulse_lib=info,clinic_pulse=info,warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("No backend configured: set SUPABASE_URL and SUPABASE_ANON_KEY, or CLINIC_PULSE_SQLITE")]
    MissingBackend,
}

/// Where dashboard rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Hosted PostgREST endpoint (Supabase project).
    Hosted {
        url: String,
        api_key: String,
        /// Must not exceed the project's max-rows setting.
        page_size: usize,
    },
    /// Local SQLite file with the dashboard schema.
    Sqlite { path: PathBuf },
}

/// Logical table / view names used by the dashboard queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Denormalized appointment + patient view.
    pub appointment_details: String,
    pub patients: String,
    pub appointments: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            appointment_details: "appointment_details".into(),
            patients: "patients".into(),
            appointments: "appointments".into(),
        }
    }
}

/// Everything the aggregator and poller need, independent of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    pub tables: TableNames,
    pub refresh_interval: Duration,
    pub query_timeout: Duration,
    pub query_retries: u32,
    pub retry_backoff: Duration,
    pub success_status: String,
    /// Optional boolean column on the details view that overrides status matching.
    pub success_flag_column: Option<String>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            query_retries: DEFAULT_QUERY_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            success_status: DEFAULT_SUCCESS_STATUS.into(),
            success_flag_column: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub settings: DashboardSettings,
}

impl DashboardConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// `CLINIC_PULSE_SQLITE` takes precedence over the hosted backend so a
    /// local database can be pointed at without unsetting project credentials.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = if let Some(path) = get("CLINIC_PULSE_SQLITE") {
            BackendConfig::Sqlite {
                path: PathBuf::from(path),
            }
        } else {
            match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
                (Some(url), Some(api_key)) => {
                    let page_size = match get("CLINIC_PULSE_PAGE_SIZE") {
                        Some(raw) => match raw.trim().parse::<usize>() {
                            Ok(n) if n > 0 => n,
                            _ => {
                                return Err(ConfigError::InvalidValue {
                                    var: "CLINIC_PULSE_PAGE_SIZE",
                                    value: raw,
                                })
                            }
                        },
                        None => DEFAULT_PAGE_SIZE,
                    };
                    BackendConfig::Hosted {
                        url,
                        api_key,
                        page_size,
                    }
                }
                _ => return Err(ConfigError::MissingBackend),
            }
        };

        let mut settings = DashboardSettings::default();

        if let Some(name) = get("CLINIC_PULSE_DETAILS_TABLE") {
            settings.tables.appointment_details = name;
        }
        if let Some(name) = get("CLINIC_PULSE_PATIENTS_TABLE") {
            settings.tables.patients = name;
        }
        if let Some(name) = get("CLINIC_PULSE_APPOINTMENTS_TABLE") {
            settings.tables.appointments = name;
        }
        if let Some(raw) = get("CLINIC_PULSE_REFRESH_MS") {
            settings.refresh_interval = parse_millis("CLINIC_PULSE_REFRESH_MS", &raw)?;
        }
        if let Some(raw) = get("CLINIC_PULSE_QUERY_TIMEOUT_MS") {
            settings.query_timeout = parse_millis("CLINIC_PULSE_QUERY_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("CLINIC_PULSE_QUERY_RETRIES") {
            settings.query_retries = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "CLINIC_PULSE_QUERY_RETRIES",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("CLINIC_PULSE_RETRY_BACKOFF_MS") {
            settings.retry_backoff = parse_millis("CLINIC_PULSE_RETRY_BACKOFF_MS", &raw)?;
        }
        if let Some(status) = get("CLINIC_PULSE_SUCCESS_STATUS") {
            settings.success_status = status.trim().to_lowercase();
        }
        settings.success_flag_column = get("CLINIC_PULSE_SUCCESS_FLAG_COLUMN");

        Ok(Self { backend, settings })
    }
}

/// Parse a strictly positive millisecond count.
fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        }),
    }
}
