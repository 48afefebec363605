pub mod backend;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod format;
pub mod models;
pub mod presenter;

use std::fmt::Write as _;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use backend::{DashboardBackend, PostgrestBackend};
use config::{BackendConfig, DashboardConfig, DashboardSettings};
use dashboard::{Aggregator, DashboardSnapshot};
use db::SqliteBackend;

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let DashboardConfig { backend, settings } = config;
        match backend {
            BackendConfig::Sqlite { path } => match SqliteBackend::open(&path) {
                Ok(backend) => {
                    tracing::info!(path = %path.display(), "Using local SQLite backend");
                    serve(backend, settings).await
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to open database");
                    ExitCode::FAILURE
                }
            },
            BackendConfig::Hosted {
                url,
                api_key,
                page_size,
            } => {
                match PostgrestBackend::new(&url, &api_key, settings.query_timeout) {
                    Ok(backend) => {
                        tracing::info!(url = %url, page_size, "Using hosted PostgREST backend");
                        serve(backend.with_page_size(page_size), settings).await
                    }
                    Err(e) => {
                        tracing::error!(url = %url, error = %e, "Failed to build HTTP client");
                        ExitCode::FAILURE
                    }
                }
            }
        }
    })
}

/// Mount the dashboard and print every completed snapshot until Ctrl-C.
async fn serve<B: DashboardBackend>(backend: B, settings: DashboardSettings) -> ExitCode {
    let aggregator = Aggregator::new(backend, settings);
    aggregator.subscribe(|snapshot| {
        if !snapshot.is_loading {
            println!("{}", render_snapshot(&snapshot, Utc::now()));
        }
    });

    let outcome = aggregator.mount().await;
    tracing::info!(?outcome, "Initial dashboard load finished");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    aggregator.destroy();
    ExitCode::SUCCESS
}

/// Plain-text rendering of one snapshot for the terminal.
fn render_snapshot(snapshot: &DashboardSnapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let updated = snapshot
        .last_updated
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format::PLACEHOLDER.to_string());

    let _ = writeln!(out, "── {} ── updated {updated}", config::APP_NAME);
    let _ = writeln!(
        out,
        "Patients {}  Automations {}  Scheduled {}  Success {}%",
        snapshot.total_patients,
        snapshot.automations_running,
        snapshot.appointments_scheduled,
        snapshot.scheduling_success_rate
    );

    for (title, series) in [
        ("Age", presenter::age_series(&snapshot.age_distribution)),
        ("Gender", presenter::gender_series(&snapshot.gender_distribution)),
    ] {
        let parts: Vec<String> = series
            .labels
            .iter()
            .zip(&series.data)
            .map(|(label, count)| format!("{label}: {count}"))
            .collect();
        let _ = writeln!(out, "{title} ({} patients): {}", series.total, parts.join(", "));
    }

    for (title, series) in [
        ("Platforms", presenter::platform_series(&snapshot.platform_distribution)),
        ("Services", presenter::service_category_series(&snapshot.service_category_distribution)),
    ] {
        match series {
            Some(series) => {
                let parts: Vec<String> = series
                    .labels
                    .iter()
                    .zip(&series.data)
                    .map(|(label, count)| {
                        let pct = format::percentage_of_total(*count, series.total).unwrap_or(0);
                        format!("{label} {count} ({pct}%)")
                    })
                    .collect();
                let _ = writeln!(out, "{title}: {}", parts.join(", "));
            }
            None => {
                let _ = writeln!(out, "{title}: no data");
            }
        }
    }

    if let Some(ranking) = presenter::location_ranking(&snapshot.location_distribution) {
        let _ = writeln!(out, "Top locations (total {}):", ranking.total_patients);
        for rank in &ranking.locations {
            let _ = writeln!(
                out,
                "  {}. {}  {} patients ({}%)",
                rank.rank, rank.location, rank.count, rank.percentage
            );
        }
    }

    let _ = writeln!(out, "{}", presenter::TABLE_COLUMNS.join(" | "));
    for row in presenter::appointment_table_rows(
        &snapshot.recent_appointments,
        presenter::MAX_APPOINTMENTS_TABLE,
    ) {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {}",
            row.date,
            format::format_time_12h(Some(row.time.as_str())),
            row.name,
            row.service,
            row.status.label
        );
    }
    if let Some(latest) = snapshot.recent_appointments.first() {
        let _ = write!(
            out,
            "Latest inquiry {} ago",
            format::time_passed(latest.appointment_created_at.as_deref(), now)
        );
    }
    out
}
