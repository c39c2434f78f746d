pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod review; // Review edits: accept/reject extraction, field corrections

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for embedders (CLI, worker binaries, tests).
///
/// Honors `AGRODOSSIER_LOG` / `RUST_LOG` via the default env filter, falling
/// back to the crate default. Safe to call once per process.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("AgroDossier core v{}", config::APP_VERSION);
}
