pub mod access; // Doctor access grants and tokens
pub mod advisory; // Language-model bridge
pub mod config;
pub mod core_state; // Application context
pub mod db;
pub mod home; // Dashboard views
pub mod models;
pub mod records; // Typed record mutations
pub mod session;

mod phi_audit;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
