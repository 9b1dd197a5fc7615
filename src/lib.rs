pub mod allergies;
pub mod auth;
pub mod config;
pub mod db;
pub mod lab_report;
pub mod models;
pub mod radiology;
pub mod screen;
pub mod share;
pub mod store;
pub mod vitals;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`.
/// Calling it again (a host app re-entering, a second test) is a no-op.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    if result.is_ok() {
        tracing::info!("{} core starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(config::default_log_filter()).is_ok());
    }
}
