//! Structured logging and optional metrics export. See `spec.md` §2
//! (ambient stack) and §7 (the engine never silently drops an error:
//! everything is logged here, even when swallowed at the call site).

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes `tracing` with an `EnvFilter` seeded from `RUST_LOG`,
/// defaulting to `info` for this crate and `warn` elsewhere.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,whatsapp_commerce_engine=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[cfg(feature = "monitoring")]
pub mod metrics_exporter {
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

    /// Installs the process-wide Prometheus recorder. The returned
    /// handle renders the scrape text on demand; the webhook router
    /// owns the `/metrics` route rather than this module opening its
    /// own listener.
    pub fn install() -> anyhow::Result<PrometheusHandle> {
        Ok(PrometheusBuilder::new().install_recorder()?)
    }
}
