use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Installs the global subscriber. `RUST_LOG` wins over `EXAMTRACK_LOG_LEVEL`.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let installed = if telemetry.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(
        environment = settings.runtime().environment.as_str(),
        json = telemetry.json,
        "tracing initialised"
    );

    Ok(())
}
