use tokio::signal;

/// Waits for Ctrl+C or SIGTERM. Handed to `with_graceful_shutdown` so saves
/// already in flight finish before the process exits.
pub(crate) async fn shutdown_signal() {
    let source = tokio::select! {
        () = interrupt() => "ctrl_c",
        () = terminate() => "sigterm",
    };

    tracing::info!(source, "Shutdown requested, draining in-flight saves");
}

async fn interrupt() {
    match signal::ctrl_c().await {
        Ok(()) => {}
        Err(err) => never(err, "ctrl_c").await,
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(err) => never(err, "sigterm").await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

// A listener that failed to install must not end the select.
async fn never(err: std::io::Error, source: &'static str) {
    tracing::error!(error = %err, source, "Signal handler unavailable");
    std::future::pending::<()>().await
}
