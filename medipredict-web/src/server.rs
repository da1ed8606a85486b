//! HTTP listener and background housekeeping.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::WebError;
use crate::router;
use crate::state::SharedState;

const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Serve until Ctrl-C.
pub async fn run(state: SharedState) -> Result<(), WebError> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "MediPredict listening");

    let reaper = spawn_session_reaper(Arc::clone(&state));
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Some(handle) = reaper {
        handle.abort();
    }
    served?;
    info!("Server stopped");
    Ok(())
}

/// Periodically drop sessions idle longer than `security.session_ttl_secs`.
/// A TTL of zero keeps sessions forever.
fn spawn_session_reaper(state: SharedState) -> Option<JoinHandle<()>> {
    let ttl_secs = state.config.security.session_ttl_secs;
    if ttl_secs == 0 {
        return None;
    }
    let ttl = chrono::Duration::seconds(ttl_secs.min(i32::MAX as u64) as i64);
    Some(tokio::spawn(async move {
        let mut tick = tokio::time::interval(REAP_INTERVAL);
        loop {
            tick.tick().await;
            let removed = state.sessions.lock().await.expire_idle(ttl);
            if removed > 0 {
                debug!(removed, "Expired idle sessions");
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
