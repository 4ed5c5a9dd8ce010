pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::github::GitHubClient;
use crate::pipeline::ReviewOptions;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("In-flight requests and reviews did not finish within {0:?}")]
    DrainTimeout(Duration),
}

/// Shared state for the webhook routes.
pub struct AppState {
    pub client: GitHubClient,
    pub analyzer: Arc<dyn Analyzer>,
    pub options: ReviewOptions,
    /// Cancelled when the shutdown drain runs out of time; aborts in-flight reviews.
    pub abort: CancellationToken,
    /// Reviews queued by the webhook handler; `serve` waits for them on shutdown.
    pub tasks: TaskTracker,
    in_flight: Mutex<()>,
}

impl AppState {
    pub fn new(
        client: GitHubClient,
        analyzer: Arc<dyn Analyzer>,
        options: ReviewOptions,
        abort: CancellationToken,
    ) -> Self {
        Self {
            client,
            analyzer,
            options,
            abort,
            tasks: TaskTracker::new(),
            in_flight: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(webhook_path, post(handlers::github_webhook))
        .with_state(state)
}

/// Serve `app` until `shutdown` is cancelled, then let in-flight requests
/// and the reviews queued on `tasks` finish for at most `drain_timeout`.
///
/// If the drain runs out of time, `abort` is cancelled so that running
/// reviews stop at their next GitHub call.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    abort: CancellationToken,
    drain_timeout: Duration,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "server listening");
    }

    let signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(ServerError::Io),
        _ = shutdown.cancelled() => {}
    }

    info!(timeout_secs = drain_timeout.as_secs(), "shutting down, draining in-flight requests");
    let drain = async {
        let result = (&mut server).await;
        tasks.close();
        debug!(pending = tasks.len(), "waiting for queued reviews");
        tasks.wait().await;
        result
    };
    match tokio::time::timeout(drain_timeout, drain).await {
        Ok(result) => {
            info!("server stopped");
            result.map_err(ServerError::Io)
        }
        Err(_) => {
            warn!("drain timed out, aborting in-flight reviews");
            abort.cancel();
            Err(ServerError::DrainTimeout(drain_timeout))
        }
    }
}
