//! RunLog Web API Server
//!
//! Plain-text HTTP surface over the run log store, including chunked live
//! follow of a run's log.

mod error;
mod handlers;
mod session;

pub use error::ApiError;
pub use session::StreamSession;

use axum::{routing::get, Router};
use runlog_core::{Result, ServerConfig};
use runlog_logs::RunLogStore;
use runlog_watch::ChangeNotifier;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: RunLogStore,
    notifier: ChangeNotifier,
    /// Parent of every stream session's cancellation token
    shutdown: CancellationToken,
    sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(store: RunLogStore, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            notifier,
            shutdown: CancellationToken::new(),
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build the store and notifier described by a config
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let store = RunLogStore::new(&config.logs_dir)?;
        Ok(Self::new(store, ChangeNotifier::new(config.notifier)))
    }

    pub fn store(&self) -> &RunLogStore {
        &self.store
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Number of follow streams currently running
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// End every live follow stream
    pub fn shutdown_sessions(&self) {
        self.shutdown.cancel();
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route(
            &config.run_route(),
            get(handlers::get_log)
                .put(handlers::put_log)
                .delete(handlers::delete_log),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves, then close live streams and drain connections
pub async fn start_server<F>(config: &ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let state = AppState::from_config(config)?;
    let app = create_router(state.clone(), config);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        "Serving run logs from {} on {} (/{}/{{run_id}})",
        config.logs_dir.display(),
        bind_addr,
        config.route_prefix
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutting down, closing {} follow streams", state.active_sessions());
            state.shutdown_sessions();
        })
        .await?;

    Ok(())
}
