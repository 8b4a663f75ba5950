//! Stream session: one live tail bound to one HTTP response
//!
//! The tail runs in its own task and feeds a channel that the response body
//! drains. The body owns a drop guard on the session's cancellation token, so
//! when hyper drops the body (client gone, connection reset, server shutdown)
//! the tail is cancelled even while it is parked waiting for changes.

use axum::{
    body::Body,
    http::header::{CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use runlog_core::{Result, RunId, STREAM_CHANNEL_CAPACITY, TEXT_CONTENT_TYPE};
use runlog_logs::TailStreamer;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::debug;

use crate::AppState;

/// Response body of a follow request
pub struct StreamSession {
    rx: mpsc::Receiver<String>,
    _cancel_on_drop: DropGuard,
}

impl StreamSession {
    /// Open the run's log and start tailing it.
    ///
    /// Missing runs and watch setup failures are returned here, before any
    /// response bytes exist, so they can still become a 404 or 500.
    pub async fn start(state: &AppState, run: RunId) -> Result<Self> {
        let cancel = state.shutdown.child_token();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

        let streamer = TailStreamer::open(
            state.store(),
            run.clone(),
            state.notifier(),
            tx,
            cancel.clone(),
        )
        .await?;

        let guard = SessionGuard::enter(Arc::clone(&state.sessions), run);
        tokio::spawn(async move {
            // Moved in so the count drops on every exit, unwinding included
            let _guard = guard;
            let _ = streamer.run().await;
        });

        Ok(Self {
            rx,
            _cancel_on_drop: cancel.drop_guard(),
        })
    }
}

impl Stream for StreamSession {
    type Item = std::result::Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|line| {
            line.map(|mut line| {
                line.push('\n');
                Ok(Bytes::from(line))
            })
        })
    }
}

impl IntoResponse for StreamSession {
    fn into_response(self) -> Response {
        (
            [
                (CONTENT_TYPE, TEXT_CONTENT_TYPE),
                (X_CONTENT_TYPE_OPTIONS, "nosniff"),
                (CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

/// Counts a running session for as long as it lives
struct SessionGuard {
    sessions: Arc<AtomicUsize>,
    run: RunId,
}

impl SessionGuard {
    fn enter(sessions: Arc<AtomicUsize>, run: RunId) -> Self {
        let active = sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Follow session for {} started ({} active)", run, active);
        Self { sessions, run }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let active = self.sessions.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Follow session for {} closed ({} active)", self.run, active);
    }
}
