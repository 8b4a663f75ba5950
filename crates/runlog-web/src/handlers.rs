//! Request handlers for ping and run log endpoints

use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use runlog_core::{RunId, TEXT_CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::session::StreamSession;
use crate::AppState;

/// Query string of `GET /<prefix>/{run_id}`
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub follow: Option<String>,
}

impl LogQuery {
    /// Only the literal `true` turns on follow mode
    pub fn follow(&self) -> bool {
        self.follow.as_deref() == Some("true")
    }
}

pub async fn ping() -> &'static str {
    "Ack"
}

pub async fn put_log(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let run = RunId::parse(&run_id)?;
    let line = String::from_utf8_lossy(&body);
    state.store().append(&run, &line).await?;
    Ok("Ok")
}

pub async fn delete_log(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<&'static str, ApiError> {
    let run = RunId::parse(&run_id)?;
    state.store().delete(&run).await?;
    Ok("Ok")
}

pub async fn get_log(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Response, ApiError> {
    let run = RunId::parse(&run_id)?;

    if !query.follow() {
        let content = state.store().read_full(&run).await?;
        return Ok(([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], content).into_response());
    }

    debug!("Opening follow stream for {}", run);
    let session = StreamSession::start(&state, run).await?;
    Ok(session.into_response())
}
