//! Mapping of RunLog errors onto plain-text HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use runlog_core::Error;
use tracing::error;

/// Handler error: 404 for missing runs, 400 for bad ids, 500 otherwise
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            Error::InvalidRunId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::NOT_FOUND => "Run not found".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Request failed: {}", self.0);
                self.0.to_string()
            }
            _ => self.0.to_string(),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(Error::RunNotFound("r".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(Error::InvalidRunId("..".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::watch_setup("inotify limit reached")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(Error::StreamingUnsupported).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_io_not_found_is_404() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ApiError(io.into()).status(), StatusCode::NOT_FOUND);
    }
}
