//! Handler error type.
//!
//! Internal details go to `tracing`; the client only ever sees a generic
//! status page.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use shellgate::error::BackendError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// A backend collaborator could not be reached.
    #[error("backend unavailable: {0}")]
    Backend(#[from] BackendError),

    /// The shell page could not be rendered.
    #[error("render failed: {0}")]
    Render(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("{self}");
        let status = self.status();
        let body = format!(
            "<!doctype html><html><body><h1>{}</h1><p>Intente nuevamente más tarde.</p></body></html>",
            status.canonical_reason().unwrap_or("Error")
        );
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_to_bad_gateway() {
        let err = WebError::from(BackendError::Unavailable("refused".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn render_errors_map_to_500() {
        let err = WebError::Render("template missing".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
