//! Request-level errors and their HTTP rendering.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use medipredict_core::{AccountError, ClinicError};
use medipredict_ml::MlError;
use tracing::{error, warn};

use crate::state::SharedState;
use crate::templates;

/// Attached to error responses so [`render_error_pages`] can draw the full page.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    /// A model the request needs was not loaded at startup.
    #[error("{0}")]
    ModelUnavailable(String),

    #[error(transparent)]
    Ml(#[from] MlError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Clinic(#[from] ClinicError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ml(MlError::ArtifactMissing(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ml(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Account(AccountError::MissingField { .. }) => StatusCode::BAD_REQUEST,
            Self::Clinic(ClinicError::UnknownCity { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the visitor.
    fn public_message(&self, status: StatusCode) -> String {
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            "Something went wrong on our side. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let page = ErrorPage {
            status,
            message: self.public_message(status),
        };
        let body = templates::bare_error(status, &page.message);
        let mut response = (status, Html(body)).into_response();
        response.extensions_mut().insert(page);
        response
    }
}

/// Replace the body of [`WebError`] responses with the templated error page.
pub async fn render_error_pages(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };
    let html = state.templates.render_error(page.status, &page.message);
    (page.status, Html(html)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WebError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebError::Ml(MlError::invalid_input("field 'water' is missing")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebError::Ml(MlError::ArtifactMissing(PathBuf::from("models/habit_model.json")))
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WebError::Clinic(ClinicError::UnknownCity {
                city: "Atlantis".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::Ml(MlError::model("broken")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_carries_page() {
        let resp = WebError::NotFound("no such page".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let page = resp.extensions().get::<ErrorPage>().unwrap();
        assert_eq!(page.status, StatusCode::NOT_FOUND);
        assert_eq!(page.message, "no such page");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = WebError::Template("missing partial 'header'".into());
        let msg = err.public_message(err.status());
        assert!(!msg.contains("partial"));

        let err = WebError::InvalidInput("field 'water' is missing".into());
        assert_eq!(err.public_message(err.status()), "field 'water' is missing");
    }
}
