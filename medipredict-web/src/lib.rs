//! # medipredict-web
//!
//! axum front end for MediPredict. [`AppState`] is built once at startup
//! (disease ensemble trained, habit model loaded, account database opened)
//! and shared with every handler through [`router`].

pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod state;
pub mod templates;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;

pub use error::WebError;
pub use server::run;
pub use state::{AppState, SharedState};

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register_submit),
        )
        .route(
            "/signin",
            get(handlers::signin_form).post(handlers::signin_submit),
        )
        .route("/logout", get(handlers::logout))
        .route("/home", get(handlers::home).post(handlers::home))
        .route(
            "/disease",
            get(handlers::disease_form).post(handlers::disease_submit),
        )
        .route("/quiz", get(handlers::quiz_form).post(handlers::quiz_submit))
        .route(
            "/clinic",
            get(handlers::clinic_form).post(handlers::clinic_submit),
        )
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::render_error_pages,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
