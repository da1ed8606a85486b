//! Request handlers. GET renders a page, POST handles its form.

use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use medipredict_core::{Account, AccountError, Flash, NewAccount};
use medipredict_ml::encoder::SYMPTOM_FIELDS;
use medipredict_ml::{HabitAnswers, encode_symptoms};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::WebError;
use crate::session::BrowserSession;
use crate::state::SharedState;

type FormData = HashMap<String, String>;

pub const INVALID_CREDENTIALS: &str = "Invalid Credentials. Try again";
pub const REGISTERED: &str = "User has been successfully registered";
pub const SIGN_IN_REQUIRED: &str = "Please sign in to continue.";
pub const QUIZ_UNAVAILABLE: &str =
    "The health quiz model has not been trained yet. Run `medipredict train` and restart the server.";

async fn current_account(
    state: &SharedState,
    session: &BrowserSession,
) -> Result<Option<Account>, WebError> {
    let Some(id) = session.account_id(state).await else {
        return Ok(None);
    };
    let accounts = Arc::clone(&state.accounts);
    Ok(tokio::task::spawn_blocking(move || accounts.find_by_id(id)).await??)
}

/// Render `page` with the common layout fields plus `extra`.
async fn render_page(
    state: &SharedState,
    session: &BrowserSession,
    page: &str,
    title: &str,
    extra: Value,
) -> Result<Response, WebError> {
    let flashes = session.take_flashes(state).await;
    let user = current_account(state, session).await?;
    let mut context = json!({
        "title": title,
        "flashes": flashes,
        "user": user,
    });
    if let (Some(base), Value::Object(extra)) = (context.as_object_mut(), extra) {
        base.extend(extra);
    }
    let html = state.templates.render(page, &context)?;
    Ok(session.finish(Html(html)))
}

fn redirect(session: &BrowserSession, to: &str) -> Response {
    session.finish(Redirect::to(to))
}

/// Redirect anonymous visitors to sign-in when `accounts.require_login` is set.
async fn login_gate(state: &SharedState, session: &mut BrowserSession) -> Option<Response> {
    if !state.config.accounts.require_login || session.account_id(state).await.is_some() {
        return None;
    }
    session.flash(state, Flash::danger(SIGN_IN_REQUIRED)).await;
    Some(redirect(session, "/signin"))
}

fn form_field(form: &FormData, name: &str) -> String {
    form.get(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

pub async fn index(
    State(state): State<SharedState>,
    session: BrowserSession,
) -> Result<Response, WebError> {
    render_page(&state, &session, "index", "Welcome", json!({})).await
}

pub async fn home(
    State(state): State<SharedState>,
    session: BrowserSession,
) -> Result<Response, WebError> {
    render_page(&state, &session, "home", "Home", json!({})).await
}

pub async fn register_form(
    State(state): State<SharedState>,
    session: BrowserSession,
) -> Result<Response, WebError> {
    render_page(&state, &session, "register", "Register", json!({})).await
}

pub async fn register_submit(
    State(state): State<SharedState>,
    mut session: BrowserSession,
    Form(form): Form<FormData>,
) -> Result<Response, WebError> {
    let new = NewAccount {
        username: form_field(&form, "username"),
        email: form_field(&form, "email"),
        // Passwords are taken verbatim.
        password: form.get("password").cloned().unwrap_or_default(),
        first_name: form_field(&form, "fname"),
        last_name: form_field(&form, "lname"),
    };
    let accounts = Arc::clone(&state.accounts);
    match tokio::task::spawn_blocking(move || accounts.register(new)).await? {
        Ok(account) => {
            info!(account_id = account.id, username = %account.username, "Account registered");
            session.flash(&state, Flash::success(REGISTERED)).await;
            Ok(redirect(&session, "/signin"))
        }
        Err(AccountError::UsernameTaken { username }) => {
            let message = format!("The username '{username}' is already taken. Please choose another.");
            session.flash(&state, Flash::danger(message)).await;
            Ok(redirect(&session, "/register"))
        }
        Err(AccountError::MissingField { field }) => {
            let label = match field.as_str() {
                "fname" => "first name",
                "lname" => "last name",
                other => other,
            };
            let message = format!("Please fill in your {label}.");
            session.flash(&state, Flash::danger(message)).await;
            Ok(redirect(&session, "/register"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn signin_form(
    State(state): State<SharedState>,
    session: BrowserSession,
) -> Result<Response, WebError> {
    render_page(&state, &session, "signin", "Sign in", json!({})).await
}

pub async fn signin_submit(
    State(state): State<SharedState>,
    mut session: BrowserSession,
    Form(form): Form<FormData>,
) -> Result<Response, WebError> {
    let username = form_field(&form, "username");
    let password = form.get("password").cloned().unwrap_or_default();
    let accounts = Arc::clone(&state.accounts);
    let lookup_name = username.clone();
    let account =
        tokio::task::spawn_blocking(move || accounts.authenticate(&lookup_name, &password))
            .await??;

    match account {
        Some(account) => {
            session.login(&state, account.id).await;
            info!(account_id = account.id, "Signed in");
            Ok(redirect(&session, "/home"))
        }
        None => {
            info!(username = %username, "Sign-in rejected");
            session.flash(&state, Flash::danger(INVALID_CREDENTIALS)).await;
            Ok(redirect(&session, "/signin"))
        }
    }
}

pub async fn logout(
    State(state): State<SharedState>,
    session: BrowserSession,
) -> Result<Response, WebError> {
    if session.logout(&state).await {
        info!(session = ?session.id(), "Signed out");
    }
    render_page(&state, &session, "logout", "Logged out", json!({})).await
}

fn symptom_checkboxes(state: &SharedState) -> Value {
    let boxes: Vec<Value> = SYMPTOM_FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let label = state
                .symptom_labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Symptom {}", i + 1));
            json!({ "field": field, "label": label })
        })
        .collect();
    Value::Array(boxes)
}

pub async fn disease_form(
    State(state): State<SharedState>,
    mut session: BrowserSession,
) -> Result<Response, WebError> {
    if let Some(gate) = login_gate(&state, &mut session).await {
        return Ok(gate);
    }
    let extra = json!({ "symptoms": symptom_checkboxes(&state) });
    render_page(&state, &session, "disease", "Disease check", extra).await
}

pub async fn disease_submit(
    State(state): State<SharedState>,
    mut session: BrowserSession,
    Form(form): Form<FormData>,
) -> Result<Response, WebError> {
    if let Some(gate) = login_gate(&state, &mut session).await {
        return Ok(gate);
    }
    let prediction = state.ensemble.predict(&encode_symptoms(&form))?;
    let extra = json!({
        "symptoms": symptom_checkboxes(&state),
        "prediction_text": format!("Predicted Disease: {}", prediction.label),
        "prediction": prediction,
    });
    render_page(&state, &session, "disease", "Disease check", extra).await
}

pub async fn quiz_form(
    State(state): State<SharedState>,
    mut session: BrowserSession,
) -> Result<Response, WebError> {
    if let Some(gate) = login_gate(&state, &mut session).await {
        return Ok(gate);
    }
    render_page(&state, &session, "quiz", "Health quiz", json!({})).await
}

pub async fn quiz_submit(
    State(state): State<SharedState>,
    mut session: BrowserSession,
    Form(form): Form<FormData>,
) -> Result<Response, WebError> {
    if let Some(gate) = login_gate(&state, &mut session).await {
        return Ok(gate);
    }
    let advisor = state
        .advisor
        .as_ref()
        .ok_or_else(|| WebError::ModelUnavailable(QUIZ_UNAVAILABLE.to_string()))?;
    let answers = HabitAnswers::from_form(&form)?;
    let advice = advisor.advise(&answers)?;
    render_page(
        &state,
        &session,
        "quiz",
        "Health quiz",
        json!({ "advice": advice }),
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct ClinicSelection {
    pub city: Option<String>,
    pub area: Option<String>,
}

async fn clinic_page(
    state: SharedState,
    mut session: BrowserSession,
    selection: ClinicSelection,
) -> Result<Response, WebError> {
    if let Some(gate) = login_gate(&state, &mut session).await {
        return Ok(gate);
    }
    let lookup = state
        .clinics
        .lookup(selection.city.as_deref(), selection.area.as_deref())?;
    render_page(
        &state,
        &session,
        "clinic",
        "Find a clinic",
        json!({ "lookup": lookup }),
    )
    .await
}

pub async fn clinic_form(
    State(state): State<SharedState>,
    session: BrowserSession,
    Query(selection): Query<ClinicSelection>,
) -> Result<Response, WebError> {
    clinic_page(state, session, selection).await
}

pub async fn clinic_submit(
    State(state): State<SharedState>,
    session: BrowserSession,
    Form(selection): Form<ClinicSelection>,
) -> Result<Response, WebError> {
    clinic_page(state, session, selection).await
}

/// Liveness probe.
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let sessions = state.sessions.lock().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
        "sessions": sessions.total_count(),
        "signed_in": sessions.active_count(),
        "disease_classes": state.ensemble.codec().len(),
        "quiz_model_loaded": state.advisor.is_some(),
    }))
}

pub async fn not_found() -> WebError {
    WebError::NotFound("The page you asked for does not exist.".to_string())
}
