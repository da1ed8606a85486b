//! Cookie-backed browser sessions.

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use medipredict_core::Flash;
use std::convert::Infallible;
use uuid::Uuid;

use crate::state::SharedState;

/// The visitor's session. Nothing is stored until a handler writes to it.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    id: Option<Uuid>,
    /// The id changed during this request, so the browser needs a new cookie.
    issue_cookie: bool,
    cookie_name: String,
}

impl FromRequestParts<SharedState> for BrowserSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_name = state.config.security.cookie_name.clone();
        let presented = cookie_value(&parts.headers, &cookie_name)
            .and_then(|raw| Uuid::parse_str(raw).ok());
        let id = state.sessions.lock().await.resolve(presented);
        Ok(Self {
            id,
            issue_cookie: false,
            cookie_name,
        })
    }
}

impl BrowserSession {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    async fn id_or_create(&mut self, state: &SharedState) -> Uuid {
        if let Some(id) = self.id {
            return id;
        }
        let id = state.sessions.lock().await.create_session();
        self.id = Some(id);
        self.issue_cookie = true;
        id
    }

    pub async fn flash(&mut self, state: &SharedState, flash: Flash) {
        let id = self.id_or_create(state).await;
        state.sessions.lock().await.push_flash(&id, flash);
    }

    pub async fn take_flashes(&self, state: &SharedState) -> Vec<Flash> {
        match self.id {
            Some(id) => state.sessions.lock().await.take_flashes(&id),
            None => Vec::new(),
        }
    }

    pub async fn account_id(&self, state: &SharedState) -> Option<i64> {
        let id = self.id?;
        state.sessions.lock().await.current_user(&id)
    }

    /// Sign `account_id` in under a fresh session id.
    pub async fn login(&mut self, state: &SharedState, account_id: i64) {
        let mut sessions = state.sessions.lock().await;
        let id = match self.id {
            Some(old) => sessions.rotate(&old),
            None => sessions.create_session(),
        };
        sessions.login(&id, account_id);
        self.id = Some(id);
        self.issue_cookie = true;
    }

    /// Returns `true` if someone was signed in.
    pub async fn logout(&self, state: &SharedState) -> bool {
        match self.id {
            Some(id) => state.sessions.lock().await.logout(&id),
            None => false,
        }
    }

    /// Attach the session cookie to `response` when the id changed.
    pub fn finish(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if let (true, Some(id)) = (self.issue_cookie, self.id) {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                self.cookie_name, id
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}
