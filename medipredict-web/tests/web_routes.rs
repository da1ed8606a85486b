//! Integration tests for the HTTP routes, driven through the router with `oneshot`.

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use medipredict_core::{AccountStore, AppConfig, ClinicDirectory};
use medipredict_ml::habits::{DETAILED_FEEDBACK, HABIT_FEATURES};
use medipredict_ml::{
    Dataset, DiseaseEnsemble, EnsembleSettings, ForestParams, HabitAdvisor, TrainingSettings,
    train_habit_model,
};
use medipredict_web::{AppState, SharedState, router};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn disease_ensemble() -> (DiseaseEnsemble, Vec<String>) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data/train.csv");
    let train = Dataset::from_csv_positional(&path).unwrap();
    let settings = EnsembleSettings {
        forest: ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        },
        ..EnsembleSettings::default()
    };
    let ensemble = DiseaseEnsemble::train(&train, &settings).unwrap();
    (ensemble, train.feature_names)
}

fn habit_advisor() -> HabitAdvisor {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..20 {
        let low_water = i % 2 == 0;
        features.push(vec![
            if low_water { 1.0 } else { 2.5 },
            3.0,
            8.0,
            if low_water { 8.0 } else { 5.0 },
            4.0,
            (i % 10) as f64,
        ]);
        labels.push(if low_water { "Drink more water" } else { "Sleep more" }.to_string());
    }
    let names = HABIT_FEATURES.iter().map(|s| s.to_string()).collect();
    let dataset = Dataset::new(names, features, labels).unwrap();
    let settings = TrainingSettings {
        forest: ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        },
        ..TrainingSettings::default()
    };
    let artifacts = train_habit_model(&dataset, &settings).unwrap();
    HabitAdvisor::new(artifacts.model, artifacts.codec).unwrap()
}

fn make_state(advisor: Option<HabitAdvisor>, require_login: bool) -> SharedState {
    let mut config = AppConfig::default();
    config.accounts.require_login = require_login;
    let (ensemble, symptoms) = disease_ensemble();
    let state = AppState::new(
        config,
        ensemble,
        symptoms,
        advisor,
        AccountStore::open_in_memory(1_000).unwrap(),
        ClinicDirectory::builtin().unwrap(),
    )
    .unwrap();
    Arc::new(state)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        builder = builder.header(COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(state: &SharedState, req: Request<Body>) -> Response<Body> {
    router(Arc::clone(state)).oneshot(req).await.unwrap()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers().get(LOCATION).unwrap().to_str().unwrap()
}

fn cookie_pair(resp: &Response<Body>) -> Option<String> {
    let raw = resp.headers().get(SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(str::to_string)
}

/// A client that keeps the session cookie between requests.
struct Browser {
    state: SharedState,
    cookie: Option<String>,
}

impl Browser {
    fn new(state: &SharedState) -> Self {
        Self {
            state: Arc::clone(state),
            cookie: None,
        }
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        let req = get(uri, self.cookie.as_deref());
        self.keep_cookie(send(&self.state, req).await)
    }

    async fn post(&mut self, uri: &str, body: &str) -> Response<Body> {
        let req = post_form(uri, body, self.cookie.as_deref());
        self.keep_cookie(send(&self.state, req).await)
    }

    fn keep_cookie(&mut self, resp: Response<Body>) -> Response<Body> {
        if let Some(pair) = cookie_pair(&resp) {
            self.cookie = Some(pair);
        }
        resp
    }
}

const ASHA: &str = "username=asha&email=asha%40example.com&password=s3cret&fname=Asha&lname=Rao";

// --- accounts ---

#[tokio::test]
async fn test_register_then_sign_in() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);

    let resp = browser.post("/register", ASHA).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");

    let page = body_text(browser.get("/signin").await).await;
    assert!(page.contains("User has been successfully registered"));
    assert!(page.contains("alert-success"));

    let resp = browser.post("/signin", "username=asha&password=s3cret").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/home");

    let home = body_text(browser.get("/home").await).await;
    assert!(home.contains("Hello, Asha!"));
    assert_eq!(state.sessions.lock().await.active_count(), 1);
}

#[tokio::test]
async fn test_sign_in_issues_a_new_session_id() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    browser.post("/register", ASHA).await;
    let before = browser.cookie.clone().unwrap();

    let resp = browser.post("/signin", "username=asha&password=s3cret").await;
    let after = cookie_pair(&resp).unwrap();
    assert_ne!(after, before);

    // The pre-login id no longer carries the sign-in.
    let stale = body_text(send(&state, get("/home", Some(&before))).await).await;
    assert!(!stale.contains("Hello, Asha!"));
    let fresh = body_text(send(&state, get("/home", Some(&after))).await).await;
    assert!(fresh.contains("Hello, Asha!"));
    assert_eq!(state.sessions.lock().await.total_count(), 1);
}

#[tokio::test]
async fn test_wrong_password_flashes_invalid_credentials() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    browser.post("/register", ASHA).await;

    let resp = browser.post("/signin", "username=asha&password=nope").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");

    let page = body_text(browser.get("/signin").await).await;
    assert!(page.contains("Invalid Credentials. Try again"));
    assert!(page.contains("alert-danger"));
    assert_eq!(state.sessions.lock().await.active_count(), 0);
}

#[tokio::test]
async fn test_unknown_user_is_rejected_the_same_way() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    let resp = browser.post("/signin", "username=ghost&password=x").await;
    assert_eq!(location(&resp), "/signin");
    let page = body_text(browser.get("/signin").await).await;
    assert!(page.contains("Invalid Credentials. Try again"));
}

#[tokio::test]
async fn test_duplicate_username_is_reported() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    browser.post("/register", ASHA).await;
    // Drain the success flash.
    browser.get("/signin").await;

    let resp = browser.post("/register", ASHA).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/register");

    let page = body_text(browser.get("/register").await).await;
    assert!(page.contains("is already taken"));
    assert_eq!(state.accounts.count().unwrap(), 1);
}

#[tokio::test]
async fn test_missing_registration_field() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    let resp = browser.post("/register", "username=asha&password=x").await;
    assert_eq!(location(&resp), "/register");
    let page = body_text(browser.get("/register").await).await;
    assert!(page.contains("Please fill in your email."));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    browser.post("/register", ASHA).await;
    browser.post("/signin", "username=asha&password=s3cret").await;
    assert_eq!(state.sessions.lock().await.active_count(), 1);

    let resp = browser.get("/logout").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("You have been logged out"));
    assert_eq!(state.sessions.lock().await.active_count(), 0);
}

// --- disease prediction ---

#[tokio::test]
async fn test_disease_form_lists_symptoms() {
    let state = make_state(None, false);
    let page = body_text(send(&state, get("/disease", None)).await).await;
    for field in ["symptom1", "symptom5"] {
        assert!(page.contains(&format!("name=\"{field}\"")));
    }
    assert!(page.contains("Skin rash"));
}

#[tokio::test]
async fn test_disease_prediction_is_rendered() {
    let state = make_state(None, false);
    let resp = send(
        &state,
        post_form("/disease", "symptom4=1&symptom5=1", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_text(resp).await;
    assert!(page.contains("Predicted Disease: "));
    assert!(
        state
            .ensemble
            .codec()
            .classes()
            .iter()
            .any(|label| page.contains(&format!("Predicted Disease: {label}")))
    );
}

#[tokio::test]
async fn test_require_login_redirects_to_sign_in() {
    let state = make_state(None, true);
    let resp = send(&state, post_form("/disease", "symptom1=1", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/signin");

    let resp = send(&state, get("/clinic", None)).await;
    assert_eq!(location(&resp), "/signin");
}

// --- quiz ---

const POOR_HABITS: &str = "water=1.0&exercise=1.0&sitting=9&sleep=6&diet=2&stress=9";

#[tokio::test]
async fn test_quiz_without_model_is_unavailable() {
    let state = make_state(None, false);
    let resp = send(&state, post_form("/quiz", POOR_HABITS, None)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_text(resp).await.contains("medipredict train"));

    // The form itself still renders.
    let resp = send(&state, get("/quiz", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_quiz_returns_tip_rules_and_feedback() {
    let state = make_state(Some(habit_advisor()), false);
    let resp = send(&state, post_form("/quiz", POOR_HABITS, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_text(resp).await;

    assert!(page.contains("Drink more water") || page.contains("Sleep more"));
    assert!(page.contains("Your stress levels are high."));
    assert!(page.contains("You\u{2019}re doing less exercise than recommended."));
    assert!(page.contains("Aim to increase your sleep to at least 7 hours per night"));
    assert!(page.contains(DETAILED_FEEDBACK[1]));
    assert!(page.contains(DETAILED_FEEDBACK[2]));
}

#[tokio::test]
async fn test_quiz_rejects_non_numeric_input() {
    let state = make_state(Some(habit_advisor()), false);
    let resp = send(
        &state,
        post_form(
            "/quiz",
            "water=lots&exercise=1&sitting=1&sleep=1&diet=1&stress=1",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(resp).await.contains("is not a number"));
}

#[tokio::test]
async fn test_quiz_rejects_fractional_stress() {
    let state = make_state(Some(habit_advisor()), false);
    let resp = send(
        &state,
        post_form(
            "/quiz",
            "water=2&exercise=3&sitting=8&sleep=8&diet=4&stress=4.5",
            None,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- clinics ---

#[tokio::test]
async fn test_clinic_city_and_area_lists_clinics() {
    let state = make_state(None, false);
    let resp = send(&state, post_form("/clinic", "city=Mumbai&area=Andheri", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_text(resp).await;
    assert!(page.contains("Lilavati Hospital"));
    assert!(page.contains("Nanavati Hospital"));
    assert!(!page.contains("KEM Hospital"));
}

#[tokio::test]
async fn test_clinic_city_only_lists_areas() {
    let state = make_state(None, false);
    let page = body_text(send(&state, post_form("/clinic", "city=Mumbai&area=", None)).await).await;
    assert!(page.contains("Andheri"));
    assert!(page.contains("Bandra"));
    assert!(!page.contains("Lilavati Hospital"));
}

#[tokio::test]
async fn test_clinic_get_lists_cities() {
    let state = make_state(None, false);
    let page = body_text(send(&state, get("/clinic", None)).await).await;
    assert!(page.contains("<option value=\"Mumbai\""));
    assert!(!page.contains("name=\"area\""));
}

#[tokio::test]
async fn test_unknown_city_is_not_found() {
    let state = make_state(None, false);
    let resp = send(&state, post_form("/clinic", "city=Atlantis", None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_text(resp).await.contains("Atlantis"));
}

// --- misc ---

#[tokio::test]
async fn test_health_reports_models() {
    let state = make_state(None, false);
    let resp = send(&state, get("/health", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["quiz_model_loaded"], false);
    assert_eq!(
        json["disease_classes"],
        state.ensemble.codec().len() as u64
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let state = make_state(None, false);
    let resp = send(&state, get("/nowhere", None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let page = body_text(resp).await;
    assert!(page.contains("404 Not Found"));
    assert!(page.contains("Back to the start page"));
}

#[tokio::test]
async fn test_handler_errors_use_the_layout() {
    let state = make_state(None, false);
    let resp = send(&state, post_form("/quiz", POOR_HABITS, None)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let page = body_text(resp).await;
    assert!(page.contains("503 Service Unavailable"));
    assert!(page.contains("Back to the start page"));
}

#[tokio::test]
async fn test_anonymous_pages_store_no_sessions() {
    let state = make_state(None, false);
    for _ in 0..50 {
        for uri in ["/", "/home", "/signin", "/register", "/disease", "/quiz", "/clinic"] {
            let resp = send(&state, get(uri, None)).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(resp.headers().get(SET_COOKIE).is_none());
        }
        let forged = format!("medipredict_session={}", uuid::Uuid::new_v4());
        send(&state, get("/", Some(&forged))).await;
    }
    assert_eq!(state.sessions.lock().await.total_count(), 0);
}

#[tokio::test]
async fn test_session_cookie_is_issued_once() {
    let state = make_state(None, false);
    let mut browser = Browser::new(&state);
    browser.post("/register", ASHA).await;
    let cookie = browser.cookie.clone().unwrap();
    assert!(cookie.starts_with("medipredict_session="));

    let resp = browser.get("/signin").await;
    assert!(resp.headers().get(SET_COOKIE).is_none());
    assert_eq!(state.sessions.lock().await.total_count(), 1);
}
