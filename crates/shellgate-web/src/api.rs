//! JSON API endpoint handlers.
//!
//! These expose the same steps the shell page performs, for clients that
//! draw the chrome themselves.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shellgate::compose::PageState;
use shellgate::shell::Shell;
use shellgate::template::TemplateSnapshot;

use crate::server::session_from_headers;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub shell: Arc<Shell>,
}

/// GET /health — Liveness check. Not gated.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Query for GET /api/template.
#[derive(Deserialize)]
pub struct TemplateQuery {
    /// Navigation to apply before reading the snapshot.
    pub path: Option<String>,
}

/// Body of GET /api/template.
#[derive(Serialize)]
pub struct TemplateResponse {
    #[serde(flatten)]
    pub snapshot: TemplateSnapshot,
    pub theme: String,
}

/// GET /api/template — Current chrome snapshot and theme CSS.
///
/// Reads the caller's own chrome. With `?path=`, the path is entered first
/// (so `?path=/` loads the chrome and `?path=/login` resets it). Without it
/// the snapshot is returned as is.
pub async fn get_template(
    State(app): State<AppState>,
    Query(query): Query<TemplateQuery>,
    headers: HeaderMap,
) -> Json<TemplateResponse> {
    let session = session_from_headers(&headers);
    let chrome = app.shell.chrome(&session);
    let snapshot = match query.path {
        Some(path) => chrome.templates.enter(&path, &session).await,
        None => chrome.templates.snapshot(),
    };
    let theme = snapshot.theme().css();
    Json(TemplateResponse { snapshot, theme })
}

/// Query for GET /api/page.
#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page_path")]
    pub path: String,
}

fn default_page_path() -> String {
    "/".to_string()
}

/// Body of GET /api/page.
#[derive(Serialize)]
pub struct PageResponseBody {
    pub path: String,
    pub state: &'static str,
    pub page: PageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// GET /api/page?path=/x — Compose the page body for a path.
pub async fn get_page(
    State(app): State<AppState>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Json<PageResponseBody> {
    let session = session_from_headers(&headers);
    let composer = app.shell.composer(&app.shell.chrome(&session));
    let page = composer
        .navigate(&query.path, &session)
        .await
        .into_state()
        .unwrap_or(PageState::Loading);

    let html = match &page {
        PageState::Rendered(rendered) => Some(rendered.html()),
        _ => None,
    };
    let redirect = matches!(page, PageState::RedirectToLogin)
        .then(|| app.shell.config().login_path.clone());

    Json(PageResponseBody {
        path: query.path,
        state: page.label(),
        page,
        html,
        redirect,
    })
}

/// GET /api/nav — The caller's highlighted menu id.
///
/// `null` when nothing is highlighted or the id matches no menu entry.
pub async fn get_nav(State(app): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let chrome = app.shell.chrome(&session_from_headers(&headers));
    let template = chrome.templates.snapshot();
    Json(json!({
        "active": chrome.nav.active_in(&template.data),
        "requested": chrome.nav.active(),
    }))
}
