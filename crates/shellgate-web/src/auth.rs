//! Login and logout routes.
//!
//! The login form itself is deliberately bare. Credentials are relayed to
//! the authenticate collaborator as-is and its `Set-Cookie` headers are
//! passed back to the browser.

use axum::Form;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use shellgate::backend::Credentials;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::error::WebError;
use crate::page;
use crate::server::session_from_headers;

/// GET /login — Drop the caller's chrome and show the login form.
pub async fn login_page(State(app): State<AppState>, headers: HeaderMap) -> Response {
    let session = session_from_headers(&headers);
    if app.shell.end_session(&session) {
        debug!("Cleared chrome on entering the login route");
    }

    let login_path = &app.shell.config().login_path;
    let mut response = Html(page::login_html(login_path)).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// POST /login — Relay credentials to the backend.
///
/// Accepted: 302 to `/` carrying the backend's `Set-Cookie` headers.
/// Rejected: 302 back to the login route, no detail.
pub async fn login_submit(
    State(app): State<AppState>,
    headers: HeaderMap,
    Form(credentials): Form<Credentials>,
) -> Result<Response, WebError> {
    let session = session_from_headers(&headers);
    let outcome = app
        .shell
        .authenticator()
        .authenticate(&credentials, &session)
        .await?;

    if !outcome.accepted {
        info!("Login rejected for {}", credentials.username);
        return Ok(redirect(&app.shell.config().login_path));
    }

    info!("Login accepted for {}", credentials.username);
    let mut response = redirect("/");
    for cookie in &outcome.set_cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("Dropping unrelayable Set-Cookie header: {e}"),
        }
    }
    Ok(response)
}

/// GET /logout — Drop the caller's chrome and send them to the login route.
pub async fn logout(State(app): State<AppState>, headers: HeaderMap) -> Response {
    app.shell.end_session(&session_from_headers(&headers));
    redirect(&app.shell.config().login_path)
}

fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(LOCATION, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
