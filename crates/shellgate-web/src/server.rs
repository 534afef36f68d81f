//! Axum server setup, router construction and the session gate middleware.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, COOKIE, HOST, LOCATION, REFERER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use shellgate::backend::{Session, SessionCookie};
use shellgate::gate::{GateDecision, GateRequest, LoginRedirect};
use shellgate::shell::Shell;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::api::{self, AppState};
use crate::{auth, page};

/// Build the full axum router.
///
/// The router serves:
/// - `GET /health` outside the gate
/// - login / logout at `/login` and `/logout`
/// - JSON API at `/api/*`
/// - optional static files at `/assets/*`
/// - the shell page for every other path
pub fn build_router(shell: Arc<Shell>, static_dir: Option<PathBuf>) -> Router {
    let login_path = shell.config().login_path.clone();
    let app_state = AppState { shell };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut gated = Router::new()
        .route(&login_path, get(auth::login_page).post(auth::login_submit))
        .route(shellgate::LOGOUT_PATH, get(auth::logout))
        .route("/api/template", get(api::get_template))
        .route("/api/page", get(api::get_page))
        .route("/api/nav", get(api::get_nav))
        .fallback(page::shell_page);

    if let Some(dir) = static_dir {
        gated = gated.nest_service("/assets", ServeDir::new(dir));
    }

    let gated = gated
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            session_gate,
        ))
        .with_state(app_state);

    Router::new()
        .route("/health", get(api::health))
        .merge(gated)
        .layer(cors)
}

/// Start the axum server and return the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> Result<SocketAddr, String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read local address: {e}"))?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server error: {e}");
        }
    });

    info!("Listening on http://{addr}");
    Ok(addr)
}

/// Runs [`SessionGate::evaluate`](shellgate::gate::SessionGate::evaluate)
/// before any handler.
async fn session_gate(State(app): State<AppState>, request: Request, next: Next) -> Response {
    let gate_request = GateRequest {
        path: request.uri().path().to_string(),
        referer: header_str(request.headers(), REFERER).map(str::to_string),
        session: session_from_headers(request.headers()),
    };

    match app.shell.gate().evaluate(&gate_request).await {
        GateDecision::Deny { redirect, .. } => login_redirect(&redirect),
        GateDecision::Allow | GateDecision::Bypass => next.run(request).await,
    }
}

/// Caller's cookie and host, as forwarded to the backend.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Session {
    let cookies: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let cookie = if cookies.is_empty() {
        SessionCookie::none()
    } else {
        SessionCookie::new(cookies.join("; "))
    };
    let session = Session::new(cookie);
    match header_str(headers, HOST) {
        Some(host) => session.with_host(host),
        None => session,
    }
}

/// 302 to the login route, never cached.
pub(crate) fn login_redirect(redirect: &LoginRedirect) -> Response {
    let status = StatusCode::from_u16(redirect.status).unwrap_or(StatusCode::FOUND);
    let mut response = status.into_response();
    let headers = response.headers_mut();
    if let Ok(location) = HeaderValue::from_str(&redirect.location) {
        headers.insert(LOCATION, location);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static(redirect.cache_control),
    );
    response
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
