//! Shell page rendering: chrome around the composed body.

use std::sync::LazyLock;

use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use minijinja::{AutoEscape, Environment, context};
use serde_json::json;
use shellgate::compose::{NotFoundReason, PageState, RenderedPage};
use shellgate::gate::LoginRedirect;
use shellgate::model::{ComponentDescriptor, TemplateData};
use shellgate::shell::Shell;
use shellgate::template::TemplateSnapshot;
use tracing::debug;

use crate::api::AppState;
use crate::error::WebError;
use crate::server::{login_redirect, session_from_headers};

const LAYOUT: &str = r#"<!doctype html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>{{ tenant_name }}</title>
<link rel="stylesheet" href="/assets/shell.css">
<style>{{ theme | safe }}</style>
</head>
<body class="shell" data-phase="{{ phase }}" data-page-state="{{ state }}">
<header class="shell-header">
  {%- if logo %}<img class="tenant-logo" src="{{ logo }}" alt="{{ tenant_name }}">{% endif %}
  <div class="shell-user"><span class="user-name">{{ full_name }}</span> <span class="user-position">{{ position_name }}</span></div>
  <a class="shell-logout" href="{{ logout_path }}">Cerrar sesión</a>
</header>
{{ nav | safe }}
<main class="shell-content">
{{ breadcrumbs | safe }}
{{ body | safe }}
</main>
</body>
</html>
"#;

const LOGIN: &str = r#"<!doctype html>
<html lang="es">
<head><meta charset="utf-8"><title>Iniciar sesión</title></head>
<body class="login">
<form method="post" action="{{ login_path }}">
  <label for="username">Núm. documento de identidad</label>
  <input id="username" name="username" type="text" autocomplete="username" required>
  <label for="password">Contraseña</label>
  <input id="password" name="password" type="password" autocomplete="current-password" required>
  <button type="submit">Ingresar</button>
</form>
</body>
</html>
"#;

const NOT_FOUND_BODY: &str =
    r#"<section class="not-found"><h1>Página no encontrada</h1></section>"#;
const LOADING_BODY: &str = r#"<section class="loading" aria-busy="true">Cargando…</section>"#;

static PAGES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    for (name, source) in [("layout", LAYOUT), ("login", LOGIN)] {
        if let Err(e) = env.add_template(name, source) {
            tracing::error!("Page template {name} failed to compile: {e}");
        }
    }
    env
});

/// Fallback handler: chrome and body for any protected path.
pub async fn shell_page(
    State(app): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let path = uri.path();
    let session = session_from_headers(&headers);
    let chrome = app.shell.chrome(&session);
    let composer = app.shell.composer(&chrome);

    let (snapshot, navigation) = tokio::join!(
        chrome.templates.enter(path, &session),
        composer.navigate(path, &session),
    );
    let state = navigation.into_state().unwrap_or(PageState::Loading);
    debug!("Shell page {path}: {} / {:?}", state.label(), snapshot.phase);

    let (status, body, rendered) = match &state {
        PageState::RedirectToLogin => {
            let redirect = LoginRedirect::to(app.shell.config().login_path.clone());
            return Ok(login_redirect(&redirect));
        }
        PageState::Rendered(page) => (StatusCode::OK, page.html(), Some(page)),
        PageState::NotFound(reason) => {
            if let NotFoundReason::Failed { diagnostic } = reason {
                debug!("Not found after failed fetch: {diagnostic}");
            }
            (StatusCode::NOT_FOUND, NOT_FOUND_BODY.to_string(), None)
        }
        PageState::Loading => (StatusCode::OK, LOADING_BODY.to_string(), None),
    };

    let active = chrome.nav.active_in(&snapshot.data);
    let html = render_layout(
        &app.shell,
        &snapshot,
        active.as_deref(),
        state.label(),
        &body,
        rendered,
    )?;
    let mut response = (status, Html(html)).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// The bare login form.
pub fn login_html(login_path: &str) -> String {
    PAGES
        .get_template("login")
        .and_then(|t| t.render(context! { login_path }))
        .unwrap_or_else(|e| {
            tracing::error!("Login page failed to render: {e}");
            format!(r#"<form method="post" action="{login_path}"></form>"#)
        })
}

/// `active` is the session's highlighted menu id, already checked against
/// the menu.
fn render_layout(
    shell: &Shell,
    chrome: &TemplateSnapshot,
    active: Option<&str>,
    state: &str,
    body: &str,
    page: Option<&RenderedPage>,
) -> Result<String, WebError> {
    let data = &chrome.data;
    let nav = render_component(shell, "Nav", json!({ "items": nav_items(data, active) }));
    let breadcrumbs = match page {
        Some(p) if !p.breadcrumbs.is_empty() => {
            render_component(shell, "Breadcrumb", json!({ "items": p.breadcrumbs }))
        }
        _ => String::new(),
    };

    PAGES
        .get_template("layout")
        .and_then(|t| {
            t.render(context! {
                tenant_name => data.tenant.name,
                logo => data.tenant.logo_ref,
                full_name => data.header.full_name,
                position_name => data.header.position_name,
                theme => chrome.theme().css(),
                phase => chrome.phase,
                state,
                nav,
                breadcrumbs,
                body,
                logout_path => shellgate::LOGOUT_PATH,
            })
        })
        .map_err(|e| WebError::Render(e.to_string()))
}

/// Menu entries as `Nav` props. Without a page-requested id, entries
/// flagged active by the backend stay highlighted.
fn nav_items(data: &TemplateData, active: Option<&str>) -> Vec<serde_json::Value> {
    data.main_menu
        .iter()
        .map(|item| {
            let is_active = match active {
                Some(id) => item.id == id,
                None => item.is_active_default.unwrap_or(false),
            };
            json!({
                "id": item.id,
                "label": item.label,
                "href": item.href,
                "icon": item.icon_key,
                "is_active": is_active,
            })
        })
        .collect()
}

fn render_component(shell: &Shell, name: &str, props: serde_json::Value) -> String {
    match shell.registry().render(&ComponentDescriptor::new(name, props)) {
        Some(Ok(html)) => html,
        Some(Err(e)) => {
            tracing::warn!("Chrome component {name} failed: {e}");
            String::new()
        }
        None => String::new(),
    }
}
