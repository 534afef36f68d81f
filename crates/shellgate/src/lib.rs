//! Multi-tenant application shell: session gate, chrome cache and page
//! composition.
//!
//! `shellgate` renders a tenant's chrome (branding, main menu, header)
//! around page bodies the backend declares as lists of component
//! descriptors, and gates every request behind a session check. It is built
//! from three parts:
//!
//! 1. [`SessionGate`](gate::SessionGate) decides, per request, whether the
//!    caller may proceed or must be redirected to `/login`. Fail-closed.
//! 2. [`TemplateStore`](template::TemplateStore) fetches, persists and
//!    invalidates the chrome across navigation and logout.
//! 3. [`ContentComposer`](compose::ContentComposer) turns a content
//!    response into rendered HTML, with loading / not-found / redirect
//!    states and the active menu highlight.
//!
//! # Getting started
//!
//! ```ignore
//! use shellgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = ShellConfig::load("shellgate.toml".as_ref())?;
//!     let shell = Shell::connect(config).map_err(|e| e.to_string())?;
//!
//!     let session = Session::new(SessionCookie::new("sid=abc"));
//!     let request = GateRequest::new("/reports", session.clone());
//!     if shell.gate().evaluate(&request).await.is_denied() {
//!         return Ok(());
//!     }
//!
//!     let chrome = shell.chrome(&session);
//!     let composer = shell.composer(&chrome);
//!     let (snapshot, page) = tokio::join!(
//!         chrome.templates.enter("/reports", &session),
//!         composer.navigate("/reports", &session),
//!     );
//!     println!("{} / {:?}", snapshot.data.tenant.name, page);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Wire types** (`TemplateData`, `PageResponse`, descriptors): [`model`].
//! - **Backend calls** and the collaborator traits to fake in tests:
//!   [`backend`].
//! - **Bypass rules and gate decisions:** [`gate`].
//! - **Chrome phases, persisted cache, theme variables:** [`template`].
//! - **Component registry, nav events, page states:** [`compose`].
//! - **TOML configuration and tenant overrides:** [`config`].
//! - **Capturing warnings for operator tooling:** [`diagnostics`].
//! - **Assembling everything from a config, per-session chrome:** [`shell`].

pub mod backend;
pub mod compose;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod model;
pub mod prelude;
pub mod shell;
pub mod template;

/// Default login route. Entering it resets the chrome.
pub const LOGIN_PATH: &str = "/login";

/// Default content key requested for `/`.
pub const DEFAULT_HOME_KEY: &str = "home/index_for_all";

/// Route that ends a session by sending the user to the login route.
pub const LOGOUT_PATH: &str = "/logout";
