//! Backend collaborators and their HTTP implementation.
//!
//! The gate, the template store and the content composer never talk to the
//! network directly. They hold trait objects for the four collaborators:
//!
//! | Trait | Endpoint |
//! |-------|----------|
//! | [`SessionValidator`] | session validation (2xx = valid) |
//! | [`TemplateSource`] | tenant/user chrome |
//! | [`ContentSource`] | page body for a content key |
//! | [`Authenticator`] | credential submission on the login route |
//!
//! [`HttpBackend`] implements all four over `reqwest`, forwarding the
//! caller's cookie untouched and resolving the base URL from the request
//! host (see [`BackendConfig::base_url_for`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::model::{PageResponse, TemplateData};

/// Boxed future returned by the collaborator traits.
///
/// Keeps the traits dyn-compatible so they can be shared as `Arc<dyn _>`.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

// ── Session context ───────────────────────────────────────────────

/// Raw `Cookie` header value of the caller, possibly absent.
///
/// Opaque: never parsed, only forwarded to collaborators. `Debug` output
/// is redacted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionCookie(Option<String>);

impl SessionCookie {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(raw))
        }
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Header value to forward, if the caller sent one.
    pub fn header_value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("SessionCookie(<redacted>)"),
            None => f.write_str("SessionCookie(None)"),
        }
    }
}

/// Per-request context handed to every collaborator call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub cookie: SessionCookie,
    /// `Host` of the incoming request, used for tenant base URL selection.
    pub host: Option<String>,
}

impl Session {
    pub fn new(cookie: SessionCookie) -> Self {
        Self { cookie, host: None }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Identity of the browser session for per-session state: host and raw
    /// cookie. The host is part of it so tenants never share state.
    pub fn slot_key(&self) -> String {
        format!(
            "{}\n{}",
            self.host.as_deref().unwrap_or_default(),
            self.cookie.header_value().unwrap_or_default()
        )
    }
}

// ── Collaborator traits ───────────────────────────────────────────

/// Outcome of a session-validation call that reached the collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    Rejected { status: u16 },
}

impl SessionStatus {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Answers "is this session currently authenticated?".
///
/// An `Err` means the question could not be answered; callers treat it the
/// same as a rejection.
pub trait SessionValidator: Send + Sync {
    fn validate<'a>(&'a self, session: &'a Session) -> BackendFuture<'a, SessionStatus>;
}

/// Supplies the chrome for the session's tenant and user.
pub trait TemplateSource: Send + Sync {
    fn fetch_template<'a>(&'a self, session: &'a Session) -> BackendFuture<'a, TemplateData>;
}

/// Supplies page bodies by content key (`"reports"`, `"home/index_for_all"`).
pub trait ContentSource: Send + Sync {
    fn fetch_page<'a>(&'a self, key: &'a str, session: &'a Session)
    -> BackendFuture<'a, PageResponse>;
}

/// Credentials posted by the login form.
#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of submitting credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    pub accepted: bool,
    /// `Set-Cookie` header values to relay to the browser.
    pub set_cookies: Vec<String>,
}

/// Submits login credentials to the authenticate endpoint.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
        session: &'a Session,
    ) -> BackendFuture<'a, AuthOutcome>;
}

// ── HttpBackend ───────────────────────────────────────────────────

/// `reqwest`-backed implementation of every collaborator trait.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shellgate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn get(&self, url: &str, session: &Session) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = session.cookie.header_value() {
            req = req.header(reqwest::header::COOKIE, cookie);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        session: &Session,
    ) -> Result<T, BackendError> {
        let start = Instant::now();
        let resp = self
            .get(&url, session)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|source| BackendError::Transport {
            url: url.clone(),
            source,
        })?;
        debug!(
            "GET {} -> HTTP {} in {:.2}s ({} bytes)",
            url,
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(BackendError::Status {
                url,
                status: status.as_u16(),
            });
        }
        trace!("Response body: {text}");
        serde_json::from_str(&text).map_err(|source| BackendError::Decode { url, source })
    }
}

impl SessionValidator for HttpBackend {
    fn validate<'a>(&'a self, session: &'a Session) -> BackendFuture<'a, SessionStatus> {
        Box::pin(async move {
            let url = self.config.validate_url(session.host.as_deref());
            let start = Instant::now();
            let resp = self
                .get(&url, session)
                .send()
                .await
                .map_err(|source| BackendError::Transport {
                    url: url.clone(),
                    source,
                })?;
            let status = resp.status();
            debug!(
                "Session validation: HTTP {} in {:.2}s",
                status,
                start.elapsed().as_secs_f64()
            );
            if status.is_success() {
                Ok(SessionStatus::Valid)
            } else {
                Ok(SessionStatus::Rejected {
                    status: status.as_u16(),
                })
            }
        })
    }
}

impl TemplateSource for HttpBackend {
    fn fetch_template<'a>(&'a self, session: &'a Session) -> BackendFuture<'a, TemplateData> {
        Box::pin(async move {
            let url = self.config.template_url(session.host.as_deref());
            self.get_json(url, session).await
        })
    }
}

impl ContentSource for HttpBackend {
    fn fetch_page<'a>(
        &'a self,
        key: &'a str,
        session: &'a Session,
    ) -> BackendFuture<'a, PageResponse> {
        Box::pin(async move {
            let url = self.config.content_url(session.host.as_deref(), key);
            self.get_json(url, session).await
        })
    }
}

impl Authenticator for HttpBackend {
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
        session: &'a Session,
    ) -> BackendFuture<'a, AuthOutcome> {
        Box::pin(async move {
            let url = self.config.authenticate_url(session.host.as_deref());
            let form = reqwest::multipart::Form::new()
                .text("username", credentials.username.clone())
                .text("password", credentials.password.clone());
            let resp = self
                .client
                .post(&url)
                .multipart(form)
                .send()
                .await
                .map_err(|source| BackendError::Transport {
                    url: url.clone(),
                    source,
                })?;

            let status = resp.status();
            debug!("Authenticate: HTTP {status} for user {}", credentials.username);
            if !status.is_success() {
                return Ok(AuthOutcome::default());
            }
            let set_cookies = resp
                .headers()
                .get_all(reqwest::header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_string)
                .collect();
            Ok(AuthOutcome {
                accepted: true,
                set_cookies,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cookie_is_absent() {
        assert!(!SessionCookie::new("   ").is_present());
        assert!(SessionCookie::new("sid=abc").is_present());
        assert_eq!(SessionCookie::new("sid=abc").header_value(), Some("sid=abc"));
    }

    #[test]
    fn cookie_debug_is_redacted() {
        let dbg = format!("{:?}", SessionCookie::new("sid=secret"));
        assert!(!dbg.contains("secret"));
        let creds = Credentials {
            username: "123".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn slot_key_separates_cookie_and_host() {
        let ana = Session::new(SessionCookie::new("sid=ana"));
        assert_eq!(ana.slot_key(), Session::new(SessionCookie::new("sid=ana")).slot_key());
        assert_ne!(ana.slot_key(), Session::new(SessionCookie::new("sid=bob")).slot_key());
        assert_ne!(ana.slot_key(), ana.clone().with_host("elcampo.example.com").slot_key());
    }

    #[test]
    fn session_builder() {
        let session = Session::new(SessionCookie::new("sid=1")).with_host("agrovid.example.com");
        assert_eq!(session.host.as_deref(), Some("agrovid.example.com"));
        assert!(Session::anonymous().host.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 2,
            ..Default::default()
        };
        let backend = HttpBackend::new(config).unwrap();
        let err = backend
            .validate(&Session::anonymous())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
