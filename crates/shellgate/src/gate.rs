//! Session gate: the per-request authorization check.
//!
//! [`SessionGate::evaluate`] runs before anything protected is rendered. A
//! path matching the [`BypassList`] passes without a validator call. Every
//! other path costs exactly one [`SessionValidator`] call, and anything short
//! of a definite "valid" answer denies the request (fail-closed).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{Session, SessionStatus, SessionValidator};

/// Status code of the login redirect.
pub const REDIRECT_STATUS: u16 = 302;

/// `Cache-Control` value attached to the login redirect.
pub const REDIRECT_CACHE_CONTROL: &str = "no-store";

// ── Bypass rules ──────────────────────────────────────────────────

/// A path pattern exempt from session verification.
///
/// Serialized externally tagged, so TOML reads naturally:
///
/// ```toml
/// [[gate.bypass]]
/// prefix = "/assets"
///
/// [[gate.bypass]]
/// prefix_from_referer = { prefix = "/_server", referer_contains = "/login" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassRule {
    Prefix(String),
    Suffix(String),
    Contains(String),
    /// Path starts with `prefix` and the `Referer` header contains
    /// `referer_contains`.
    PrefixFromReferer {
        prefix: String,
        referer_contains: String,
    },
}

impl BypassRule {
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::Prefix("/_build".into()),
            Self::Prefix("/assets".into()),
            Self::Contains(".png".into()),
            Self::Contains(".ico".into()),
            Self::Contains(".svg".into()),
            Self::Contains(".css".into()),
            Self::Contains(".js".into()),
            Self::Suffix("/login".into()),
            Self::PrefixFromReferer {
                prefix: "/_server".into(),
                referer_contains: "/login".into(),
            },
        ]
    }

    pub fn matches(&self, path: &str, referer: Option<&str>) -> bool {
        match self {
            Self::Prefix(p) => path.starts_with(p.as_str()),
            Self::Suffix(s) => path.ends_with(s.as_str()),
            Self::Contains(s) => path.contains(s.as_str()),
            Self::PrefixFromReferer {
                prefix,
                referer_contains,
            } => {
                path.starts_with(prefix.as_str())
                    && referer.is_some_and(|r| r.contains(referer_contains.as_str()))
            }
        }
    }
}

/// Ordered set of [`BypassRule`]s. A path is exempt if any rule matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BypassList {
    rules: Vec<BypassRule>,
}

impl Default for BypassList {
    fn default() -> Self {
        Self::new(BypassRule::defaults())
    }
}

impl BypassList {
    pub fn new(rules: Vec<BypassRule>) -> Self {
        Self { rules }
    }

    /// A list that exempts nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, rule: BypassRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[BypassRule] {
        &self.rules
    }

    /// First rule exempting this request, if any.
    pub fn matching(&self, path: &str, referer: Option<&str>) -> Option<&BypassRule> {
        self.rules.iter().find(|r| r.matches(path, referer))
    }

    pub fn is_bypassed(&self, path: &str, referer: Option<&str>) -> bool {
        self.matching(path, referer).is_some()
    }
}

// ── Decisions ─────────────────────────────────────────────────────

/// What the gate needs to know about an incoming request.
#[derive(Clone, Debug, Default)]
pub struct GateRequest {
    pub path: String,
    pub referer: Option<String>,
    pub session: Session,
}

impl GateRequest {
    pub fn new(path: impl Into<String>, session: Session) -> Self {
        Self {
            path: path.into(),
            referer: None,
            session,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Redirect issued on denial.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRedirect {
    pub location: String,
    pub status: u16,
    pub cache_control: &'static str,
}

impl LoginRedirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: REDIRECT_STATUS,
            cache_control: REDIRECT_CACHE_CONTROL,
        }
    }
}

/// Why a request was denied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DenyReason {
    /// The validator answered with a non-success status.
    Rejected { status: u16 },
    /// The validator could not be reached or its answer could not be read.
    Unverifiable { detail: String },
}

/// Outcome of [`SessionGate::evaluate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Exempt path; the validator was not consulted.
    Bypass,
    /// Session confirmed valid.
    Allow,
    Deny {
        redirect: LoginRedirect,
        reason: DenyReason,
    },
}

impl GateDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }

    pub fn redirect(&self) -> Option<&LoginRedirect> {
        match self {
            Self::Deny { redirect, .. } => Some(redirect),
            _ => None,
        }
    }
}

// ── SessionGate ───────────────────────────────────────────────────

/// Decides allow / deny-and-redirect for each request.
#[derive(Clone)]
pub struct SessionGate {
    validator: Arc<dyn SessionValidator>,
    bypass: BypassList,
    login_path: String,
}

impl SessionGate {
    pub fn new(validator: Arc<dyn SessionValidator>, bypass: BypassList) -> Self {
        Self {
            validator,
            bypass,
            login_path: crate::LOGIN_PATH.to_string(),
        }
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    pub fn bypass_list(&self) -> &BypassList {
        &self.bypass
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub async fn evaluate(&self, request: &GateRequest) -> GateDecision {
        if let Some(rule) = self
            .bypass
            .matching(&request.path, request.referer.as_deref())
        {
            debug!("Gate bypass for {} ({:?})", request.path, rule);
            return GateDecision::Bypass;
        }

        let reason = match self.validator.validate(&request.session).await {
            Ok(SessionStatus::Valid) => {
                debug!("Gate allow for {}", request.path);
                return GateDecision::Allow;
            }
            Ok(SessionStatus::Rejected { status }) => DenyReason::Rejected { status },
            Err(e) => DenyReason::Unverifiable {
                detail: e.to_string(),
            },
        };

        info!(
            "Gate deny for {} -> {}: {:?}",
            request.path, self.login_path, reason
        );
        GateDecision::Deny {
            redirect: LoginRedirect::to(self.login_path.clone()),
            reason,
        }
    }
}
