//! Convenience re-exports for common `shellgate` types.
//!
//! ```ignore
//! use shellgate::prelude::*;
//! ```
//!
//! Cache implementations, diagnostics and registry internals are left out;
//! import those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::backend::{
    AuthOutcome, Authenticator, BackendFuture, ContentSource, Credentials, HttpBackend, Session,
    SessionCookie, SessionStatus, SessionValidator, TemplateSource,
};
pub use crate::error::BackendError;
pub use crate::model::{ComponentDescriptor, PageResponse, TemplateData};

// ── Runtime ─────────────────────────────────────────────────────────
pub use crate::compose::{ContentComposer, NavEvent, NavHighlight, NavSink, Navigation, PageState};
pub use crate::config::ShellConfig;
pub use crate::gate::{GateDecision, GateRequest, SessionGate};
pub use crate::shell::{Collaborators, SessionChrome, Shell};
pub use crate::template::{TemplatePhase, TemplateSnapshot, TemplateStore};
