//! Error types for collaborator calls and component rendering.
//!
//! None of these reach an end user. Each boundary converts them into a gate
//! decision, a template phase or a page state and logs the original.

/// Failure talking to a backend collaborator.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connect, DNS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The collaborator answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded into the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid client or endpoint configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A fake or in-process collaborator reported a failure.
    #[error("{0}")]
    Unavailable(String),
}

impl BackendError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the collaborator was never reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Unavailable(_))
    }
}

/// Failure rendering a single component.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error in {component}: {source}")]
    Template {
        component: String,
        #[source]
        source: minijinja::Error,
    },
}
