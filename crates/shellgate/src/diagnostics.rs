//! Tracing layer that keeps recent warnings for later inspection.
//!
//! Nothing in the shell shows collaborator failures to the end user; they
//! are converted into redirects, empty chrome or "not found". The
//! [`DiagnosticsLayer`] captures those log events (warn and above by
//! default) into a bounded [`DiagnosticBuffer`] so an operator tool such as
//! the `shellgate` CLI can print what went wrong after a run.

use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::Serialize;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

/// Maximum entries kept before trimming.
pub const MAX_DIAGNOSTICS: usize = 500;
/// Trim to this many when the cap is exceeded.
pub const DIAGNOSTICS_TRIM_TO: usize = 300;

/// One captured log event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub time: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Shared buffer filled by the layer.
#[derive(Clone, Default)]
pub struct DiagnosticBuffer(Arc<Mutex<Vec<Diagnostic>>>);

impl DiagnosticBuffer {
    /// Take all captured entries, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    pub fn len(&self) -> usize {
        self.0.lock().map_or(0, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, entry: Diagnostic) {
        if let Ok(mut buf) = self.0.lock() {
            buf.push(entry);
            if buf.len() > MAX_DIAGNOSTICS {
                let trim_to = buf.len() - DIAGNOSTICS_TRIM_TO;
                buf.drain(..trim_to);
            }
        }
    }
}

/// A [`tracing_subscriber::Layer`] capturing events at or above a level.
pub struct DiagnosticsLayer {
    buffer: DiagnosticBuffer,
    min_level: Level,
}

impl DiagnosticsLayer {
    /// Layer capturing warnings and errors, plus its buffer.
    pub fn new() -> (Self, DiagnosticBuffer) {
        Self::with_level(Level::WARN)
    }

    pub fn with_level(min_level: Level) -> (Self, DiagnosticBuffer) {
        let buffer = DiagnosticBuffer::default();
        (
            Self {
                buffer: buffer.clone(),
                min_level,
            },
            buffer,
        )
    }
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for DiagnosticsLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        // Levels compare by verbosity: ERROR < WARN < INFO.
        if *metadata.level() > self.min_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            let extras: Vec<String> = visitor
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if message.is_empty() {
                message = extras.join(" ");
            } else {
                message = format!("{message} {{{}}}", extras.join(", "));
            }
        }

        self.buffer.push(Diagnostic {
            time: Local::now().format("%H:%M:%S").to_string(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let raw = format!("{value:?}");
        if field.name() == "message" {
            self.message = raw
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .map(str::to_string)
                .unwrap_or(raw);
        } else {
            self.fields.push((field.name().to_string(), raw));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}
