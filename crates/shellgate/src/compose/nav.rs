//! Active navigation highlight, published one way from the composer.
//!
//! The composer never reads the menu. It emits [`NavEvent`]s through a
//! [`NavSink`] and whoever draws the menu decides what to highlight.
//!
//! | Sink | Use case |
//! |------|----------|
//! | [`NoopNavSink`] | Tests, CLI runs |
//! | [`NavHighlight`] | Shell-side state backed by a `watch` channel |
//! | [`FnNavSink`] | Quick closures |
//! | [`CompositeNavSink`] | Fan out to several sinks in order |

use serde::Serialize;
use tokio::sync::watch;
use tracing::trace;

use crate::model::TemplateData;

/// Change to the highlighted menu entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "id")]
pub enum NavEvent {
    /// A navigation started; nothing is highlighted.
    Cleared,
    /// The page asked for this menu id to be highlighted.
    Activated(String),
}

/// Receiver of navigation highlight events.
pub trait NavSink: Send + Sync {
    fn publish(&self, event: &NavEvent);
}

/// Discards every event.
pub struct NoopNavSink;
impl NavSink for NoopNavSink {
    fn publish(&self, _event: &NavEvent) {}
}

/// A sink backed by a closure.
///
/// ```ignore
/// let sink = FnNavSink::new(|event| println!("{event:?}"));
/// ```
pub struct FnNavSink<F>(F)
where
    F: Fn(&NavEvent) + Send + Sync;

impl<F> FnNavSink<F>
where
    F: Fn(&NavEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> NavSink for FnNavSink<F>
where
    F: Fn(&NavEvent) + Send + Sync,
{
    fn publish(&self, event: &NavEvent) {
        (self.0)(event)
    }
}

/// Delegates to multiple sinks in registration order.
pub struct CompositeNavSink {
    sinks: Vec<Box<dyn NavSink>>,
}

impl CompositeNavSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl NavSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add a sink from an `Option`. `None` is a no-op.
    pub fn with_opt(self, sink: Option<impl NavSink + 'static>) -> Self {
        match sink {
            Some(s) => self.with(s),
            None => self,
        }
    }
}

impl Default for CompositeNavSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NavSink for CompositeNavSink {
    fn publish(&self, event: &NavEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}

// ── NavHighlight ──────────────────────────────────────────────────

/// Currently highlighted menu id, observable through a `watch` channel.
///
/// Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct NavHighlight {
    tx: watch::Sender<Option<String>>,
}

impl Default for NavHighlight {
    fn default() -> Self {
        Self::new()
    }
}

impl NavHighlight {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn active(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// The active id, only if it names an entry of the current menu.
    pub fn active_in(&self, template: &TemplateData) -> Option<String> {
        self.active()
            .filter(|id| template.menu_item(id).is_some())
    }
}

impl NavSink for NavHighlight {
    fn publish(&self, event: &NavEvent) {
        trace!("Nav event: {event:?}");
        let next = match event {
            NavEvent::Cleared => None,
            NavEvent::Activated(id) => Some(id.clone()),
        };
        self.tx.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MenuItem;
    use std::sync::{Arc, Mutex};

    #[test]
    fn highlight_follows_events() {
        let nav = NavHighlight::new();
        assert_eq!(nav.active(), None);
        nav.publish(&NavEvent::Activated("home".into()));
        assert_eq!(nav.active().as_deref(), Some("home"));
        nav.publish(&NavEvent::Cleared);
        assert_eq!(nav.active(), None);
    }

    #[test]
    fn unknown_id_highlights_nothing() {
        let nav = NavHighlight::new();
        let template = TemplateData {
            main_menu: vec![MenuItem {
                id: "home".into(),
                label: "Inicio".into(),
                href: "/".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        nav.publish(&NavEvent::Activated("ghost".into()));
        assert_eq!(nav.active_in(&template), None);
        nav.publish(&NavEvent::Activated("home".into()));
        assert_eq!(nav.active_in(&template).as_deref(), Some("home"));
    }

    #[test]
    fn composite_fans_out_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        let sink = CompositeNavSink::new()
            .with(FnNavSink::new(move |e| a.lock().unwrap().push(format!("a:{e:?}"))))
            .with_opt(None::<NoopNavSink>)
            .with(FnNavSink::new(move |e| b.lock().unwrap().push(format!("b:{e:?}"))));
        sink.publish(&NavEvent::Cleared);
        assert_eq!(*seen.lock().unwrap(), vec!["a:Cleared", "b:Cleared"]);
    }

    #[test]
    fn clones_share_state() {
        let nav = NavHighlight::new();
        let other = nav.clone();
        nav.publish(&NavEvent::Activated("reports".into()));
        assert_eq!(other.active().as_deref(), Some("reports"));
    }

    #[test]
    fn event_serialization() {
        let json = serde_json::to_value(NavEvent::Activated("home".into())).unwrap();
        assert_eq!(json, serde_json::json!({"event": "activated", "id": "home"}));
    }
}
