//! Per-navigation page body resolution.
//!
//! [`ContentComposer::navigate`] maps a path to a content key, fetches the
//! page, renders its descriptors through the [`ComponentRegistry`] and
//! publishes the active menu id. Empty or failed fetches are disambiguated by
//! a single session recheck: an invalid (or unverifiable) session sends the
//! user to login, a valid one gets "not found".
//!
//! Each navigation takes a new generation number. A navigation that
//! completes after a newer one has started writes nothing and reports
//! [`Navigation::Superseded`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::nav::{NavEvent, NavSink};
use super::registry::{ComponentRegistry, RenderedComponents};
use crate::backend::{ContentSource, Session, SessionStatus, SessionValidator};
use crate::model::{Breadcrumb, PageResponse};

/// Why a page resolved to "not found".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "cause")]
pub enum NotFoundReason {
    /// The content endpoint answered with no components.
    Empty,
    /// The content fetch failed; the session is nonetheless valid.
    ///
    /// `diagnostic` is for logs only and never serialized.
    Failed {
        #[serde(skip)]
        diagnostic: String,
    },
}

/// A successfully composed page body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    pub content_key: String,
    pub components: RenderedComponents,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub active_menu_item_id: Option<String>,
}

impl RenderedPage {
    pub fn html(&self) -> String {
        self.components.html()
    }
}

/// What the body area currently shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum PageState {
    Loading,
    Rendered(RenderedPage),
    NotFound(NotFoundReason),
    RedirectToLogin,
}

impl PageState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Rendered(_) => "rendered",
            Self::NotFound(_) => "not_found",
            Self::RedirectToLogin => "redirect_to_login",
        }
    }
}

/// Result of one [`ContentComposer::navigate`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Completed(PageState),
    /// A newer navigation started first; this result was discarded.
    Superseded,
}

impl Navigation {
    pub fn state(&self) -> Option<&PageState> {
        match self {
            Self::Completed(state) => Some(state),
            Self::Superseded => None,
        }
    }

    pub fn into_state(self) -> Option<PageState> {
        match self {
            Self::Completed(state) => Some(state),
            Self::Superseded => None,
        }
    }
}

/// Resolves page bodies for one view.
pub struct ContentComposer {
    source: Arc<dyn ContentSource>,
    validator: Arc<dyn SessionValidator>,
    registry: Arc<ComponentRegistry>,
    nav: Arc<dyn NavSink>,
    home_key: String,
    generation: AtomicU64,
    state: watch::Sender<PageState>,
}

impl ContentComposer {
    pub fn new(
        source: Arc<dyn ContentSource>,
        validator: Arc<dyn SessionValidator>,
        registry: Arc<ComponentRegistry>,
        nav: Arc<dyn NavSink>,
        home_key: impl Into<String>,
    ) -> Self {
        let (state, _rx) = watch::channel(PageState::Loading);
        Self {
            source,
            validator,
            registry,
            nav,
            home_key: home_key.into(),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Content key for a pathname: the root maps to the home key, anything
    /// else drops its leading `/`.
    pub fn content_key(&self, path: &str) -> String {
        match path {
            "" | "/" => self.home_key.clone(),
            _ => path.strip_prefix('/').unwrap_or(path).to_string(),
        }
    }

    pub fn state(&self) -> PageState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.state.subscribe()
    }

    pub async fn navigate(&self, path: &str, session: &Session) -> Navigation {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.nav.publish(&NavEvent::Cleared);
        self.state.send_replace(PageState::Loading);

        let key = self.content_key(path);
        debug!("Navigation #{generation}: {path} -> content key {key}");

        let outcome = match self.source.fetch_page(&key, session).await {
            Ok(page) if !page.is_empty() => Ok(page),
            Ok(_) => Err(NotFoundReason::Empty),
            Err(e) => {
                warn!("Content fetch for {key} failed: {e}");
                Err(NotFoundReason::Failed {
                    diagnostic: e.to_string(),
                })
            }
        };

        if self.is_stale(generation) {
            debug!("Navigation #{generation} superseded before completion");
            return Navigation::Superseded;
        }

        let next = match outcome {
            Ok(page) => PageState::Rendered(self.render(key, page)),
            Err(reason) => self.recheck_session(&key, reason, session).await,
        };

        self.commit(generation, next)
    }

    fn render(&self, content_key: String, page: PageResponse) -> RenderedPage {
        let components = self.registry.render_all(&page.content);
        RenderedPage {
            content_key,
            components,
            breadcrumbs: page.breadcrumbs,
            active_menu_item_id: page.active_menu_item_id,
        }
    }

    async fn recheck_session(
        &self,
        key: &str,
        reason: NotFoundReason,
        session: &Session,
    ) -> PageState {
        match self.validator.validate(session).await {
            Ok(SessionStatus::Valid) => {
                info!("No content for {key}: {reason:?}");
                PageState::NotFound(reason)
            }
            Ok(SessionStatus::Rejected { status }) => {
                info!("Session rejected (HTTP {status}) while loading {key}");
                PageState::RedirectToLogin
            }
            Err(e) => {
                info!("Session unverifiable while loading {key}: {e}");
                PageState::RedirectToLogin
            }
        }
    }

    /// Publish `next` unless a newer navigation has started.
    fn commit(&self, generation: u64, next: PageState) -> Navigation {
        let published = next.clone();
        let committed = self.state.send_if_modified(|current| {
            if self.is_stale(generation) {
                return false;
            }
            if let PageState::Rendered(page) = &published
                && let Some(id) = &page.active_menu_item_id
            {
                self.nav.publish(&NavEvent::Activated(id.clone()));
            }
            *current = published;
            true
        });

        if committed {
            Navigation::Completed(next)
        } else {
            debug!("Navigation #{generation} superseded before completion");
            Navigation::Superseded
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}
