//! Wiring of the gate, the per-session chrome and the composer from a
//! [`ShellConfig`].
//!
//! Chrome (template store and nav highlight) belongs to one browser session:
//! the request host plus its raw cookie. Two requests share chrome only when
//! both match, so one user's header or one tenant's branding is never served
//! to another. A session's chrome is created on first use and dropped when it
//! enters the login route ([`Shell::end_session`]) or when it is the least
//! recently used one past [`MAX_SESSIONS`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::backend::{
    Authenticator, ContentSource, HttpBackend, Session, SessionValidator, TemplateSource,
};
use crate::compose::{ComponentRegistry, ContentComposer, NavHighlight};
use crate::config::ShellConfig;
use crate::error::BackendError;
use crate::gate::{BypassList, SessionGate};
use crate::template::{FileTemplateCache, MemoryTemplateCache, TemplateCache, TemplateStore};

/// Live session chrome kept before the least recently used is dropped.
pub const MAX_SESSIONS: usize = 1024;

/// Collaborator handles used to assemble a [`Shell`].
#[derive(Clone)]
pub struct Collaborators {
    pub validator: Arc<dyn SessionValidator>,
    pub templates: Arc<dyn TemplateSource>,
    pub content: Arc<dyn ContentSource>,
    pub authenticator: Arc<dyn Authenticator>,
}

impl Collaborators {
    /// All four roles served by one implementation.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SessionValidator + TemplateSource + ContentSource + Authenticator + 'static,
    {
        Self {
            validator: backend.clone(),
            templates: backend.clone(),
            content: backend.clone(),
            authenticator: backend,
        }
    }
}

/// Chrome owned by one browser session.
///
/// Cheap to clone; clones share the store and the highlight.
#[derive(Clone)]
pub struct SessionChrome {
    pub templates: Arc<TemplateStore>,
    pub nav: NavHighlight,
}

struct SessionSlot {
    chrome: SessionChrome,
    /// Logical clock value of the last lookup.
    last_used: u64,
}

/// One shell process: gate, registry and the chrome of every live session.
pub struct Shell {
    config: ShellConfig,
    gate: SessionGate,
    registry: Arc<ComponentRegistry>,
    collaborators: Collaborators,
    sessions: Mutex<HashMap<String, SessionSlot>>,
    clock: AtomicU64,
}

impl Shell {
    /// Build against the HTTP backend described by `config`.
    pub fn connect(config: ShellConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
        if let Some(dir) = &config.cache.dir {
            info!("Template cache under {}", dir.display());
        }
        Ok(Self::new(config, Collaborators::from_backend(backend)))
    }

    pub fn new(config: ShellConfig, collaborators: Collaborators) -> Self {
        let gate = SessionGate::new(
            collaborators.validator.clone(),
            BypassList::new(config.gate.bypass.clone()),
        )
        .with_login_path(config.login_path.clone());
        Self {
            config,
            gate,
            registry: Arc::new(ComponentRegistry::builtin()),
            collaborators,
            sessions: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Replace the component registry.
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.collaborators.authenticator
    }

    /// Chrome for `session`, created on first use.
    pub fn chrome(&self, session: &Session) -> SessionChrome {
        let key = session.slot_key();
        let mut sessions = self.lock_sessions();
        let now = self.clock.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = sessions.get_mut(&key) {
            slot.last_used = now;
            return slot.chrome.clone();
        }

        if sessions.len() >= MAX_SESSIONS
            && let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
        {
            sessions.remove(&oldest);
            debug!("Dropped least recently used session chrome");
        }

        let chrome = SessionChrome {
            templates: Arc::new(TemplateStore::new(
                self.collaborators.templates.clone(),
                self.cache_for(&key),
                self.config.login_path.clone(),
            )),
            nav: NavHighlight::new(),
        };
        sessions.insert(
            key,
            SessionSlot {
                chrome: chrome.clone(),
                last_used: now,
            },
        );
        debug!("New session chrome ({} live)", sessions.len());
        chrome
    }

    /// Drop `session`'s chrome, resetting its store and clearing its
    /// persisted entry. `false` when the session had no chrome.
    pub fn end_session(&self, session: &Session) -> bool {
        let removed = self.lock_sessions().remove(&session.slot_key());
        match removed {
            Some(slot) => {
                slot.chrome.templates.reset();
                true
            }
            None => false,
        }
    }

    /// Number of sessions with live chrome.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// A composer publishing into `chrome`'s highlight.
    pub fn composer(&self, chrome: &SessionChrome) -> ContentComposer {
        ContentComposer::new(
            self.collaborators.content.clone(),
            self.collaborators.validator.clone(),
            self.registry.clone(),
            Arc::new(chrome.nav.clone()),
            self.config.home_content_key.clone(),
        )
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_for(&self, key: &str) -> Arc<dyn TemplateCache> {
        match &self.config.cache.dir {
            Some(dir) => Arc::new(FileTemplateCache::new(dir.join(slot_dir(key)))),
            None => Arc::new(MemoryTemplateCache::new()),
        }
    }
}

/// Directory name of a session's persisted chrome. The raw cookie never
/// reaches the file system.
fn slot_dir(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthOutcome, BackendFuture, Credentials, SessionCookie, SessionStatus};
    use crate::compose::PageState;
    use crate::model::{ComponentDescriptor, HeaderData, PageResponse, TemplateData, TenantInfo};
    use crate::template::TemplatePhase;
    use serde_json::json;

    /// Answers every call; the template header echoes the caller's cookie.
    struct StaticBackend;

    impl SessionValidator for StaticBackend {
        fn validate<'a>(&'a self, _session: &'a Session) -> BackendFuture<'a, SessionStatus> {
            Box::pin(async { Ok(SessionStatus::Valid) })
        }
    }

    impl TemplateSource for StaticBackend {
        fn fetch_template<'a>(&'a self, session: &'a Session) -> BackendFuture<'a, TemplateData> {
            Box::pin(async move {
                Ok(TemplateData {
                    tenant: TenantInfo {
                        name: session.host.clone().unwrap_or_else(|| "Agrovid".into()),
                        ..Default::default()
                    },
                    header: HeaderData {
                        full_name: session.cookie.header_value().unwrap_or("").to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                })
            })
        }
    }

    impl ContentSource for StaticBackend {
        fn fetch_page<'a>(
            &'a self,
            key: &'a str,
            _session: &'a Session,
        ) -> BackendFuture<'a, PageResponse> {
            Box::pin(async move {
                Ok(PageResponse {
                    content: vec![ComponentDescriptor::new("Card", json!({"title": key}))],
                    active_menu_item_id: Some("home".into()),
                    breadcrumbs: Vec::new(),
                })
            })
        }
    }

    impl Authenticator for StaticBackend {
        fn authenticate<'a>(
            &'a self,
            _credentials: &'a Credentials,
            _session: &'a Session,
        ) -> BackendFuture<'a, AuthOutcome> {
            Box::pin(async { Ok(AuthOutcome::default()) })
        }
    }

    fn shell_with(config: ShellConfig) -> Shell {
        Shell::new(config, Collaborators::from_backend(Arc::new(StaticBackend)))
    }

    fn shell() -> Shell {
        shell_with(ShellConfig::default())
    }

    fn user(cookie: &str) -> Session {
        Session::new(SessionCookie::new(cookie))
    }

    #[tokio::test]
    async fn wiring_runs_store_and_composer_together() {
        let shell = shell();
        let session = Session::anonymous();
        let chrome = shell.chrome(&session);
        let composer = shell.composer(&chrome);
        let (snapshot, navigation) = tokio::join!(
            chrome.templates.enter("/", &session),
            composer.navigate("/", &session),
        );
        assert_eq!(snapshot.phase, TemplatePhase::Loaded);
        let Some(PageState::Rendered(page)) = navigation.into_state() else {
            panic!("expected rendered page");
        };
        assert_eq!(page.content_key, "home/index_for_all");
        assert!(page.html().contains(r#"class="card""#));
        assert_eq!(chrome.nav.active().as_deref(), Some("home"));
    }

    #[tokio::test]
    async fn sessions_never_share_chrome() {
        let shell = shell();
        let ana = user("sid=ana");
        let bob = user("sid=bob");

        let ana_chrome = shell.chrome(&ana).templates.enter("/", &ana).await;
        let bob_chrome = shell.chrome(&bob).templates.enter("/", &bob).await;
        assert_eq!(ana_chrome.data.header.full_name, "sid=ana");
        assert_eq!(bob_chrome.data.header.full_name, "sid=bob");
        assert_eq!(shell.session_count(), 2);

        // Same cookie, other tenant host: separate chrome too.
        let other_host = user("sid=ana").with_host("elcampo.example.com");
        let snap = shell
            .chrome(&other_host)
            .templates
            .enter("/", &other_host)
            .await;
        assert_eq!(snap.data.tenant.name, "elcampo.example.com");
        assert_eq!(shell.session_count(), 3);
    }

    #[tokio::test]
    async fn highlight_is_per_session() {
        let shell = shell();
        let ana = user("sid=ana");
        let bob = user("sid=bob");
        let ana_chrome = shell.chrome(&ana);
        shell.composer(&ana_chrome).navigate("/", &ana).await;

        assert_eq!(ana_chrome.nav.active().as_deref(), Some("home"));
        assert_eq!(shell.chrome(&bob).nav.active(), None);
    }

    #[tokio::test]
    async fn end_session_drops_chrome() {
        let shell = shell();
        let ana = user("sid=ana");
        let first = shell.chrome(&ana);
        first.templates.enter("/", &ana).await;

        assert!(shell.end_session(&ana));
        assert_eq!(first.templates.snapshot().phase, TemplatePhase::Skeleton);
        assert_eq!(shell.session_count(), 0);
        assert!(!shell.end_session(&ana));

        let again = shell.chrome(&ana);
        assert_eq!(again.templates.snapshot().phase, TemplatePhase::Skeleton);
    }

    #[test]
    fn least_recently_used_session_is_dropped_at_capacity() {
        let shell = shell();
        for i in 0..MAX_SESSIONS {
            shell.chrome(&user(&format!("sid={i}")));
        }
        // Touch the oldest so the second oldest goes instead.
        shell.chrome(&user("sid=0"));
        shell.chrome(&user("sid=new"));
        assert_eq!(shell.session_count(), MAX_SESSIONS);
        assert!(shell.end_session(&user("sid=0")));
        assert!(!shell.end_session(&user("sid=1")));
    }

    #[test]
    fn gate_uses_configured_login_path() {
        let config = ShellConfig {
            login_path: "/signin".into(),
            ..Default::default()
        };
        let shell = shell_with(config);
        assert_eq!(shell.gate().login_path(), "/signin");
        assert_eq!(
            shell.chrome(&Session::anonymous()).templates.login_path(),
            "/signin"
        );
    }

    #[tokio::test]
    async fn file_cache_is_kept_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ShellConfig::default();
        config.cache.dir = Some(dir.path().to_path_buf());
        let shell = shell_with(config);

        let ana = user("sid=ana");
        let bob = user("sid=bob");
        shell.chrome(&ana).templates.enter("/", &ana).await;
        shell.chrome(&bob).templates.enter("/", &bob).await;

        let slots: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| !s.contains("ana") && s.len() == 64));

        shell.end_session(&ana);
        let ana_cache = FileTemplateCache::new(dir.path().join(slot_dir(&ana.slot_key())));
        let bob_cache = FileTemplateCache::new(dir.path().join(slot_dir(&bob.slot_key())));
        assert_eq!(ana_cache.load().unwrap(), None);
        assert!(bob_cache.load().unwrap().is_some());
    }

    #[test]
    fn connect_builds_http_shell() {
        let shell = Shell::connect(ShellConfig::default()).unwrap();
        assert_eq!(shell.registry().names().count(), 5);
        assert_eq!(shell.session_count(), 0);
    }
}
