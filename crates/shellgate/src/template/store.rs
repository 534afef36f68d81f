//! Owned chrome state with a single in-flight fetch.
//!
//! ```text
//!            enter(login)            enter(other), cache hit
//!   any ───────────────▶ Skeleton ─────────────────────────▶ Cached
//!                         ▲ │
//!               abandoned │ │ enter(other), cache miss
//!                         │ ▼
//!                        Fetching ──ok──▶ Loaded   (persisted)
//!                           └──err─────▶ Fallback (empty, not persisted)
//! ```
//!
//! Only the caller that flips `Skeleton` to `Fetching` under the lock issues
//! the request; later callers wait on the watch channel for it to settle.
//! If that caller is dropped mid-fetch (client gone, request cancelled) the
//! phase goes back to `Skeleton` and a waiter takes the fetch over.
//! [`TemplateStore::reset`] bumps the logout epoch so a fetch that started
//! before the reset cannot write its result afterwards.
//!
//! The state lock is a plain `std::sync::Mutex`: it is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cache::TemplateCache;
use super::theme::ThemeVars;
use crate::backend::{Session, TemplateSource};
use crate::error::BackendError;
use crate::model::TemplateData;

/// Where the store is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplatePhase {
    /// Not loaded; data is the skeleton sentinel.
    Skeleton,
    /// Adopted from the persisted cache without a network call.
    Cached,
    /// A fetch is in flight.
    Fetching,
    /// Fetched from the template endpoint and persisted.
    Loaded,
    /// The fetch failed; data is empty and was not persisted.
    Fallback,
}

impl TemplatePhase {
    /// Whether the data is final for this session (no fetch pending or needed).
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Cached | Self::Loaded | Self::Fallback)
    }
}

/// Point-in-time view of the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemplateSnapshot {
    pub phase: TemplatePhase,
    pub data: TemplateData,
    /// Logout counter at the time of the snapshot.
    pub epoch: u64,
}

impl TemplateSnapshot {
    fn skeleton(epoch: u64) -> Self {
        Self {
            phase: TemplatePhase::Skeleton,
            data: TemplateData::skeleton(),
            epoch,
        }
    }

    pub fn theme(&self) -> ThemeVars {
        ThemeVars::from_template(&self.data)
    }
}

/// What `enter` should do after inspecting the state.
enum Step {
    Done(TemplateSnapshot),
    Wait { epoch: u64 },
    Fetch { epoch: u64 },
}

/// Chrome state for one session.
pub struct TemplateStore {
    source: Arc<dyn TemplateSource>,
    cache: Arc<dyn TemplateCache>,
    login_path: String,
    state: Mutex<TemplateSnapshot>,
    tx: watch::Sender<TemplateSnapshot>,
}

impl TemplateStore {
    pub fn new(
        source: Arc<dyn TemplateSource>,
        cache: Arc<dyn TemplateCache>,
        login_path: impl Into<String>,
    ) -> Self {
        let (tx, _rx) = watch::channel(TemplateSnapshot::skeleton(0));
        Self {
            source,
            cache,
            login_path: login_path.into(),
            state: Mutex::new(TemplateSnapshot::skeleton(0)),
            tx,
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Handle a navigation to `path`.
    pub async fn enter(&self, path: &str, session: &Session) -> TemplateSnapshot {
        if path == self.login_path {
            return self.reset();
        }

        loop {
            match self.begin() {
                Step::Done(snapshot) => return snapshot,
                Step::Wait { epoch } => {
                    let snapshot = self.wait_settled().await;
                    // Back at the skeleton in the same epoch: the fetching
                    // caller was dropped, so try again.
                    if snapshot.phase != TemplatePhase::Skeleton || snapshot.epoch != epoch {
                        return snapshot;
                    }
                }
                Step::Fetch { epoch } => {
                    let mut pending = PendingFetch {
                        store: self,
                        epoch,
                        settled: false,
                    };
                    let result = self.source.fetch_template(session).await;
                    pending.settled = true;
                    return self.settle(epoch, result);
                }
            }
        }
    }

    /// Back to the skeleton, persisted entry removed, epoch bumped.
    pub fn reset(&self) -> TemplateSnapshot {
        let mut state = self.lock();
        let epoch = state.epoch + 1;
        *state = TemplateSnapshot::skeleton(epoch);
        if let Err(e) = self.cache.clear() {
            warn!("Failed to clear template cache: {e}");
        }
        debug!("Template store reset (epoch {epoch})");
        self.publish(&state);
        state.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TemplateSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TemplateSnapshot> {
        self.tx.subscribe()
    }

    pub fn theme(&self) -> ThemeVars {
        ThemeVars::from_template(&self.tx.borrow().data)
    }

    fn lock(&self) -> MutexGuard<'_, TemplateSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &TemplateSnapshot) {
        self.tx.send_replace(state.clone());
    }

    /// Decide under the lock; flips `Skeleton` to `Fetching` when this
    /// caller is to fetch.
    fn begin(&self) -> Step {
        let mut state = self.lock();
        match state.phase {
            TemplatePhase::Skeleton => {}
            TemplatePhase::Fetching => return Step::Wait { epoch: state.epoch },
            _ => return Step::Done(state.clone()),
        }

        match self.cache.load() {
            Ok(Some(data)) => {
                debug!("Template adopted from cache ({})", data.tenant.name);
                state.phase = TemplatePhase::Cached;
                state.data = data;
                self.publish(&state);
                return Step::Done(state.clone());
            }
            Ok(None) => {}
            Err(e) => warn!("Template cache unreadable, fetching: {e}"),
        }

        state.phase = TemplatePhase::Fetching;
        self.publish(&state);
        Step::Fetch { epoch: state.epoch }
    }

    fn settle(&self, epoch: u64, result: Result<TemplateData, BackendError>) -> TemplateSnapshot {
        let mut state = self.lock();
        if state.epoch != epoch || state.phase != TemplatePhase::Fetching {
            debug!(
                "Discarding template fetched in epoch {epoch} (now {})",
                state.epoch
            );
            return state.clone();
        }

        match result {
            Ok(data) if !data.is_skeleton() => {
                if let Err(e) = self.cache.save(&data) {
                    warn!("Failed to persist template: {e}");
                }
                info!("Template loaded for tenant {}", data.tenant.name);
                state.phase = TemplatePhase::Loaded;
                state.data = data;
            }
            Ok(_) => {
                warn!("Template endpoint returned the skeleton; using empty chrome");
                state.phase = TemplatePhase::Fallback;
                state.data = TemplateData::empty();
            }
            Err(e) => {
                warn!("Template fetch failed, using empty chrome: {e}");
                state.phase = TemplatePhase::Fallback;
                state.data = TemplateData::empty();
            }
        }
        self.publish(&state);
        state.clone()
    }

    /// The fetching caller went away without settling.
    fn abandon(&self, epoch: u64) {
        let mut state = self.lock();
        if state.epoch == epoch && state.phase == TemplatePhase::Fetching {
            debug!("Template fetch abandoned in epoch {epoch}; back to skeleton");
            *state = TemplateSnapshot::skeleton(epoch);
            self.publish(&state);
        }
    }

    async fn wait_settled(&self) -> TemplateSnapshot {
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|s| s.phase != TemplatePhase::Fetching)
            .await
            .map(|s| s.clone());
        match settled {
            Ok(snapshot) => snapshot,
            Err(_) => self.lock().clone(),
        }
    }
}

/// Restores `Skeleton` if the future driving a fetch is dropped before the
/// result is settled.
struct PendingFetch<'a> {
    store: &'a TemplateStore,
    epoch: u64,
    settled: bool,
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.store.abandon(self.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendFuture, SessionCookie};
    use crate::error::BackendError;
    use crate::model::TenantInfo;
    use crate::template::cache::MemoryTemplateCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FakeSource {
        result: Result<TemplateData, String>,
        calls: AtomicUsize,
        gate: Option<Notify>,
    }

    impl FakeSource {
        fn ok(data: TemplateData) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(data),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err("connection refused".into()),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        /// Blocks each fetch until `release()` is called.
        fn gated(data: TemplateData) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(data),
                calls: AtomicUsize::new(0),
                gate: Some(Notify::new()),
            })
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TemplateSource for FakeSource {
        fn fetch_template<'a>(&'a self, _session: &'a Session) -> BackendFuture<'a, TemplateData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                self.result.clone().map_err(BackendError::Unavailable)
            })
        }
    }

    fn agrovid() -> TemplateData {
        TemplateData {
            tenant: TenantInfo {
                name: "Agrovid".into(),
                logo_ref: "/images/agrovid.png".into(),
                primary_color: "#123456".into(),
                light_color: "#abcdef".into(),
                logo_width_token: "120px".into(),
            },
            ..Default::default()
        }
    }

    fn session() -> Session {
        Session::new(SessionCookie::new("sid=1"))
    }

    fn store(source: Arc<FakeSource>, cache: Arc<MemoryTemplateCache>) -> TemplateStore {
        TemplateStore::new(source, cache, "/login")
    }

    #[tokio::test]
    async fn starts_as_skeleton() {
        let store = store(FakeSource::ok(agrovid()), Arc::new(MemoryTemplateCache::new()));
        let snap = store.snapshot();
        assert_eq!(snap.phase, TemplatePhase::Skeleton);
        assert!(snap.data.is_skeleton());
        assert_eq!(store.theme().primary, "#219ebc");
    }

    #[tokio::test]
    async fn first_entry_fetches_and_persists() {
        let source = FakeSource::ok(agrovid());
        let cache = Arc::new(MemoryTemplateCache::new());
        let store = store(source.clone(), cache.clone());

        let snap = store.enter("/", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Loaded);
        assert_eq!(snap.data, agrovid());
        assert_eq!(cache.load().unwrap(), Some(agrovid()));

        let again = store.enter("/reports", &session()).await;
        assert_eq!(again.phase, TemplatePhase::Loaded);
        assert_eq!(source.calls(), 1);
        assert_eq!(store.theme().logo_width, "120px");
    }

    #[tokio::test]
    async fn cached_entry_is_adopted_without_fetch() {
        let source = FakeSource::ok(TemplateData::empty());
        let cache = Arc::new(MemoryTemplateCache::with_entry(agrovid()));
        let store = store(source.clone(), cache);

        let snap = store.enter("/", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Cached);
        assert_eq!(snap.data, agrovid());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_empty_and_is_not_persisted() {
        let source = FakeSource::failing();
        let cache = Arc::new(MemoryTemplateCache::new());
        let store = store(source.clone(), cache.clone());

        let snap = store.enter("/", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Fallback);
        assert_eq!(snap.data, TemplateData::empty());
        assert!(!snap.data.is_skeleton());
        assert_eq!(cache.load().unwrap(), None);

        // Fallback is settled: no retry on the next navigation.
        store.enter("/reports", &session()).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn skeleton_from_backend_is_never_persisted() {
        let source = FakeSource::ok(TemplateData::skeleton());
        let cache = Arc::new(MemoryTemplateCache::new());
        let store = store(source, cache.clone());

        let snap = store.enter("/", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Fallback);
        assert_eq!(cache.load().unwrap(), None);
    }

    #[tokio::test]
    async fn login_route_resets_and_clears_cache() {
        let source = FakeSource::ok(agrovid());
        let cache = Arc::new(MemoryTemplateCache::new());
        let store = store(source.clone(), cache.clone());

        store.enter("/", &session()).await;
        let snap = store.enter("/login", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Skeleton);
        assert!(snap.data.is_skeleton());
        assert_eq!(snap.epoch, 1);
        assert_eq!(cache.load().unwrap(), None);

        // The next protected navigation fetches again.
        let snap = store.enter("/", &session()).await;
        assert_eq!(snap.phase, TemplatePhase::Loaded);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn login_route_from_skeleton_still_clears() {
        let cache = Arc::new(MemoryTemplateCache::with_entry(agrovid()));
        let store = store(FakeSource::ok(agrovid()), cache.clone());
        store.enter("/login", &session()).await;
        assert_eq!(cache.load().unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_entries_issue_one_fetch() {
        let source = FakeSource::gated(agrovid());
        let store = Arc::new(store(source.clone(), Arc::new(MemoryTemplateCache::new())));

        let mut rx = store.subscribe();
        let first = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/", &session()).await }
        });
        rx.wait_for(|s| s.phase == TemplatePhase::Fetching)
            .await
            .unwrap();

        let second = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/reports", &session()).await }
        });
        tokio::task::yield_now().await;
        source.release();

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        assert_eq!(a.phase, TemplatePhase::Loaded);
        assert_eq!(b.phase, TemplatePhase::Loaded);
        assert_eq!(a.data, b.data);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn late_result_after_logout_is_discarded() {
        let source = FakeSource::gated(agrovid());
        let cache = Arc::new(MemoryTemplateCache::new());
        let store = Arc::new(store(source.clone(), cache.clone()));

        let mut rx = store.subscribe();
        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/", &session()).await }
        });
        rx.wait_for(|s| s.phase == TemplatePhase::Fetching)
            .await
            .unwrap();

        store.reset();
        source.release();

        let snap = pending.await.unwrap();
        assert_eq!(snap.phase, TemplatePhase::Skeleton);
        assert_eq!(store.snapshot().phase, TemplatePhase::Skeleton);
        assert!(store.snapshot().data.is_skeleton());
        assert_eq!(cache.load().unwrap(), None);
    }

    #[tokio::test]
    async fn abandoned_fetch_returns_to_skeleton() {
        let source = FakeSource::gated(agrovid());
        let store = Arc::new(store(source.clone(), Arc::new(MemoryTemplateCache::new())));

        let mut rx = store.subscribe();
        let doomed = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/", &session()).await }
        });
        rx.wait_for(|s| s.phase == TemplatePhase::Fetching)
            .await
            .unwrap();
        doomed.abort();
        assert!(doomed.await.unwrap_err().is_cancelled());
        assert_eq!(store.snapshot().phase, TemplatePhase::Skeleton);
        assert_eq!(store.snapshot().epoch, 0);

        source.release();
        let sess = session();
        let next = store.enter("/reports", &sess);
        let snap = tokio::time::timeout(Duration::from_secs(2), next)
            .await
            .expect("enter after an abandoned fetch must not hang");
        assert_eq!(snap.phase, TemplatePhase::Loaded);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn waiter_takes_over_abandoned_fetch() {
        let source = FakeSource::gated(agrovid());
        let store = Arc::new(store(source.clone(), Arc::new(MemoryTemplateCache::new())));

        let mut rx = store.subscribe();
        let doomed = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/", &session()).await }
        });
        rx.wait_for(|s| s.phase == TemplatePhase::Fetching)
            .await
            .unwrap();
        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.enter("/reports", &session()).await }
        });
        tokio::task::yield_now().await;

        doomed.abort();
        assert!(doomed.await.unwrap_err().is_cancelled());
        source.release();
        let snap = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter must not hang")
            .unwrap();
        assert_eq!(snap.phase, TemplatePhase::Loaded);
        assert_eq!(snap.data, agrovid());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let store = store(FakeSource::ok(agrovid()), Arc::new(MemoryTemplateCache::new()));
        let mut rx = store.subscribe();
        store.enter("/", &session()).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, TemplatePhase::Loaded);
        assert!(store.snapshot().phase.is_settled());
    }
}
