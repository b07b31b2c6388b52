use crate::{
    cache::{InstanceCache, WaitGraph},
    injector::optional,
    lifecycle, InjectError, InjectResult, Injector, Service, Svc,
    TeardownError,
};
use once_cell::sync::OnceCell;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;
use tracing::{debug, warn};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// The state owned by one logical context.
pub(crate) struct ScopeState {
    id: u64,
    cache: OnceCell<InstanceCache>,
    waits: Arc<WaitGraph>,
    ended: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl ScopeState {
    fn new(waits: Arc<WaitGraph>) -> Self {
        ScopeState {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            cache: OnceCell::new(),
            waits,
            ended: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Gets the cache bound to this scope, creating it on the first scoped
    /// request. Only resolutions admitted by [`ScopeState::enter`] get here,
    /// and [`Scope::end`] waits for all of them before releasing the cache.
    pub fn cache(&self) -> &InstanceCache {
        self.cache.get_or_init(|| {
            debug!(scope = self.id, "creating scoped cache");
            InstanceCache::new(self.id, self.waits.clone())
        })
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Registers a resolution against this scope. Fails once the scope has
    /// started ending; otherwise [`Scope::end`] waits for the returned guard
    /// to be dropped before tearing anything down.
    fn enter(&self) -> InjectResult<InFlight<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self);
        if self.is_ended() {
            return Err(InjectError::ScopeEnded { scope: self.id });
        }

        Ok(guard)
    }

    /// Waits until no resolution is running against this scope.
    async fn drained(&self) {
        loop {
            let idle = self.idle.notified();
            let running = self.in_flight.load(Ordering::SeqCst);
            if running == 0 {
                return;
            }

            debug!(
                scope = self.id,
                running, "waiting for resolutions to finish"
            );
            idle.await;
        }
    }
}

struct InFlight<'a>(&'a ScopeState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let live = self.cache.get().map_or(0, InstanceCache::len);
        if !self.is_ended() && live > 0 {
            warn!(
                scope = self.id,
                instances = live,
                "scope dropped without being ended; its services were not torn down"
            );
        }
    }
}

/// A logical context, such as a single inbound request. Scoped services are
/// constructed at most once per scope, and no two scopes ever share a scoped
/// instance.
///
/// Clones of a scope refer to the same context. When the context completes,
/// call [`Scope::end`] to tear down the scoped services it created.
///
/// ```
/// use scoped_injector::{Injector, IntoScoped, IntoSingleton, Svc};
///
/// #[derive(Default)]
/// struct Database;
/// struct Session(Svc<Database>);
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut builder = Injector::builder();
/// builder.provide(Database::default.singleton());
/// builder.provide(Session.scoped());
/// let injector = builder.build();
///
/// let first = injector.begin_scope();
/// let second = injector.begin_scope();
/// let a: Svc<Session> = first.resolve().await.unwrap();
/// let b: Svc<Session> = second.resolve().await.unwrap();
///
/// assert!(!Svc::ptr_eq(&a, &b));
/// assert!(Svc::ptr_eq(&a.0, &b.0));
///
/// first.end().await.unwrap();
/// second.end().await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct Scope {
    injector: Injector,
    state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(injector: Injector) -> Self {
        let state = ScopeState::new(injector.waits());
        debug!(scope = state.id, "beginning scope");
        Scope {
            injector,
            state: Arc::new(state),
        }
    }

    /// A process-unique identifier for this scope.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Whether [`Scope::end`] has been called on this scope or a clone of it.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    /// The injector this scope was created from.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Resolves a service within this scope.
    ///
    /// A resolution that is already running when the scope starts ending is
    /// allowed to finish. Anything it caches is torn down with the rest of
    /// the scope.
    pub async fn resolve<S: ?Sized + Service>(&self) -> InjectResult<Svc<S>> {
        let _in_flight = self.state.enter()?;
        self.injector.resolve_in(Some(&*self.state)).await
    }

    /// Resolves a service within this scope, returning `None` if the service
    /// has not been registered.
    pub async fn try_resolve<S: ?Sized + Service>(
        &self,
    ) -> InjectResult<Option<Svc<S>>> {
        optional::<S>(self.resolve().await)
    }

    /// Ends this scope. Every scoped service it created that exposes a
    /// teardown handle is closed exactly once, most recently constructed
    /// first, and the scope's cache is emptied. Failures are collected and
    /// returned together once every service has been closed.
    ///
    /// New requests through the scope fail as soon as this is called.
    /// Requests already running are awaited first, so nothing they cache is
    /// left behind. Ending a scope a second time (through a clone) does
    /// nothing.
    pub async fn end(self) -> Result<(), TeardownError> {
        if self.state.ended.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state.drained().await;

        let Some(cache) = self.state.cache.get() else {
            debug!(scope = self.state.id, "ending scope with no services");
            return Ok(());
        };

        debug!(
            scope = self.state.id,
            instances = cache.len(),
            "ending scope"
        );
        lifecycle::release(cache).await
    }
}
