use crate::{
    cache::{InstanceCache, WaitGraph},
    instance::Instance,
    lifecycle,
    registry::{OverrideStore, Registry},
    scope::{Scope, ScopeState},
    DeclaredIntrospector, DependencyIntrospector, InjectError, InjectResult,
    Injectable, InjectorBuilder, InterfaceFor, Lifetime, Registration,
    RequestInfo, Resolved, Service, ServiceInfo, Svc, TeardownError,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A runtime dependency injection container. This holds the registration for
/// every service, the overrides installed for testing, and the singleton
/// cache shared by every scope.
///
/// Cloning the injector does not clone the registrations inside of it.
/// Instead, both injectors share the same registry and singletons.
///
/// ```
/// use scoped_injector::{constant, Injector, IntoSingleton, IntoTransient, Svc};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
///
/// fn next(counter: Svc<Counter>) -> usize {
///     counter.0.fetch_add(1, Ordering::SeqCst)
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut builder = Injector::builder();
/// builder.provide(constant(Counter(AtomicUsize::new(0))));
/// builder.provide(next.transient());
///
/// let injector = builder.build();
/// let first: Svc<usize> = injector.resolve().await.unwrap();
/// let second: Svc<usize> = injector.resolve().await.unwrap();
///
/// assert_eq!(0, *first);
/// assert_eq!(1, *second);
/// # }
/// ```
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

struct InjectorInner {
    registry: Registry,
    overrides: OverrideStore,
    declarations: Arc<DeclaredIntrospector>,
    introspector: Arc<dyn DependencyIntrospector>,
    waits: Arc<WaitGraph>,
    singletons: InstanceCache,
}

impl Injector {
    /// Creates a builder for this injector. This is the preferred way of
    /// creating an injector.
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    /// Creates an empty injector which determines the dependencies of each
    /// implementation from the declarations made when it was registered.
    #[must_use]
    pub fn new() -> Self {
        Injector::with_introspector(None)
    }

    pub(crate) fn with_introspector(
        introspector: Option<Arc<dyn DependencyIntrospector>>,
    ) -> Self {
        let declarations = Arc::new(DeclaredIntrospector::new());
        let introspector: Arc<dyn DependencyIntrospector> = match introspector {
            Some(introspector) => introspector,
            None => declarations.clone(),
        };
        let waits = Arc::new(WaitGraph::default());
        Injector {
            inner: Arc::new(InjectorInner {
                registry: Registry::default(),
                overrides: OverrideStore::default(),
                declarations,
                introspector,
                singletons: InstanceCache::new(0, waits.clone()),
                waits,
            }),
        }
    }

    /// Shared by the singleton cache and every scoped cache of this
    /// injector, so waits that cross caches are still seen together.
    pub(crate) fn waits(&self) -> Arc<WaitGraph> {
        self.inner.waits.clone()
    }

    /// Registers `I` as the implementation of the service `S`, replacing any
    /// previous registration of `S`.
    pub fn register<S, I>(&self, lifetime: Lifetime)
    where
        S: ?Sized + InterfaceFor<I>,
        I: Injectable,
    {
        self.provide(Registration::new::<S, I>(lifetime));
    }

    /// Registers `I` as its own implementation.
    pub fn register_self<I: Injectable>(&self, lifetime: Lifetime) {
        self.provide(Registration::of::<I>(lifetime));
    }

    /// Stores a registration, replacing any previous registration of the same
    /// service. A singleton already constructed from the replaced
    /// registration is evicted, so the next request constructs it again from
    /// the new one.
    pub fn provide(&self, registration: impl Into<Registration>) {
        let registration = registration.into();
        let service_info = registration.service_info();

        self.inner.declarations.declare(
            registration.implementation(),
            registration.declared_dependencies(),
        );

        debug!(
            service = service_info.name(),
            implementation = registration.implementation().name(),
            lifetime = %registration.lifetime(),
            "registering service"
        );

        if self.inner.registry.insert(registration).is_some()
            && self.inner.singletons.evict(service_info).is_some()
        {
            warn!(
                service = service_info.name(),
                "service was registered again; evicted its cached singleton"
            );
        }
    }

    /// Whether a registration exists for the service.
    #[must_use]
    pub fn is_registered(&self, service_info: ServiceInfo) -> bool {
        self.inner.registry.contains(service_info)
    }

    /// Installs a pre-built instance that is returned for every request of
    /// `S`, including requests made while constructing other services. The
    /// override bypasses lifetimes entirely and is never torn down by the
    /// injector.
    ///
    /// ```
    /// use scoped_injector::{Injector, IntoSingleton, Svc};
    ///
    /// #[derive(Default)]
    /// struct Mailer(&'static str);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut builder = Injector::builder();
    /// builder.provide((|| Mailer("smtp")).singleton());
    ///
    /// let injector = builder.build();
    /// injector.override_service(Svc::new(Mailer("fake")));
    ///
    /// let mailer: Svc<Mailer> = injector.resolve().await.unwrap();
    /// assert_eq!("fake", mailer.0);
    /// # }
    /// ```
    pub fn override_service<S: ?Sized + Service>(&self, instance: Svc<S>) {
        debug!(service = ServiceInfo::of::<S>().name(), "overriding service");
        self.inner.overrides.insert(Instance::new(instance, None));
    }

    /// Removes every override installed with
    /// [`Injector::override_service`].
    pub fn reset_overrides(&self) {
        debug!("resetting overrides");
        self.inner.overrides.clear();
    }

    /// Begins a new logical context. Scoped services resolved through the
    /// returned [`Scope`] are shared within it and isolated from every other
    /// scope.
    #[must_use]
    pub fn begin_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Resolves a service outside of any scope. Requesting a scoped service
    /// this way fails with [`InjectError::ScopeRequired`].
    pub async fn resolve<S: ?Sized + Service>(&self) -> InjectResult<Svc<S>> {
        self.resolve_in(None).await
    }

    /// Resolves a service outside of any scope, returning `None` if the
    /// service has not been registered.
    ///
    /// Only a missing registration for `S` itself produces `None`. A missing
    /// dependency of `S` is still an error.
    pub async fn try_resolve<S: ?Sized + Service>(
        &self,
    ) -> InjectResult<Option<Svc<S>>> {
        optional::<S>(self.resolve_in(None).await)
    }

    /// Tears down every singleton that exposes a teardown handle, most
    /// recently constructed first, and empties the singleton cache. This is
    /// never done automatically.
    pub async fn shutdown(&self) -> Result<(), TeardownError> {
        debug!(
            singletons = self.inner.singletons.len(),
            "shutting down injector"
        );
        lifecycle::release(&self.inner.singletons).await
    }

    pub(crate) async fn resolve_in<S: ?Sized + Service>(
        &self,
        scope: Option<&ScopeState>,
    ) -> InjectResult<Svc<S>> {
        let request_info = RequestInfo::new();
        self.resolve_instance(ServiceInfo::of::<S>(), scope, &request_info)
            .await?
            .downcast()
    }

    fn resolve_instance<'a>(
        &'a self,
        service_info: ServiceInfo,
        scope: Option<&'a ScopeState>,
        request_info: &'a RequestInfo,
    ) -> BoxFuture<'a, InjectResult<Instance>> {
        async move {
            if let Some(instance) = self.inner.overrides.get(service_info) {
                trace!(service = service_info.name(), "using override");
                return Ok(instance);
            }

            if request_info.is_requesting(service_info) {
                return Err(InjectError::CycleDetected {
                    service_info,
                    cycle: request_info.cycle_through(service_info),
                });
            }

            let request_info = request_info.with_request(service_info);
            let registration = self.inner.registry.lookup(service_info)?;

            match registration.lifetime() {
                Lifetime::Singleton => {
                    self.inner
                        .singletons
                        .get_or_try_init(service_info, &request_info, || {
                            self.construct(&registration, None, &request_info)
                        })
                        .await
                }
                Lifetime::Scoped => {
                    let scope = scope
                        .ok_or(InjectError::ScopeRequired { service_info })?;
                    scope
                        .cache()
                        .get_or_try_init(service_info, &request_info, || {
                            self.construct(
                                &registration,
                                Some(scope),
                                &request_info,
                            )
                        })
                        .await
                }
                Lifetime::Transient => {
                    self.construct(&registration, scope, &request_info).await
                }
            }
        }
        .boxed()
    }

    async fn construct(
        &self,
        registration: &Registration,
        scope: Option<&ScopeState>,
        request_info: &RequestInfo,
    ) -> InjectResult<Instance> {
        let dependencies = self
            .inner
            .introspector
            .introspect(registration.implementation())?;

        let mut entries = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let instance = self
                .resolve_instance(dependency.service_info(), scope, request_info)
                .await?;
            entries.push((dependency, instance));
        }

        debug!(
            service = registration.service_info().name(),
            implementation = registration.implementation().name(),
            lifetime = %registration.lifetime(),
            "constructing service"
        );

        registration
            .activate(Resolved::new(
                registration.service_info(),
                request_info.clone(),
                entries,
            ))
            .await
    }
}

impl Default for Injector {
    fn default() -> Self {
        Injector::new()
    }
}

pub(crate) fn optional<S: ?Sized + Service>(
    result: InjectResult<Svc<S>>,
) -> InjectResult<Option<Svc<S>>> {
    match result {
        Ok(service) => Ok(Some(service)),
        Err(InjectError::UnregisteredService { service_info })
            if service_info == ServiceInfo::of::<S>() =>
        {
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
