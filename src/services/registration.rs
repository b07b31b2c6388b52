use crate::{
    instance::Instance, Dependency, Injectable, InjectResult, InterfaceFor,
    Lifetime, Resolved, Service, ServiceFactory, ServiceInfo, Svc,
};
use futures_util::future::{self, BoxFuture, FutureExt};
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};

/// Builds instances of one implementation from its resolved dependencies.
pub(crate) trait Activator: Send + Sync {
    /// The constructor inputs the implementation declares.
    fn dependencies(&self) -> Vec<Dependency>;

    /// Constructs the implementation and wraps it as an instance of the
    /// registered service.
    fn activate(
        &self,
        dependencies: Resolved,
    ) -> BoxFuture<'static, InjectResult<Instance>>;
}

/// Binds a service to the implementation that provides it and the lifetime
/// of the instances it creates. Registrations are immutable once created.
#[derive(Clone)]
pub struct Registration {
    service_info: ServiceInfo,
    implementation: ServiceInfo,
    lifetime: Lifetime,
    activator: Arc<dyn Activator>,
}

impl Registration {
    /// Registers `I` as the implementation of the service `S`.
    #[must_use]
    pub fn new<S, I>(lifetime: Lifetime) -> Self
    where
        S: ?Sized + InterfaceFor<I>,
        I: Injectable,
    {
        Registration {
            service_info: ServiceInfo::of::<S>(),
            implementation: ServiceInfo::of::<I>(),
            lifetime,
            activator: Arc::new(InjectableActivator::<S, I> {
                marker: PhantomData,
            }),
        }
    }

    /// Registers `I` as its own implementation.
    #[must_use]
    pub fn of<I: Injectable>(lifetime: Lifetime) -> Self {
        Registration::new::<I, I>(lifetime)
    }

    /// Registers a pre-built instance of a service. The instance is treated
    /// as a singleton and is never torn down by the injector. Its
    /// implementation is reported as the service pointer type `Svc<S>`.
    #[must_use]
    pub fn instance<S: ?Sized + Service>(instance: Svc<S>) -> Self {
        Registration {
            service_info: ServiceInfo::of::<S>(),
            implementation: ServiceInfo::of::<Svc<S>>(),
            lifetime: Lifetime::Singleton,
            activator: Arc::new(InstanceActivator {
                instance: Instance::new(instance, None),
            }),
        }
    }

    pub(crate) fn from_factory<S, D, F>(factory: F, lifetime: Lifetime) -> Self
    where
        S: ?Sized + InterfaceFor<F::Result>,
        D: 'static,
        F: ServiceFactory<D>,
    {
        Registration {
            service_info: ServiceInfo::of::<S>(),
            implementation: ServiceInfo::of::<F>(),
            lifetime,
            activator: Arc::new(FactoryActivator::<S, D, F> {
                factory,
                marker: PhantomData,
            }),
        }
    }

    /// The service this registration provides.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    /// The implementation constructed for the service.
    #[must_use]
    pub fn implementation(&self) -> ServiceInfo {
        self.implementation
    }

    /// The lifetime of instances created by this registration.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The constructor inputs the implementation declares.
    #[must_use]
    pub fn declared_dependencies(&self) -> Vec<Dependency> {
        self.activator.dependencies()
    }

    pub(crate) fn activate(
        &self,
        dependencies: Resolved,
    ) -> BoxFuture<'static, InjectResult<Instance>> {
        self.activator.activate(dependencies)
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("service", &self.service_info.name())
            .field("implementation", &self.implementation.name())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Create a service from a constant value. The same instance is provided
/// each time the service is requested.
///
/// ## Example
///
/// ```
/// use scoped_injector::{constant, Injector, Svc};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut builder = Injector::builder();
/// builder.provide(constant(8i32));
///
/// let injector = builder.build();
/// let value: Svc<i32> = injector.resolve().await.unwrap();
///
/// assert_eq!(8, *value);
/// # }
/// ```
#[must_use]
pub fn constant<T: Service>(value: T) -> Registration {
    Registration::instance(Svc::new(value))
}

struct InjectableActivator<S: ?Sized, I> {
    marker: PhantomData<fn(I) -> Svc<S>>,
}

impl<S, I> Activator for InjectableActivator<S, I>
where
    S: ?Sized + InterfaceFor<I>,
    I: Injectable,
{
    fn dependencies(&self) -> Vec<Dependency> {
        I::dependencies()
    }

    fn activate(
        &self,
        dependencies: Resolved,
    ) -> BoxFuture<'static, InjectResult<Instance>> {
        async move {
            let implementation = Svc::new(I::construct(dependencies).await?);
            let teardown = I::teardown(implementation.clone());
            Ok(Instance::new(S::from_svc(implementation), teardown))
        }
        .boxed()
    }
}

struct FactoryActivator<S: ?Sized, D, F> {
    factory: F,
    marker: PhantomData<fn(D) -> Svc<S>>,
}

impl<S, D, F> Activator for FactoryActivator<S, D, F>
where
    S: ?Sized + InterfaceFor<F::Result>,
    D: 'static,
    F: ServiceFactory<D>,
{
    fn dependencies(&self) -> Vec<Dependency> {
        self.factory.dependencies()
    }

    fn activate(
        &self,
        mut dependencies: Resolved,
    ) -> BoxFuture<'static, InjectResult<Instance>> {
        let result = self.factory.invoke(&mut dependencies).map(|service| {
            Instance::new(S::from_svc(Svc::new(service)), None)
        });
        future::ready(result).boxed()
    }
}

struct InstanceActivator {
    instance: Instance,
}

impl Activator for InstanceActivator {
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    fn activate(
        &self,
        _dependencies: Resolved,
    ) -> BoxFuture<'static, InjectResult<Instance>> {
        future::ready(Ok(self.instance.clone())).boxed()
    }
}
