use crate::{
    Dependency, InjectResult, InterfaceFor, Lifetime, Registration, Resolved,
    Service, Svc,
};
use std::marker::PhantomData;

/// A factory for creating instances of a service. All functions of arity 12 or
/// less are automatically service factories if the arguments to that function
/// are service pointers and the return value is a valid service type. The
/// declared dependencies of a factory are its parameter types, in order.
///
/// ## Type parameters
/// * `D` - Tuple of this service's dependencies.
///
/// ## Example
///
/// ```
/// use scoped_injector::{ServiceFactory, ServiceInfo, Svc};
///
/// struct Foo;
/// struct Bar(Svc<Foo>);
///
/// fn factory(foo: Svc<Foo>) -> Bar {
///     Bar(foo)
/// }
///
/// let dependencies = factory.dependencies();
/// assert_eq!(1, dependencies.len());
/// assert_eq!(ServiceInfo::of::<Foo>(), dependencies[0].service_info());
/// ```
pub trait ServiceFactory<D>: Send + Sync + 'static {
    /// The resulting service from invoking this service factory.
    type Result: Service;

    /// The constructor inputs of this factory, in parameter order.
    fn dependencies(&self) -> Vec<Dependency>;

    /// Invokes this service factory, creating an instance of the service.
    fn invoke(&self, dependencies: &mut Resolved) -> InjectResult<Self::Result>;
}

macro_rules! impl_provider_function {
    () => {
        impl_provider_function!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_provider_function!(@impl ($first $(, $rest)*));
        impl_provider_function!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        impl<F, R $(, $type_name)*> ServiceFactory<($(Svc<$type_name>,)*)> for F
        where
            F: Fn($(Svc<$type_name>),*) -> R + Send + Sync + 'static,
            R: Service,
            $($type_name: ?Sized + Service,)*
        {
            type Result = R;

            fn dependencies(&self) -> Vec<Dependency> {
                vec![$(Dependency::of::<$type_name>(std::any::type_name::<$type_name>())),*]
            }

            #[allow(unused_variables)]
            fn invoke(&self, dependencies: &mut Resolved) -> InjectResult<R> {
                Ok(self($(dependencies.next::<$type_name>()?),*))
            }
        }
    };
}

impl_provider_function!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);

/// A service factory paired with the lifetime of the instances it creates.
/// This converts into a [`Registration`] for the factory's result type, or
/// for an interface of it via [`FactoryProvider::with_interface`].
pub struct FactoryProvider<D, F>
where
    F: ServiceFactory<D>,
{
    factory: F,
    lifetime: Lifetime,
    marker: PhantomData<fn(D)>,
}

impl<D, F> FactoryProvider<D, F>
where
    D: 'static,
    F: ServiceFactory<D>,
{
    /// Creates a new [`FactoryProvider`] using a service factory.
    #[must_use]
    pub fn new(factory: F, lifetime: Lifetime) -> Self {
        FactoryProvider {
            factory,
            lifetime,
            marker: PhantomData,
        }
    }

    /// The lifetime of the instances this provider creates.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Registers the factory's result as the implementation of an interface.
    ///
    /// ## Example
    ///
    /// ```
    /// use scoped_injector::{interface, Injector, IntoSingleton, Service, Svc};
    ///
    /// trait Greeter: Service {
    ///     fn greet(&self) -> String;
    /// }
    /// interface!(Greeter);
    ///
    /// #[derive(Default)]
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String {
    ///         "hello".to_owned()
    ///     }
    /// }
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut builder = Injector::builder();
    /// builder.provide(English::default.singleton().with_interface::<dyn Greeter>());
    ///
    /// let injector = builder.build();
    /// let greeter: Svc<dyn Greeter> = injector.resolve().await.unwrap();
    /// assert_eq!("hello", greeter.greet());
    /// # }
    /// ```
    #[must_use]
    pub fn with_interface<I>(self) -> Registration
    where
        I: ?Sized + InterfaceFor<F::Result>,
    {
        Registration::from_factory::<I, D, F>(self.factory, self.lifetime)
    }
}

impl<D, F> From<FactoryProvider<D, F>> for Registration
where
    D: 'static,
    F: ServiceFactory<D>,
{
    fn from(provider: FactoryProvider<D, F>) -> Self {
        provider.with_interface::<F::Result>()
    }
}

/// Defines a conversion into a singleton provider. This trait is automatically
/// implemented for all service factories.
pub trait IntoSingleton<D, F>
where
    F: ServiceFactory<D>,
{
    /// Creates a singleton provider. Singleton providers create their values
    /// only once (when first requested) and reuse that value for each future
    /// request.
    ///
    /// ## Example
    ///
    /// ```
    /// use scoped_injector::{Injector, IntoSingleton, Svc};
    ///
    /// #[derive(Default)]
    /// struct Foo;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut builder = Injector::builder();
    /// builder.provide(Foo::default.singleton());
    ///
    /// let injector = builder.build();
    /// let foo1: Svc<Foo> = injector.resolve().await.unwrap();
    /// let foo2: Svc<Foo> = injector.resolve().await.unwrap();
    ///
    /// assert!(Svc::ptr_eq(&foo1, &foo2));
    /// # }
    /// ```
    #[must_use]
    fn singleton(self) -> FactoryProvider<D, F>;
}

impl<D, F> IntoSingleton<D, F> for F
where
    D: 'static,
    F: ServiceFactory<D>,
{
    fn singleton(self) -> FactoryProvider<D, F> {
        FactoryProvider::new(self, Lifetime::Singleton)
    }
}

/// Defines a conversion into a scoped provider. This trait is automatically
/// implemented for all service factories.
pub trait IntoScoped<D, F>
where
    F: ServiceFactory<D>,
{
    /// Creates a scoped provider. Scoped providers create one value per
    /// [`Scope`](crate::Scope) and can only be requested through a scope.
    ///
    /// ## Example
    ///
    /// ```
    /// use scoped_injector::{Injector, IntoScoped, Svc};
    ///
    /// #[derive(Default)]
    /// struct Session;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut builder = Injector::builder();
    /// builder.provide(Session::default.scoped());
    ///
    /// let injector = builder.build();
    /// let scope = injector.begin_scope();
    /// let session1: Svc<Session> = scope.resolve().await.unwrap();
    /// let session2: Svc<Session> = scope.resolve().await.unwrap();
    /// assert!(Svc::ptr_eq(&session1, &session2));
    ///
    /// let other: Svc<Session> = injector.begin_scope().resolve().await.unwrap();
    /// assert!(!Svc::ptr_eq(&session1, &other));
    /// # }
    /// ```
    #[must_use]
    fn scoped(self) -> FactoryProvider<D, F>;
}

impl<D, F> IntoScoped<D, F> for F
where
    D: 'static,
    F: ServiceFactory<D>,
{
    fn scoped(self) -> FactoryProvider<D, F> {
        FactoryProvider::new(self, Lifetime::Scoped)
    }
}

/// Defines a conversion into a transient provider. This trait is automatically
/// implemented for all service factories.
pub trait IntoTransient<D, F>
where
    F: ServiceFactory<D>,
{
    /// Creates a transient provider. Transient providers create their values
    /// each time the service is requested and will never return service
    /// pointers to the same instance more than once.
    ///
    /// ## Example
    ///
    /// ```
    /// use scoped_injector::{Injector, IntoTransient, Svc};
    ///
    /// #[derive(Default)]
    /// struct Foo;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut builder = Injector::builder();
    /// builder.provide(Foo::default.transient());
    ///
    /// let injector = builder.build();
    /// let foo1: Svc<Foo> = injector.resolve().await.unwrap();
    /// let foo2: Svc<Foo> = injector.resolve().await.unwrap();
    ///
    /// assert!(!Svc::ptr_eq(&foo1, &foo2));
    /// # }
    /// ```
    #[must_use]
    fn transient(self) -> FactoryProvider<D, F>;
}

impl<D, F> IntoTransient<D, F> for F
where
    D: 'static,
    F: ServiceFactory<D>,
{
    fn transient(self) -> FactoryProvider<D, F> {
        FactoryProvider::new(self, Lifetime::Transient)
    }
}
