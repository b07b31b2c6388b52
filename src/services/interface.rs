use crate::{Service, Svc};

/// Marker trait that indicates that a type is an interface for another type.
///
/// Each sized service is an interface for itself, and each `dyn Trait` is an
/// interface for the types that implement it. This trait should usually be
/// implemented by the [`interface!`] macro, and is primarily used to enforce
/// stronger type checking when registering implementations for interfaces.
pub trait InterfaceFor<T>: Service
where
    T: Service,
{
    #[doc(hidden)]
    fn from_svc(service: Svc<T>) -> Svc<Self>;
}

impl<T: Service> InterfaceFor<T> for T {
    fn from_svc(service: Svc<T>) -> Svc<Self> {
        service
    }
}

/// Marks a trait as being an interface for the types that implement it. This
/// means that a request for the trait object can resolve to whichever
/// implementation was registered for it.
///
/// The trait must be a subtrait of [`Send`] and [`Sync`] (or of
/// [`Service`](crate::Service)).
///
/// ## Example
///
/// ```
/// use scoped_injector::{interface, Service};
///
/// struct Bar;
/// #[cfg(test)]
/// struct MockBar;
///
/// trait Foo: Service {}
/// impl Foo for Bar {}
/// #[cfg(test)]
/// impl Foo for MockBar {}
///
/// // Requests for `dyn Foo` can resolve to either `Bar` or, in a test run,
/// // `MockBar`, depending on which one is registered.
/// interface!(Foo);
/// ```
#[macro_export]
macro_rules! interface {
    ($interface:tt) => {
        impl<T: $interface + $crate::Service> $crate::InterfaceFor<T>
            for dyn $interface
        {
            fn from_svc(service: $crate::Svc<T>) -> $crate::Svc<Self> {
                service
            }
        }
    };
}
