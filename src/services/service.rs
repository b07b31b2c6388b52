use derive_more::Display;
use std::{
    any::{Any, TypeId},
    error::Error,
};

/// A reference-counted pointer holding a service. Services are shared across
/// logical contexts and threads, so this is always an [`Arc<T>`](std::sync::Arc).
pub type Svc<T> = std::sync::Arc<T>;

/// A result from attempting to inject dependencies into a service and
/// construct an instance of it.
pub type InjectResult<T> = Result<T, InjectError>;

/// Implemented automatically on types that are capable of being a service.
pub trait Service: Any + Send + Sync {}
impl<T: ?Sized + Any + Send + Sync> Service for T {}

/// Type information about a service. This is the key every registration,
/// override and cached instance is stored under.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct ServiceInfo {
    id: TypeId,
    name: &'static str,
}

impl ServiceInfo {
    /// Creates a [`ServiceInfo`] for the given type.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        ServiceInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Gets the [`TypeId`] for this service.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Gets the type name of this service.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// An error that has occurred during creation of a service.
#[derive(Debug, Display)]
#[non_exhaustive]
pub enum InjectError {
    /// No registration or override exists for the requested service.
    #[display(fmt = "{} has not been registered", "service_info.name()")]
    UnregisteredService {
        /// The service that was requested.
        service_info: ServiceInfo,
    },

    /// A service was requested while it was already being constructed
    /// further up the same resolution chain.
    #[display(
        fmt = "a cycle was detected during activation of {} [{}]",
        "service_info.name()",
        "fmt_cycle(cycle)"
    )]
    CycleDetected {
        /// The service that was requested a second time.
        service_info: ServiceInfo,

        /// The chain of services that were requested, in request order,
        /// ending with the repeated service.
        cycle: Vec<ServiceInfo>,
    },

    /// The constructor inputs of an implementation could not be determined.
    #[display(
        fmt = "could not determine the dependencies of {}: {}",
        "implementation.name()",
        reason
    )]
    Introspection {
        /// The implementation that was inspected.
        implementation: ServiceInfo,

        /// Why the dependencies could not be determined.
        reason: String,
    },

    /// A scoped service was requested without an active scope.
    #[display(
        fmt = "{} is scoped and cannot be resolved outside of a scope",
        "service_info.name()"
    )]
    ScopeRequired {
        /// The scoped service that was requested.
        service_info: ServiceInfo,
    },

    /// A request was made through a scope that has already ended.
    #[display(fmt = "scope {} has already ended", scope)]
    ScopeEnded {
        /// The identifier of the ended scope.
        scope: u64,
    },

    /// A constructor asked for a dependency it did not declare.
    #[display(
        fmt = "{} requested the undeclared dependency '{}'",
        "service_info.name()",
        name
    )]
    UndeclaredDependency {
        /// The service being constructed.
        service_info: ServiceInfo,

        /// The name of the missing dependency.
        name: String,
    },

    /// The registered provider returned the wrong service type.
    #[display(
        fmt = "the registered provider for {} returned the wrong type",
        "service_info.name()"
    )]
    InvalidProvider {
        /// The service that was requested.
        service_info: ServiceInfo,
    },

    /// An error occurred during activation of a service.
    #[display(
        fmt = "an error occurred during activation of {}",
        "service_info.name()"
    )]
    ActivationFailed {
        /// The service that was requested.
        service_info: ServiceInfo,

        /// The error that was returned during service construction.
        inner: Box<dyn Error + Send + Sync + 'static>,
    },
}

impl InjectError {
    /// Wraps an error returned by a service constructor.
    pub fn activation_failed<S, E>(error: E) -> Self
    where
        S: ?Sized + Service,
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        InjectError::ActivationFailed {
            service_info: ServiceInfo::of::<S>(),
            inner: error.into(),
        }
    }
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InjectError::ActivationFailed { inner, .. } => Some(inner.as_ref()),
            _ => None,
        }
    }
}

fn fmt_cycle(cycle: &[ServiceInfo]) -> String {
    let mut joined = String::new();
    for item in cycle {
        if !joined.is_empty() {
            joined.push_str(" -> ");
        }
        joined.push_str(item.name());
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Foo;
    struct Bar;

    #[test]
    fn cycle_is_displayed_in_request_order() {
        let error = InjectError::CycleDetected {
            service_info: ServiceInfo::of::<Foo>(),
            cycle: vec![
                ServiceInfo::of::<Foo>(),
                ServiceInfo::of::<Bar>(),
                ServiceInfo::of::<Foo>(),
            ],
        };

        let foo = ServiceInfo::of::<Foo>().name();
        let bar = ServiceInfo::of::<Bar>().name();
        let expected = format!("{foo} -> {bar} -> {foo}");
        assert!(error.to_string().contains(&expected));
    }

    #[test]
    fn activation_failure_exposes_source() {
        let error = InjectError::activation_failed::<Foo, _>("disk full");
        assert_eq!("disk full", error.source().unwrap().to_string());
    }
}
