use crate::{Dependency, InjectError, InjectResult, ServiceInfo};
use parking_lot::RwLock;
use std::{collections::HashMap, fmt::Debug};

/// Determines what must be supplied to construct an implementation.
///
/// The injector asks its introspector for the constructor inputs of each
/// implementation before resolving them, so how those inputs are declared is
/// independent of how they are resolved. By default, [`DeclaredIntrospector`]
/// is used, which answers from the declarations made when implementations are
/// registered. Closures can also be used as introspectors:
///
/// ```
/// use scoped_injector::{
///     Dependency, DependencyIntrospector, InjectError, InjectResult,
///     ServiceInfo,
/// };
///
/// let introspector = |implementation: ServiceInfo| -> InjectResult<Vec<Dependency>> {
///     Err(InjectError::Introspection {
///         implementation,
///         reason: "no constructor metadata available".to_owned(),
///     })
/// };
///
/// assert!(introspector.introspect(ServiceInfo::of::<u8>()).is_err());
/// ```
pub trait DependencyIntrospector: Send + Sync {
    /// Gets the ordered constructor inputs of an implementation.
    fn introspect(
        &self,
        implementation: ServiceInfo,
    ) -> InjectResult<Vec<Dependency>>;
}

impl<F> DependencyIntrospector for F
where
    F: Fn(ServiceInfo) -> InjectResult<Vec<Dependency>> + Send + Sync,
{
    fn introspect(
        &self,
        implementation: ServiceInfo,
    ) -> InjectResult<Vec<Dependency>> {
        self(implementation)
    }
}

/// Answers introspection requests from the dependencies each implementation
/// declared when it was registered.
#[derive(Debug, Default)]
pub struct DeclaredIntrospector {
    declarations: RwLock<HashMap<ServiceInfo, Vec<Dependency>>>,
}

impl DeclaredIntrospector {
    /// Creates an introspector with no declarations.
    #[must_use]
    pub fn new() -> Self {
        DeclaredIntrospector::default()
    }

    /// Declares the constructor inputs of an implementation, replacing any
    /// previous declaration for it.
    pub fn declare(
        &self,
        implementation: ServiceInfo,
        dependencies: Vec<Dependency>,
    ) -> Option<Vec<Dependency>> {
        self.declarations.write().insert(implementation, dependencies)
    }
}

impl DependencyIntrospector for DeclaredIntrospector {
    fn introspect(
        &self,
        implementation: ServiceInfo,
    ) -> InjectResult<Vec<Dependency>> {
        self.declarations
            .read()
            .get(&implementation)
            .cloned()
            .ok_or_else(|| InjectError::Introspection {
                implementation,
                reason: "no constructor has been declared".to_owned(),
            })
    }
}
