use crate::{
    instance::Instance, InjectError, InjectResult, RequestInfo, Service,
    ServiceInfo, Svc,
};
use std::fmt::{Debug, Formatter};

/// A single constructor input: the parameter name and the service it must be
/// supplied with.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Dependency {
    name: &'static str,
    service_info: ServiceInfo,
}

impl Dependency {
    /// Creates a dependency on an arbitrary service.
    #[must_use]
    pub fn new(name: &'static str, service_info: ServiceInfo) -> Self {
        Dependency { name, service_info }
    }

    /// Creates a dependency on the service `S`.
    #[must_use]
    pub fn of<S: ?Sized + Service>(name: &'static str) -> Self {
        Dependency::new(name, ServiceInfo::of::<S>())
    }

    /// The parameter name of this dependency.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The service this dependency requires.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }
}

/// The resolved dependencies of a service, in the order they were declared.
/// This is handed to the service's constructor.
///
/// Dependencies can be read by name with [`Resolved::get`] or in declaration
/// order with [`Resolved::next`].
pub struct Resolved {
    service_info: ServiceInfo,
    request_info: RequestInfo,
    entries: Vec<(Dependency, Instance)>,
    cursor: usize,
}

impl Resolved {
    pub(crate) fn new(
        service_info: ServiceInfo,
        request_info: RequestInfo,
        entries: Vec<(Dependency, Instance)>,
    ) -> Self {
        Resolved {
            service_info,
            request_info,
            entries,
            cursor: 0,
        }
    }

    /// Gets the dependency with the given parameter name.
    pub fn get<S: ?Sized + Service>(&self, name: &str) -> InjectResult<Svc<S>> {
        self.entries
            .iter()
            .find(|(dependency, _)| dependency.name() == name)
            .ok_or_else(|| InjectError::UndeclaredDependency {
                service_info: self.service_info,
                name: name.to_owned(),
            })
            .and_then(|(_, instance)| instance.downcast())
    }

    /// Gets the next dependency in declaration order.
    #[allow(clippy::should_implement_trait)]
    pub fn next<S: ?Sized + Service>(&mut self) -> InjectResult<Svc<S>> {
        let (_, instance) = self.entries.get(self.cursor).ok_or_else(|| {
            InjectError::UndeclaredDependency {
                service_info: self.service_info,
                name: format!("#{}", self.cursor),
            }
        })?;

        let service = instance.downcast()?;
        self.cursor += 1;
        Ok(service)
    }

    /// The service being constructed.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    /// The request this construction is part of.
    #[must_use]
    pub fn request_info(&self) -> &RequestInfo {
        &self.request_info
    }

    /// The number of resolved dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the service has no dependencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for Resolved {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("service_info", &self.service_info)
            .field(
                "dependencies",
                &self.entries.iter().map(|(d, _)| d).collect::<Vec<_>>(),
            )
            .finish()
    }
}
