use crate::{InjectError, InjectResult, Service, ServiceInfo, Svc, Teardown};
use std::{
    any::Any,
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// A type-erased, constructed service. The erased value is always the
/// `Svc<S>` of the service it was created for, so downcasting back to that
/// pointer type is the only way to read it.
#[derive(Clone)]
pub(crate) struct Instance {
    service_info: ServiceInfo,
    value: Arc<dyn Any + Send + Sync>,
    teardown: Option<Svc<dyn Teardown>>,
}

impl Instance {
    pub fn new<S>(service: Svc<S>, teardown: Option<Svc<dyn Teardown>>) -> Self
    where
        S: ?Sized + Service,
    {
        Instance {
            service_info: ServiceInfo::of::<S>(),
            value: Arc::new(service),
            teardown,
        }
    }

    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    pub fn teardown(&self) -> Option<&Svc<dyn Teardown>> {
        self.teardown.as_ref()
    }

    pub fn downcast<S>(&self) -> InjectResult<Svc<S>>
    where
        S: ?Sized + Service,
    {
        self.value.downcast_ref::<Svc<S>>().cloned().ok_or(
            InjectError::InvalidProvider {
                service_info: ServiceInfo::of::<S>(),
            },
        )
    }

    /// Whether both instances point to the same service value.
    #[cfg(test)]
    pub fn same_as(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("service_info", &self.service_info)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}
