use crate::{
    instance::Instance, InjectError, InjectResult, Registration, ServiceInfo,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Stores the registration for each service. Only one registration exists
/// per service; registering a service again replaces the previous one.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: RwLock<HashMap<ServiceInfo, Registration>>,
}

impl Registry {
    /// Stores a registration, returning the one it replaced.
    pub fn insert(&self, registration: Registration) -> Option<Registration> {
        self.registrations
            .write()
            .insert(registration.service_info(), registration)
    }

    pub fn lookup(&self, service_info: ServiceInfo) -> InjectResult<Registration> {
        self.registrations
            .read()
            .get(&service_info)
            .cloned()
            .ok_or(InjectError::UnregisteredService { service_info })
    }

    pub fn contains(&self, service_info: ServiceInfo) -> bool {
        self.registrations.read().contains_key(&service_info)
    }
}

/// Pre-built instances that replace normal resolution of a service. Used to
/// substitute test doubles.
#[derive(Debug, Default)]
pub(crate) struct OverrideStore {
    overrides: RwLock<HashMap<ServiceInfo, Instance>>,
}

impl OverrideStore {
    pub fn insert(&self, instance: Instance) {
        self.overrides
            .write()
            .insert(instance.service_info(), instance);
    }

    pub fn get(&self, service_info: ServiceInfo) -> Option<Instance> {
        self.overrides.read().get(&service_info).cloned()
    }

    pub fn clear(&self) {
        self.overrides.write().clear();
    }
}
