use crate::{
    DependencyIntrospector, Injectable, Injector, InterfaceFor, Lifetime,
    Module, Registration,
};
use std::sync::Arc;

/// A builder for an [`Injector`].
#[derive(Default)]
pub struct InjectorBuilder {
    registrations: Vec<Registration>,
    introspector: Option<Arc<dyn DependencyIntrospector>>,
}

impl InjectorBuilder {
    /// Adds a registration to the injector. If a service is registered more
    /// than once, the last registration wins.
    pub fn provide(&mut self, registration: impl Into<Registration>) {
        self.registrations.push(registration.into());
    }

    /// Registers `I` as the implementation of the service `S`.
    pub fn register<S, I>(&mut self, lifetime: Lifetime)
    where
        S: ?Sized + InterfaceFor<I>,
        I: Injectable,
    {
        self.provide(Registration::new::<S, I>(lifetime));
    }

    /// Registers `I` as its own implementation.
    pub fn register_self<I: Injectable>(&mut self, lifetime: Lifetime) {
        self.provide(Registration::of::<I>(lifetime));
    }

    /// Replaces how the injector determines the constructor inputs of each
    /// implementation. By default, the dependencies each registration
    /// declares are used.
    pub fn with_introspector(
        &mut self,
        introspector: impl DependencyIntrospector + 'static,
    ) {
        self.introspector = Some(Arc::new(introspector));
    }

    /// Adds all the registrations in a module.
    pub fn add_module(&mut self, module: Module) {
        self.registrations.extend(module.registrations);
    }

    /// Builds the injector.
    #[must_use]
    pub fn build(self) -> Injector {
        let injector = Injector::with_introspector(self.introspector);
        for registration in self.registrations {
            injector.provide(registration);
        }

        injector
    }
}
