//! Runtime dependency injection with scoped lifetimes.
//!
//! An [`Injector`] builds object graphs on demand. Each service is
//! registered with an implementation and a [`Lifetime`], and nothing is
//! constructed until it is first requested. The dependencies of each
//! implementation are discovered while resolving, so there is no central
//! description of the whole graph.
//!
//! # Service lifetimes
//!
//! - Singleton: A service is created only the first time it is requested and
//!   that single instance is reused for each future request.
//! - Scoped: A service is created once per [`Scope`]. A scope is a logical
//!   context such as one inbound request. Scoped instances are never shared
//!   between scopes, even when scopes run at the same time on the same
//!   worker threads.
//! - Transient: A service is created each time it is requested.
//!
//! When a scope ends, every scoped service it created that exposes a
//! [`Teardown`] handle is closed. Requests that would form a dependency
//! cycle fail with [`InjectError::CycleDetected`], which carries the full
//! cycle path.
//!
//! # Interfaces
//!
//! Services can request their dependencies as trait objects without caring
//! how those dependencies are implemented. The [`interface!`] macro marks a
//! trait as an interface, and the implementation is chosen when registering.
//!
//! # Testing
//!
//! [`Injector::override_service`] replaces any service, including services
//! requested as nested dependencies, with a pre-built instance. Use
//! [`Injector::reset_overrides`] between tests.
//!
//! # Example
//!
//! ```
//! use scoped_injector::{
//!     interface, Injector, IntoScoped, IntoSingleton, IntoTransient, Service,
//!     Svc,
//! };
//!
//! // The storage layer's engine is shared by the whole process.
//! trait Engine: Service {
//!     fn url(&self) -> &str;
//! }
//! interface!(Engine);
//!
//! #[derive(Default)]
//! struct MemoryEngine;
//! impl Engine for MemoryEngine {
//!     fn url(&self) -> &str {
//!         "memory://"
//!     }
//! }
//!
//! // Each request gets its own session.
//! struct Session {
//!     engine: Svc<dyn Engine>,
//! }
//!
//! impl Session {
//!     fn new(engine: Svc<dyn Engine>) -> Self {
//!         Session { engine }
//!     }
//! }
//!
//! // Repositories are cheap, so a new one is created for every request.
//! struct UserRepository(Svc<Session>);
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut builder = Injector::builder();
//! builder.provide(MemoryEngine::default.singleton().with_interface::<dyn Engine>());
//! builder.provide(Session::new.scoped());
//! builder.provide(UserRepository.transient());
//! let injector = builder.build();
//!
//! // A scope is started for each request and ended once it completes
//! let scope = injector.begin_scope();
//! let first: Svc<UserRepository> = scope.resolve().await.unwrap();
//! let second: Svc<UserRepository> = scope.resolve().await.unwrap();
//!
//! assert!(!Svc::ptr_eq(&first, &second));
//! assert!(Svc::ptr_eq(&first.0, &second.0));
//! assert_eq!("memory://", first.0.engine.url());
//!
//! scope.end().await.unwrap();
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::needless_doctest_main
)]

mod builder;
mod cache;
mod injector;
mod instance;
mod lifecycle;
mod module;
mod registry;
mod requests;
mod scope;
mod services;

pub use builder::*;
pub use injector::Injector;
pub use lifecycle::{Teardown, TeardownError, TeardownFailure, TeardownResult};
pub use module::*;
pub use requests::*;
pub use scope::Scope;
pub use services::*;

/// Re-exported so [`Teardown`] and [`Injectable`] can be implemented without
/// depending on `async-trait` directly.
pub use async_trait::async_trait;

#[cfg(test)]
mod tests;
