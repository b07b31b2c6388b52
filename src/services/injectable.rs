use crate::{Dependency, InjectResult, Resolved, Service, Svc, Teardown};
use async_trait::async_trait;

/// A service which declares its own constructor inputs and can be built from
/// them.
///
/// ## Example
///
/// ```
/// use scoped_injector::{
///     async_trait, Dependency, InjectResult, Injectable, Injector, Lifetime,
///     Resolved, Svc,
/// };
///
/// struct Config {
///     url: String,
/// }
///
/// #[async_trait]
/// impl Injectable for Config {
///     fn dependencies() -> Vec<Dependency> {
///         Vec::new()
///     }
///
///     async fn construct(_dependencies: Resolved) -> InjectResult<Self> {
///         Ok(Config { url: "postgres://localhost".to_owned() })
///     }
/// }
///
/// struct Database {
///     config: Svc<Config>,
/// }
///
/// #[async_trait]
/// impl Injectable for Database {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::of::<Config>("config")]
///     }
///
///     async fn construct(dependencies: Resolved) -> InjectResult<Self> {
///         Ok(Database { config: dependencies.get("config")? })
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut builder = Injector::builder();
/// builder.register_self::<Config>(Lifetime::Singleton);
/// builder.register_self::<Database>(Lifetime::Singleton);
///
/// let injector = builder.build();
/// let database: Svc<Database> = injector.resolve().await.unwrap();
/// assert_eq!("postgres://localhost", database.config.url);
/// # }
/// ```
#[async_trait]
pub trait Injectable: Service + Sized {
    /// The ordered constructor inputs of this service.
    fn dependencies() -> Vec<Dependency>;

    /// Creates an instance of this service from its resolved dependencies.
    async fn construct(dependencies: Resolved) -> InjectResult<Self>;

    /// Exposes the teardown capability of a constructed instance, if it has
    /// one. Cached instances that return a handle here are closed when their
    /// scope ends.
    fn teardown(service: Svc<Self>) -> Option<Svc<dyn Teardown>> {
        drop(service);
        None
    }
}
