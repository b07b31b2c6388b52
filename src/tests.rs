use crate::{
    async_trait, constant, define_module, interface, Dependency, InjectError,
    InjectResult, Injectable, Injector, InjectorBuilder, IntoScoped,
    IntoSingleton, IntoTransient, Lifetime, Registration, Resolved, Service,
    ServiceInfo, Svc, Teardown, TeardownResult,
};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tracing_test::traced_test;

/// Counts how many times each kind of service is constructed.
#[derive(Default)]
struct Constructions {
    databases: AtomicUsize,
    sessions: AtomicUsize,
}

struct Database;

#[async_trait]
impl Injectable for Database {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Constructions>("constructions")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        let constructions: Svc<Constructions> =
            dependencies.get("constructions")?;
        constructions.databases.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Database)
    }
}

struct Session {
    database: Svc<Database>,
    closed: AtomicUsize,
}

#[async_trait]
impl Injectable for Session {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::of::<Database>("database"),
            Dependency::of::<Constructions>("constructions"),
        ]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        let constructions: Svc<Constructions> =
            dependencies.get("constructions")?;
        constructions.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            database: dependencies.get("database")?,
            closed: AtomicUsize::new(0),
        })
    }

    fn teardown(service: Svc<Self>) -> Option<Svc<dyn Teardown>> {
        Some(service)
    }
}

#[async_trait]
impl Teardown for Session {
    async fn close(&self) -> TeardownResult {
        tokio::task::yield_now().await;
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Repository {
    session: Svc<Session>,
}

#[async_trait]
impl Injectable for Repository {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Session>("session")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        Ok(Repository {
            session: dependencies.get("session")?,
        })
    }
}

fn storage_injector_builder() -> InjectorBuilder {
    let mut builder = Injector::builder();
    builder.provide(constant(Constructions::default()));
    builder.register_self::<Database>(Lifetime::Singleton);
    builder.register_self::<Session>(Lifetime::Scoped);
    builder.register_self::<Repository>(Lifetime::Transient);
    builder
}

fn storage_injector() -> Injector {
    storage_injector_builder().build()
}

#[tokio::test]
async fn repository_graph_shares_session_and_database() {
    let injector = storage_injector();

    let scope = injector.begin_scope();
    let first: Svc<Repository> = scope.resolve().await.unwrap();
    let second: Svc<Repository> = scope.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&first, &second));
    assert!(Svc::ptr_eq(&first.session, &second.session));
    assert!(Svc::ptr_eq(&first.session.database, &second.session.database));

    let other_scope = injector.begin_scope();
    let third: Svc<Repository> = other_scope.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&first.session, &third.session));
    assert!(Svc::ptr_eq(&first.session.database, &third.session.database));

    let constructions: Svc<Constructions> = injector.resolve().await.unwrap();
    assert_eq!(1, constructions.databases.load(Ordering::SeqCst));
    assert_eq!(2, constructions.sessions.load(Ordering::SeqCst));

    scope.end().await.unwrap();
    other_scope.end().await.unwrap();
}

#[tokio::test]
async fn ending_scope_tears_down_once() {
    let injector = storage_injector();

    let scope = injector.begin_scope();
    let repository: Svc<Repository> = scope.resolve().await.unwrap();
    let session = repository.session.clone();
    scope.end().await.unwrap();

    assert_eq!(1, session.closed.load(Ordering::SeqCst));

    // The singleton database is not owned by the scope
    let database: Svc<Database> = injector.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&session.database, &database));

    let next_scope = injector.begin_scope();
    let next: Svc<Session> = next_scope.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&session, &next));
    next_scope.end().await.unwrap();

    assert_eq!(1, session.closed.load(Ordering::SeqCst));
    assert_eq!(1, next.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_tears_down_singletons() {
    let mut builder = Injector::builder();
    builder.provide(constant(Constructions::default()));
    builder.register_self::<Database>(Lifetime::Singleton);
    builder.register_self::<Session>(Lifetime::Singleton);
    let injector = builder.build();

    let session: Svc<Session> = injector.resolve().await.unwrap();
    injector.shutdown().await.unwrap();
    assert_eq!(1, session.closed.load(Ordering::SeqCst));

    // The cache was emptied, so the next request constructs a new session
    let next: Svc<Session> = injector.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&session, &next));
}

#[tokio::test]
async fn scoped_dependency_of_singleton_is_rejected() {
    let mut builder = Injector::builder();
    builder.provide(constant(Constructions::default()));
    builder.register_self::<Database>(Lifetime::Singleton);
    builder.register_self::<Session>(Lifetime::Scoped);
    builder.register_self::<Repository>(Lifetime::Singleton);
    let injector = builder.build();

    let scope = injector.begin_scope();
    match scope.resolve::<Repository>().await {
        Err(InjectError::ScopeRequired { service_info }) => {
            assert_eq!(ServiceInfo::of::<Session>(), service_info);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

mod cycles {
    use super::*;

    pub struct A(pub Svc<B>);
    pub struct B(pub Svc<A>);

    pub struct X(pub Svc<Y>);
    pub struct Y(pub Svc<Z>);
    pub struct Z(pub Svc<X>);

    #[tokio::test]
    async fn two_service_cycle_reports_path() {
        let mut builder = Injector::builder();
        builder.provide(A.singleton());
        builder.provide(B.singleton());
        let injector = builder.build();

        match injector.resolve::<A>().await {
            Err(InjectError::CycleDetected {
                service_info,
                cycle,
            }) => {
                assert_eq!(ServiceInfo::of::<A>(), service_info);
                assert_eq!(
                    vec![
                        ServiceInfo::of::<A>(),
                        ServiceInfo::of::<B>(),
                        ServiceInfo::of::<A>(),
                    ],
                    cycle
                );
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        // Nothing in the cycle was cached, so requests keep failing the same way
        assert!(matches!(
            injector.resolve::<B>().await,
            Err(InjectError::CycleDetected { .. })
        ));
    }

    #[tokio::test]
    async fn cycle_through_transient_is_detected() {
        let mut builder = Injector::builder();
        builder.provide(X.singleton());
        builder.provide(Y.transient());
        builder.provide(Z.scoped());
        let injector = builder.build();

        let scope = injector.begin_scope();
        let error = scope.resolve::<Y>().await.map(|_| ()).unwrap_err();
        assert!(error.to_string().contains(" -> "));
        match error {
            InjectError::CycleDetected { cycle, .. } => {
                assert_eq!(
                    vec![
                        ServiceInfo::of::<Y>(),
                        ServiceInfo::of::<Z>(),
                        ServiceInfo::of::<X>(),
                        ServiceInfo::of::<Y>(),
                    ],
                    cycle
                );
            }
            error => panic!("unexpected error: {error}"),
        }
    }

    /// Holds up whoever constructs it, so both halves of a cycle can be
    /// under construction at the same time.
    pub struct Gate;

    #[async_trait]
    impl Injectable for Gate {
        fn dependencies() -> Vec<Dependency> {
            Vec::new()
        }

        async fn construct(_dependencies: Resolved) -> InjectResult<Self> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Gate)
        }
    }

    pub struct Left(pub Svc<Gate>, pub Svc<Right>);
    pub struct Right(pub Svc<Gate>, pub Svc<Left>);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_requests_of_a_cycle_fail_instead_of_waiting() {
        let mut builder = Injector::builder();
        builder.register_self::<Gate>(Lifetime::Transient);
        builder.provide(Left.singleton());
        builder.provide(Right.singleton());
        let injector = builder.build();

        let left = {
            let injector = injector.clone();
            tokio::spawn(async move {
                injector.resolve::<Left>().await.map(|_| ())
            })
        };
        let right = {
            let injector = injector.clone();
            tokio::spawn(async move {
                injector.resolve::<Right>().await.map(|_| ())
            })
        };

        let deadline = Duration::from_secs(5);
        for task in [left, right] {
            let result = tokio::time::timeout(deadline, task)
                .await
                .expect("resolution never finished")
                .unwrap();
            match result {
                Err(InjectError::CycleDetected { cycle, .. }) => {
                    assert!(cycle.len() >= 3);
                    assert_eq!(cycle.first(), cycle.last());
                    assert!(cycle.contains(&ServiceInfo::of::<Left>()));
                    assert!(cycle.contains(&ServiceInfo::of::<Right>()));
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        // Neither cell was left stuck mid-construction
        let later =
            tokio::time::timeout(deadline, injector.resolve::<Left>()).await;
        assert!(matches!(
            later.expect("resolution never finished"),
            Err(InjectError::CycleDetected { .. })
        ));
    }
}

#[tokio::test]
async fn unregistered_service_constructs_nothing() {
    let mut builder = Injector::builder();
    builder.provide(constant(Constructions::default()));
    builder.register_self::<Session>(Lifetime::Scoped);
    builder.register_self::<Repository>(Lifetime::Transient);
    let injector = builder.build();

    let scope = injector.begin_scope();
    match scope.resolve::<Repository>().await {
        Err(InjectError::UnregisteredService { service_info }) => {
            assert_eq!(ServiceInfo::of::<Database>(), service_info);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }

    let constructions: Svc<Constructions> = scope.resolve().await.unwrap();
    assert_eq!(0, constructions.sessions.load(Ordering::SeqCst));
    assert!(scope.try_resolve::<Database>().await.unwrap().is_none());
    assert!(scope.try_resolve::<Session>().await.is_err());
}

#[tokio::test]
async fn overrides_replace_nested_dependencies() {
    let injector = storage_injector();
    let fake = Svc::new(Database);
    injector.override_service(fake.clone());

    let scope = injector.begin_scope();
    let repository: Svc<Repository> = scope.resolve().await.unwrap();
    let database: Svc<Database> = injector.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&fake, &repository.session.database));
    assert!(Svc::ptr_eq(&fake, &database));

    let constructions: Svc<Constructions> = injector.resolve().await.unwrap();
    assert_eq!(0, constructions.databases.load(Ordering::SeqCst));

    injector.reset_overrides();
    let database: Svc<Database> = injector.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&fake, &database));
    assert_eq!(1, constructions.databases.load(Ordering::SeqCst));
}

#[tokio::test]
async fn override_ignores_lifetime() {
    let injector = storage_injector();
    let session = Svc::new(Session {
        database: Svc::new(Database),
        closed: AtomicUsize::new(0),
    });
    injector.override_service(session.clone());

    // Scoped services normally need a scope, but overrides bypass that
    let resolved: Svc<Session> = injector.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&session, &resolved));

    let scope = injector.begin_scope();
    let resolved: Svc<Session> = scope.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&session, &resolved));
    scope.end().await.unwrap();

    // The override is owned by the caller and never torn down
    assert_eq!(0, session.closed.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_share_one_singleton() {
    let injector = storage_injector();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let injector = injector.clone();
            tokio::spawn(async move { injector.resolve::<Database>().await })
        })
        .collect();

    let mut databases = Vec::new();
    for task in tasks {
        databases.push(task.await.unwrap().unwrap());
    }

    assert!(databases.iter().all(|db| Svc::ptr_eq(db, &databases[0])));
    let constructions: Svc<Constructions> = injector.resolve().await.unwrap();
    assert_eq!(1, constructions.databases.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scopes_are_isolated() {
    let injector = storage_injector();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let scope = injector.begin_scope();
            tokio::spawn(async move {
                let first: Svc<Session> = scope.resolve().await.unwrap();
                tokio::task::yield_now().await;
                let second: Svc<Session> = scope.resolve().await.unwrap();
                assert!(Svc::ptr_eq(&first, &second));
                scope.end().await.unwrap();
                first
            })
        })
        .collect();

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }

    for (i, session) in sessions.iter().enumerate() {
        assert_eq!(1, session.closed.load(Ordering::SeqCst));
        for other in &sessions[i + 1..] {
            assert!(!Svc::ptr_eq(session, other));
            assert!(Svc::ptr_eq(&session.database, &other.database));
        }
    }
}

/// Fails the first time it is constructed.
struct Flaky;

#[async_trait]
impl Injectable for Flaky {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<AtomicUsize>("attempts")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        let attempts: Svc<AtomicUsize> = dependencies.get("attempts")?;
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(InjectError::activation_failed::<Flaky, _>(
                "not ready yet",
            ));
        }

        Ok(Flaky)
    }
}

/// Never finishes constructing until its deadline passes.
struct Slow;

#[async_trait]
impl Injectable for Slow {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<AtomicUsize>("attempts")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        let attempts: Svc<AtomicUsize> = dependencies.get("attempts")?;
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        Ok(Slow)
    }
}

#[tokio::test]
async fn failed_construction_is_retried() {
    let mut builder = Injector::builder();
    builder.provide(constant(AtomicUsize::new(0)));
    builder.register_self::<Flaky>(Lifetime::Singleton);
    let injector = builder.build();

    match injector.resolve::<Flaky>().await {
        Err(error @ InjectError::ActivationFailed { .. }) => {
            let source = std::error::Error::source(&error).unwrap();
            assert_eq!("not ready yet", source.to_string());
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }

    let first: Svc<Flaky> = injector.resolve().await.unwrap();
    let second: Svc<Flaky> = injector.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn cancelled_construction_is_not_cached() {
    let mut builder = Injector::builder();
    builder.provide(constant(AtomicUsize::new(0)));
    builder.register_self::<Slow>(Lifetime::Scoped);
    let injector = builder.build();

    let scope = injector.begin_scope();
    let cancelled =
        tokio::time::timeout(Duration::from_millis(10), scope.resolve::<Slow>())
            .await;
    assert!(cancelled.is_err());

    let first: Svc<Slow> = scope.resolve().await.unwrap();
    let second: Svc<Slow> = scope.resolve().await.unwrap();
    assert!(Svc::ptr_eq(&first, &second));

    let attempts: Svc<AtomicUsize> = injector.resolve().await.unwrap();
    assert_eq!(2, attempts.load(Ordering::SeqCst));
}

#[tokio::test]
async fn custom_introspector_decides_dependencies() {
    struct Foo;
    struct Bar(Svc<Foo>);

    let mut builder = Injector::builder();
    builder.with_introspector(
        |_: ServiceInfo| -> InjectResult<Vec<Dependency>> { Ok(Vec::new()) },
    );
    builder.provide((|| Foo).singleton());
    builder.provide(Bar.singleton());
    let injector = builder.build();

    // The factory declares `Foo`, but the introspector says it needs nothing
    match injector.resolve::<Bar>().await {
        Err(InjectError::UndeclaredDependency { service_info, name }) => {
            assert_eq!(ServiceInfo::of::<Bar>(), service_info);
            assert_eq!("#0", name);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn introspection_failure_is_surfaced_unchanged() {
    let mut builder = Injector::builder();
    builder.with_introspector(
        |implementation: ServiceInfo| -> InjectResult<Vec<Dependency>> {
            Err(InjectError::Introspection {
                implementation,
                reason: "constructor is not visible".to_owned(),
            })
        },
    );
    builder.register_self::<Database>(Lifetime::Singleton);
    builder.register_self::<Repository>(Lifetime::Transient);
    let injector = builder.build();

    match injector.resolve::<Database>().await {
        Err(InjectError::Introspection {
            implementation,
            reason,
        }) => {
            assert_eq!(ServiceInfo::of::<Database>(), implementation);
            assert_eq!("constructor is not visible", reason);
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

trait Clock: Service {
    fn now(&self) -> u64;
}
interface!(Clock);

struct FixedClock(Svc<u64>);
impl Clock for FixedClock {
    fn now(&self) -> u64 {
        *self.0
    }
}

struct Audit {
    clock: Svc<dyn Clock>,
}

#[async_trait]
impl Injectable for Audit {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<dyn Clock>("clock")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        Ok(Audit {
            clock: dependencies.get("clock")?,
        })
    }
}

#[tokio::test]
async fn modules_register_interfaces() {
    let module = define_module! {
        services = [
            constant(7_u64),
            Registration::of::<Audit>(Lifetime::Scoped),
        ],
        interfaces = {
            dyn Clock = [FixedClock.singleton()],
        },
    };

    let mut builder = Injector::builder();
    builder.add_module(module);
    let injector = builder.build();
    assert!(injector.is_registered(ServiceInfo::of::<dyn Clock>()));
    assert!(!injector.is_registered(ServiceInfo::of::<FixedClock>()));

    let scope = injector.begin_scope();
    let audit: Svc<Audit> = scope.resolve().await.unwrap();
    let clock: Svc<dyn Clock> = scope.resolve().await.unwrap();
    assert_eq!(7, audit.clock.now());
    assert!(Svc::ptr_eq(&audit.clock, &clock));
}

#[tokio::test]
async fn interface_can_be_registered_on_the_injector() {
    struct SystemClock;
    impl Clock for SystemClock {
        fn now(&self) -> u64 {
            1
        }
    }

    #[async_trait]
    impl Injectable for SystemClock {
        fn dependencies() -> Vec<Dependency> {
            Vec::new()
        }

        async fn construct(_dependencies: Resolved) -> InjectResult<Self> {
            Ok(SystemClock)
        }
    }

    let injector = Injector::new();
    injector.register::<dyn Clock, SystemClock>(Lifetime::Transient);
    injector.register_self::<Audit>(Lifetime::Transient);

    let audit: Svc<Audit> = injector.resolve().await.unwrap();
    assert_eq!(1, audit.clock.now());
}

/// Counts connections that have been closed.
#[derive(Default)]
struct Closes(AtomicUsize);

/// A connection that takes a while to open.
struct Connection {
    closes: Svc<Closes>,
}

#[async_trait]
impl Injectable for Connection {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Closes>("closes")]
    }

    async fn construct(dependencies: Resolved) -> InjectResult<Self> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Connection {
            closes: dependencies.get("closes")?,
        })
    }

    fn teardown(service: Svc<Self>) -> Option<Svc<dyn Teardown>> {
        Some(service)
    }
}

#[async_trait]
impl Teardown for Connection {
    async fn close(&self) -> TeardownResult {
        self.closes.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[traced_test]
async fn ending_scope_waits_for_running_resolutions() {
    let mut builder = Injector::builder();
    builder.provide(constant(Closes::default()));
    builder.register_self::<Connection>(Lifetime::Scoped);
    let injector = builder.build();

    let scope = injector.begin_scope();
    let late = scope.clone();
    let resolving = {
        let scope = scope.clone();
        tokio::spawn(async move { scope.resolve::<Connection>().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    scope.end().await.unwrap();

    // The connection opened while the scope was ending was still closed
    let connection = resolving.await.unwrap().unwrap();
    assert_eq!(1, connection.closes.0.load(Ordering::SeqCst));
    assert!(logs_contain("waiting for resolutions to finish"));

    match late.resolve::<Connection>().await {
        Err(InjectError::ScopeEnded { scope }) => assert_eq!(late.id(), scope),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

/// A connection that cannot be closed cleanly.
struct BrokenConnection;

#[async_trait]
impl Injectable for BrokenConnection {
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    async fn construct(_dependencies: Resolved) -> InjectResult<Self> {
        Ok(BrokenConnection)
    }

    fn teardown(service: Svc<Self>) -> Option<Svc<dyn Teardown>> {
        Some(service)
    }
}

#[async_trait]
impl Teardown for BrokenConnection {
    async fn close(&self) -> TeardownResult {
        Err("connection reset".into())
    }
}

#[tokio::test]
#[traced_test]
async fn teardown_failures_are_aggregated() {
    let mut builder = storage_injector_builder();
    builder.register_self::<BrokenConnection>(Lifetime::Scoped);
    let injector = builder.build();

    let scope = injector.begin_scope();
    let session: Svc<Session> = scope.resolve().await.unwrap();
    let _broken: Svc<BrokenConnection> = scope.resolve().await.unwrap();

    let error = scope.end().await.unwrap_err();
    assert_eq!(1, error.failures().len());
    assert_eq!(
        ServiceInfo::of::<BrokenConnection>(),
        error.failures()[0].service_info()
    );
    assert_eq!("connection reset", error.failures()[0].error().to_string());

    // The session was still closed
    assert_eq!(1, session.closed.load(Ordering::SeqCst));
    assert!(logs_contain("service failed to tear down"));
}

#[tokio::test]
#[traced_test]
async fn reregistering_logs_eviction() {
    let injector = storage_injector();
    let _: Svc<Database> = injector.resolve().await.unwrap();

    injector.register_self::<Database>(Lifetime::Transient);
    assert!(logs_contain("evicted its cached singleton"));

    let first: Svc<Database> = injector.resolve().await.unwrap();
    let second: Svc<Database> = injector.resolve().await.unwrap();
    assert!(!Svc::ptr_eq(&first, &second));
}
