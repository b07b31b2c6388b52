use crate::{cache::InstanceCache, ServiceInfo};
use async_trait::async_trait;
use std::{
    error::Error,
    fmt::{Display, Formatter},
};
use tracing::{debug, warn};

/// An error returned by a [`Teardown::close`] implementation.
pub type TeardownResult = Result<(), Box<dyn Error + Send + Sync + 'static>>;

/// A service which holds resources that must be released when the scope (or
/// injector) owning it ends.
///
/// Services expose this capability through
/// [`Injectable::teardown`](crate::Injectable::teardown).
///
/// ## Example
///
/// ```
/// use scoped_injector::{async_trait, Teardown, TeardownResult};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     open: AtomicBool,
/// }
///
/// #[async_trait]
/// impl Teardown for Connection {
///     async fn close(&self) -> TeardownResult {
///         self.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Teardown: Send + Sync {
    /// Releases the resources held by this service. Called at most once per
    /// cached instance.
    async fn close(&self) -> TeardownResult;
}

/// A single service that failed to tear down.
#[derive(Debug)]
pub struct TeardownFailure {
    service_info: ServiceInfo,
    error: Box<dyn Error + Send + Sync + 'static>,
}

impl TeardownFailure {
    /// The service whose teardown failed.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        self.service_info
    }

    /// The error returned by the service's teardown.
    #[must_use]
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.error.as_ref()
    }
}

/// Every teardown failure collected while releasing a cache. Failures never
/// stop the remaining services from being torn down.
#[derive(Debug)]
pub struct TeardownError {
    failures: Vec<TeardownFailure>,
}

impl TeardownError {
    /// The individual failures, in the order teardown was attempted.
    #[must_use]
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }
}

impl Display for TeardownError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} service(s) failed to tear down", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.service_info.name(), failure.error)?;
        }

        Ok(())
    }
}

impl Error for TeardownError {}

/// Tears down every instance held in the cache that exposes a
/// [`Teardown`] handle, most recently constructed first, then clears the
/// cache.
pub(crate) async fn release(cache: &InstanceCache) -> Result<(), TeardownError> {
    let instances = cache.constructed();
    let mut failures = Vec::new();

    for (service_info, instance) in instances {
        let Some(teardown) = instance.teardown() else {
            continue;
        };

        debug!(service = service_info.name(), "tearing down service");
        if let Err(error) = teardown.close().await {
            warn!(
                service = service_info.name(),
                error = %error,
                "service failed to tear down"
            );
            failures.push(TeardownFailure {
                service_info,
                error,
            });
        }
    }

    cache.clear();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(TeardownError { failures })
    }
}
