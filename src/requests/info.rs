use crate::ServiceInfo;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOLUTION_ID: AtomicU64 = AtomicU64::new(1);

/// Information about an active request: the chain of services currently
/// being constructed, outermost first.
///
/// A child is created for each service entered during resolution, so the
/// path only ever describes the current call chain. Dropping the child is
/// what removes the service from the path again.
///
/// Every root request gets its own resolution id, which its children share.
#[derive(Clone, Debug)]
pub struct RequestInfo {
    resolution: u64,
    service_path: Vec<ServiceInfo>,
}

impl RequestInfo {
    /// Creates a new, empty instance of [`RequestInfo`] for a root request.
    #[must_use]
    pub fn new() -> Self {
        RequestInfo {
            resolution: NEXT_RESOLUTION_ID.fetch_add(1, Ordering::Relaxed),
            service_path: Vec::new(),
        }
    }

    /// Identifies the root request this request belongs to.
    #[must_use]
    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    /// Creates a new child instance of [`RequestInfo`] with the given service
    /// appended to the end of the request path.
    #[must_use]
    pub fn with_request(&self, service: ServiceInfo) -> Self {
        let mut child = self.clone();
        child.service_path.push(service);
        child
    }

    /// Gets the current request path. This can be used to configure a service
    /// based on what it's being injected into.
    #[must_use]
    pub fn service_path(&self) -> &[ServiceInfo] {
        &self.service_path
    }

    /// Whether the service is already being constructed in this request.
    #[must_use]
    pub fn is_requesting(&self, service: ServiceInfo) -> bool {
        self.service_path.contains(&service)
    }

    /// The path that requesting `service` again would form.
    pub(crate) fn cycle_through(&self, service: ServiceInfo) -> Vec<ServiceInfo> {
        let mut cycle = self.service_path.clone();
        cycle.push(service);
        cycle
    }
}

impl Default for RequestInfo {
    fn default() -> Self {
        RequestInfo::new()
    }
}
