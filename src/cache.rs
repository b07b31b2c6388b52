use crate::{instance::Instance, InjectError, InjectResult, RequestInfo, ServiceInfo};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

/// Identifies one cell: the cache that owns it and the service it holds.
/// The singleton cache is owner `0`; scoped caches use their scope's id.
type CellKey = (u64, ServiceInfo);

/// A concurrent cache of constructed services.
///
/// Each service gets its own once-cell, so construction is serialized per
/// service rather than across the whole cache. A construction that fails or
/// is cancelled leaves its cell empty.
pub(crate) struct InstanceCache {
    owner: u64,
    cells: DashMap<ServiceInfo, Arc<OnceCell<Instance>>>,
    order: Mutex<Vec<ServiceInfo>>,
    waits: Arc<WaitGraph>,
}

impl InstanceCache {
    pub fn new(owner: u64, waits: Arc<WaitGraph>) -> Self {
        InstanceCache {
            owner,
            cells: DashMap::new(),
            order: Mutex::new(Vec::new()),
            waits,
        }
    }

    /// Gets the cached instance of a service, constructing it with `init` if
    /// it has not been constructed yet. Concurrent callers for the same
    /// service wait for the first construction rather than starting their
    /// own, unless waiting would close a cycle with the resolution doing the
    /// constructing.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        service_info: ServiceInfo,
        request_info: &RequestInfo,
        init: F,
    ) -> InjectResult<Instance>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = InjectResult<Instance>>,
    {
        // The map guard must not be held across the construction below
        let cell = self.cells.entry(service_info).or_default().value().clone();
        if let Some(instance) = cell.get() {
            trace!(service = service_info.name(), "cache hit");
            return Ok(instance.clone());
        }

        let key = (self.owner, service_info);
        let _waiting = self.waits.wait_for(key, request_info)?;
        cell.get_or_try_init(|| async {
            let _holding = self.waits.hold(key, request_info.resolution());
            let instance = init().await?;
            self.order.lock().push(service_info);
            Ok(instance)
        })
        .await
        .cloned()
    }

    /// Gets the cached instance of a service without constructing it.
    pub fn get(&self, service_info: ServiceInfo) -> Option<Instance> {
        self.cells
            .get(&service_info)
            .and_then(|cell| cell.get().cloned())
    }

    /// Removes a service from the cache, returning the instance if one had
    /// been constructed.
    pub fn evict(&self, service_info: ServiceInfo) -> Option<Instance> {
        let (_, cell) = self.cells.remove(&service_info)?;
        self.order.lock().retain(|entry| *entry != service_info);
        cell.get().cloned()
    }

    /// All constructed instances, most recently constructed first.
    pub fn constructed(&self) -> Vec<(ServiceInfo, Instance)> {
        let order = self.order.lock().clone();
        let mut seen = HashSet::with_capacity(order.len());
        order
            .into_iter()
            .rev()
            .filter(|service_info| seen.insert(*service_info))
            .filter_map(|service_info| {
                self.get(service_info).map(|instance| (service_info, instance))
            })
            .collect()
    }

    /// Removes every entry from the cache.
    pub fn clear(&self) {
        self.cells.clear();
        self.order.lock().clear();
    }

    /// The number of constructed instances in the cache.
    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn order_len(&self) -> usize {
        self.order.lock().len()
    }
}

/// Tracks which resolution is constructing each cell and which cell each
/// blocked resolution is waiting on, across every cache of one injector.
///
/// A resolution only ever waits on one cell at a time, so following
/// holder -> awaited cell -> holder either ends or comes back around. Coming
/// back to the resolution that is about to wait means nobody could ever
/// finish, and the request fails with a cycle instead.
#[derive(Debug, Default)]
pub(crate) struct WaitGraph {
    state: Mutex<WaitState>,
}

#[derive(Debug, Default)]
struct WaitState {
    holders: HashMap<CellKey, u64>,
    waiters: HashMap<u64, Waiter>,
}

#[derive(Debug)]
struct Waiter {
    cell: CellKey,
    path: Vec<ServiceInfo>,
}

impl WaitGraph {
    /// Records that a resolution is about to wait on a cell, failing if that
    /// wait could never end.
    fn wait_for(
        &self,
        key: CellKey,
        request_info: &RequestInfo,
    ) -> InjectResult<WaitGuard<'_>> {
        let resolution = request_info.resolution();
        let mut state = self.state.lock();

        if let Some(cycle) = state.find_cycle(resolution, key, request_info) {
            debug!(
                service = key.1.name(),
                "waiting on this service would deadlock with another request"
            );
            let service_info = cycle.last().copied().unwrap_or(key.1);
            return Err(InjectError::CycleDetected {
                service_info,
                cycle,
            });
        }

        state.waiters.insert(
            resolution,
            Waiter {
                cell: key,
                path: request_info.service_path().to_vec(),
            },
        );
        Ok(WaitGuard {
            graph: self,
            key,
            resolution,
        })
    }

    /// Records that a resolution has started constructing a cell. It is no
    /// longer waiting on anything.
    fn hold(&self, key: CellKey, resolution: u64) -> HoldGuard<'_> {
        let mut state = self.state.lock();
        state.waiters.remove(&resolution);
        state.holders.insert(key, resolution);
        HoldGuard {
            graph: self,
            key,
            resolution,
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.holders.is_empty() && state.waiters.is_empty()
    }
}

impl WaitState {
    /// The service path that waiting on `key` would complete, if the chain of
    /// holders leads back to `resolution`.
    fn find_cycle(
        &self,
        resolution: u64,
        key: CellKey,
        request_info: &RequestInfo,
    ) -> Option<Vec<ServiceInfo>> {
        let mut cycle = request_info.service_path().to_vec();
        let mut cell = key;

        // Each hop visits a distinct waiter, so this always terminates
        for _ in 0..=self.waiters.len() {
            let holder = *self.holders.get(&cell)?;
            if holder == resolution {
                return Some(cycle);
            }

            let waiter = self.waiters.get(&holder)?;
            let entered = waiter.path.iter().position(|s| *s == cell.1)?;
            cycle.extend_from_slice(&waiter.path[entered + 1..]);
            cell = waiter.cell;
        }

        None
    }
}

struct WaitGuard<'a> {
    graph: &'a WaitGraph,
    key: CellKey,
    resolution: u64,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.graph.state.lock();
        if state
            .waiters
            .get(&self.resolution)
            .map_or(false, |waiter| waiter.cell == self.key)
        {
            state.waiters.remove(&self.resolution);
        }
    }
}

struct HoldGuard<'a> {
    graph: &'a WaitGraph,
    key: CellKey,
    resolution: u64,
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.graph.state.lock();
        if state.holders.get(&self.key) == Some(&self.resolution) {
            state.holders.remove(&self.key);
        }
    }
}
