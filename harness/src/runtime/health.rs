//! Health-check registry consulted by the callback endpoint

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{HealthTarget, WorkloadId};

/// Port sentinel for a probe that covers every instance of a version
pub const DEFINITION_PORT: u16 = 0;

/// Expected health state for one `(workload, version, port)` triple
///
/// Test code keeps the `Arc` returned by registration and flips `healthy`
/// while workload proxies keep polling.
#[derive(Debug)]
pub struct HealthProbe {
    workload_id: WorkloadId,
    version_id: String,
    port: u16,
    healthy: AtomicBool,
    pinged: AtomicBool,
}

impl HealthProbe {
    fn new(workload_id: WorkloadId, version_id: String, port: u16, healthy: bool) -> Self {
        Self {
            workload_id,
            version_id,
            port,
            healthy: AtomicBool::new(healthy),
            pinged: AtomicBool::new(false),
        }
    }

    pub fn workload_id(&self) -> &WorkloadId {
        &self.workload_id
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_definition_level(&self) -> bool {
        self.port == DEFINITION_PORT
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Whether any workload proxy has queried this probe yet
    pub fn pinged(&self) -> bool {
        self.pinged.load(Ordering::SeqCst)
    }

    fn mark_pinged(&self) {
        self.pinged.store(true, Ordering::SeqCst);
    }

    fn same_version(&self, workload_id: &WorkloadId, version_id: &str) -> bool {
        &self.workload_id == workload_id && self.version_id == version_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealthCheckRegistry {
    probes: Arc<Mutex<Vec<Arc<HealthProbe>>>>,
}

impl HealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<HealthProbe>>> {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a probe, replacing every probe with the same workload and
    /// version regardless of port. The latest registration wins.
    pub fn register(
        &self,
        workload_id: WorkloadId,
        version_id: impl Into<String>,
        port: u16,
        healthy: bool,
    ) -> Arc<HealthProbe> {
        let probe = Arc::new(HealthProbe::new(workload_id, version_id.into(), port, healthy));

        let mut probes = self.lock();
        probes.retain(|existing| !existing.same_version(&probe.workload_id, &probe.version_id));
        probes.push(Arc::clone(&probe));
        drop(probes);

        tracing::debug!(
            "🩺 Registered health check {}@{}:{} (healthy: {})",
            probe.workload_id,
            probe.version_id,
            probe.port,
            healthy
        );
        probe
    }

    /// Answer a health query from a workload proxy
    ///
    /// Instance-specific probe first, then the definition-level probe, then
    /// healthy by default. A matched probe is marked pinged before the answer
    /// is returned.
    pub fn resolve(&self, target: &HealthTarget) -> bool {
        let probes = self.lock();
        let candidates: Vec<&Arc<HealthProbe>> = probes
            .iter()
            .filter(|probe| probe.same_version(&target.workload_id, &target.version_id))
            .collect();

        let matched = candidates
            .iter()
            .find(|probe| probe.port == target.port)
            .or_else(|| candidates.iter().find(|probe| probe.is_definition_level()));

        match matched {
            Some(probe) => {
                probe.mark_pinged();
                let healthy = probe.is_healthy();
                tracing::debug!("🩺 Health query {} -> {}", target, healthy);
                healthy
            }
            None => {
                tracing::debug!("🩺 No health check registered for {}, assuming healthy", target);
                true
            }
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
