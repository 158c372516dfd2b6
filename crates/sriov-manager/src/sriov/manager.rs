//! Node-level SR-IOV manager: drives discovery and reconciliation on a fixed
//! interval and answers allocation queries from other components.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use api_types::VirtualFunction;
use api_types::WorkloadRef;
use tokio::select;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::host::HostDeviceState;
use super::inventory::ReplaceSummary;
use super::inventory::VfInventory;
use super::prober::DeviceProber;
use super::reconciler::reconcile;
use super::reconciler::ReconcileSummary;
use super::workloads::WorkloadSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub poll_interval: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Lifecycle of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ManagerState {
    Stopped,
    Running,
    Stopping,
}

/// Result of one discovery + reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed {
        discovery: ReplaceSummary,
        reconciliation: ReconcileSummary,
    },
    /// Host devices could not be listed; inventory untouched.
    DiscoveryFailed,
    /// Inventory refreshed but the workload list could not be fetched.
    ListingFailed { discovery: ReplaceSummary },
    /// Cancellation observed between steps; completed steps stay applied.
    Cancelled,
}

impl PassOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PassOutcome::DiscoveryFailed | PassOutcome::ListingFailed { .. }
        )
    }
}

pub struct SriovManager<H, W> {
    prober: Arc<DeviceProber<H>>,
    workloads: W,
    inventory: Arc<VfInventory>,
    settings: ManagerSettings,
    state: watch::Sender<ManagerState>,
    consecutive_failures: AtomicU32,
}

impl<H, W> SriovManager<H, W>
where
    H: HostDeviceState + 'static,
    W: WorkloadSource,
{
    pub fn new(prober: DeviceProber<H>, workloads: W, settings: ManagerSettings) -> Self {
        let (state, _) = watch::channel(ManagerState::Stopped);
        Self {
            prober: Arc::new(prober),
            workloads,
            inventory: Arc::new(VfInventory::new()),
            settings,
            state,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Shared handle to the inventory for read/release access.
    pub fn inventory(&self) -> Arc<VfInventory> {
        self.inventory.clone()
    }

    pub fn prober(&self) -> &DeviceProber<H> {
        &self.prober
    }

    pub fn workloads(&self) -> &W {
        &self.workloads
    }

    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    /// Number of failed passes since the last completed one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// VF allocated to the pod, if any.
    pub fn get_vf_for_pod(&self, namespace: &str, pod_name: &str) -> Option<VirtualFunction> {
        self.inventory.lookup(&WorkloadRef::new(namespace, pod_name))
    }

    /// Releases the pod's VF ahead of reconciliation; returns whether one was held.
    pub fn release_vf(&self, namespace: &str, pod_name: &str) -> bool {
        self.inventory.release(&WorkloadRef::new(namespace, pod_name))
    }

    /// Runs the poll loop until `token` is cancelled.
    ///
    /// The first pass starts immediately. Failed passes are logged and the
    /// loop carries on at the next tick.
    #[tracing::instrument(skip_all, fields(poll_interval = ?self.settings.poll_interval))]
    pub async fn run(&self, token: CancellationToken) {
        self.state.send_replace(ManagerState::Running);
        info!("Starting SR-IOV manager");

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.run_pass_until(&token).await;
                }
            }
        }

        self.state.send_replace(ManagerState::Stopping);
        info!("Stopping SR-IOV manager");
        self.state.send_replace(ManagerState::Stopped);
    }

    /// Runs a single pass to completion.
    pub async fn run_pass(&self) -> PassOutcome {
        self.run_pass_until(&CancellationToken::new()).await
    }

    async fn run_pass_until(&self, token: &CancellationToken) -> PassOutcome {
        let outcome = self.pass(token).await;
        if outcome.is_failure() {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures > 1 {
                warn!(consecutive_failures = failures, "SR-IOV pass failed repeatedly");
            }
        } else if matches!(outcome, PassOutcome::Completed { .. }) {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        }
        outcome
    }

    async fn pass(&self, token: &CancellationToken) -> PassOutcome {
        // sysfs reads block, keep them off the async workers
        let prober = self.prober.clone();
        let discovered = match tokio::task::spawn_blocking(move || prober.discover()).await {
            Ok(Ok(discovered)) => discovered,
            Ok(Err(e)) => {
                error!("VF discovery failed: {e:?}");
                return PassOutcome::DiscoveryFailed;
            }
            Err(e) => {
                error!("VF discovery task failed: {e}");
                return PassOutcome::DiscoveryFailed;
            }
        };
        if token.is_cancelled() {
            return PassOutcome::Cancelled;
        }

        let discovery = self.inventory.replace(discovered);
        info!(
            vf_count = discovery.total,
            carried_forward = discovery.carried_forward,
            "SR-IOV VF discovery completed"
        );
        if token.is_cancelled() {
            return PassOutcome::Cancelled;
        }

        let requests = select! {
            biased;
            _ = token.cancelled() => return PassOutcome::Cancelled,
            result = self.workloads.list_requests() => result,
        };
        let requests = match requests {
            Ok(requests) => requests,
            Err(e) => {
                error!("VF allocation reconciliation failed: {e:?}");
                return PassOutcome::ListingFailed { discovery };
            }
        };

        let reconciliation = reconcile(&self.inventory, &requests);
        PassOutcome::Completed {
            discovery,
            reconciliation,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use api_types::VfId;
    use async_trait::async_trait;
    use error_stack::Report;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sriov::error::DiscoveryError;
    use crate::sriov::error::WorkloadListError;
    use crate::sriov::host::fake::FakeHostDevices;
    use crate::sriov::reconciler::WorkloadRequest;
    use crate::sriov::workloads::StaticWorkloadSource;

    /// Counts listings so tests can observe how many passes reached reconciliation.
    #[derive(Default)]
    struct CountingSource {
        inner: StaticWorkloadSource,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkloadSource for CountingSource {
        async fn list_requests(&self) -> Result<Vec<WorkloadRequest>, Report<WorkloadListError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_requests().await
        }
    }

    fn request(namespace: &str, name: &str) -> WorkloadRequest {
        WorkloadRequest::new(WorkloadRef::new(namespace, name))
    }

    fn manager(
        host: FakeHostDevices,
        requests: Vec<WorkloadRequest>,
    ) -> SriovManager<FakeHostDevices, CountingSource> {
        let source = CountingSource {
            inner: StaticWorkloadSource::new(requests),
            calls: AtomicUsize::new(0),
        };
        SriovManager::new(
            DeviceProber::new(host),
            source,
            ManagerSettings::default(),
        )
    }

    #[test(tokio::test)]
    async fn pass_discovers_and_allocates() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 2), vec![
            request("default", "pod-a"),
        ]);

        let outcome = manager.run_pass().await;

        let PassOutcome::Completed {
            discovery,
            reconciliation,
        } = outcome
        else {
            panic!("expected completed pass, got {outcome:?}");
        };
        assert_eq!(discovery.total, 2);
        assert_eq!(reconciliation.allocated.len(), 1);

        let vf = manager.get_vf_for_pod("default", "pod-a").unwrap();
        assert_eq!(vf.id, VfId::new("eth0", 0));
    }

    /// Records the thread that enumerates devices.
    struct ThreadRecordingHost {
        inner: FakeHostDevices,
        thread: std::sync::Mutex<Option<std::thread::ThreadId>>,
    }

    impl HostDeviceState for ThreadRecordingHost {
        fn list_devices(&self) -> Result<Vec<String>, Report<DiscoveryError>> {
            *self.thread.lock().expect("poisoned") = Some(std::thread::current().id());
            self.inner.list_devices()
        }

        fn vf_count(&self, device: &str) -> Result<Option<String>, Report<DiscoveryError>> {
            self.inner.vf_count(device)
        }

        fn vf_metadata(&self, device: &str, index: u32) -> Result<String, Report<DiscoveryError>> {
            self.inner.vf_metadata(device, index)
        }

        fn vf_interface_names(
            &self,
            device: &str,
            index: u32,
        ) -> Result<Vec<String>, Report<DiscoveryError>> {
            self.inner.vf_interface_names(device, index)
        }
    }

    #[test(tokio::test)]
    async fn discovery_runs_off_the_runtime_thread() {
        let host = ThreadRecordingHost {
            inner: FakeHostDevices::new().with_sriov_device("eth0", 1),
            thread: std::sync::Mutex::new(None),
        };
        let manager = SriovManager::new(
            DeviceProber::new(host),
            StaticWorkloadSource::default(),
            ManagerSettings::default(),
        );

        assert!(matches!(
            manager.run_pass().await,
            PassOutcome::Completed { .. }
        ));

        let discovery_thread = *manager.prober().host().thread.lock().expect("poisoned");
        assert!(discovery_thread.is_some());
        assert_ne!(discovery_thread, Some(std::thread::current().id()));
    }

    #[test(tokio::test)]
    async fn allocation_survives_rediscovery_and_drops_with_device() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 1), vec![
            request("default", "pod-a"),
        ]);
        manager.run_pass().await;

        // carried forward before any reconciliation
        manager.inventory().replace(manager.prober().discover().unwrap());
        assert!(manager.get_vf_for_pod("default", "pod-a").is_some());

        manager.prober().host().remove_device("eth0");
        manager.inventory().replace(manager.prober().discover().unwrap());
        assert!(manager.get_vf_for_pod("default", "pod-a").is_none());
        assert!(manager.inventory().is_empty());
    }

    #[test(tokio::test)]
    async fn discovery_failure_skips_reconciliation() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 1), vec![
            request("default", "pod-a"),
        ]);
        manager.prober().host().set_enumerate_fails(true);

        assert_eq!(manager.run_pass().await, PassOutcome::DiscoveryFailed);
        assert_eq!(manager.run_pass().await, PassOutcome::DiscoveryFailed);
        assert_eq!(manager.workloads().calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.consecutive_failures(), 2);

        manager.prober().host().set_enumerate_fails(false);
        assert!(matches!(
            manager.run_pass().await,
            PassOutcome::Completed { .. }
        ));
        assert_eq!(manager.consecutive_failures(), 0);
    }

    #[test(tokio::test)]
    async fn listing_failure_keeps_refreshed_inventory() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 2), vec![]);
        manager.workloads().inner.fail_with("apiserver unavailable");

        let outcome = manager.run_pass().await;

        assert!(matches!(outcome, PassOutcome::ListingFailed { .. }));
        assert_eq!(manager.inventory().len(), 2);
        assert_eq!(manager.inventory().stats().allocated, 0);
    }

    #[test(tokio::test)]
    async fn cancelled_pass_stops_between_steps() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 2), vec![
            request("default", "pod-a"),
        ]);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = manager.run_pass_until(&token).await;

        assert_eq!(outcome, PassOutcome::Cancelled);
        assert!(manager.inventory().is_empty());
        assert_eq!(manager.workloads().calls.load(Ordering::SeqCst), 0);
    }

    #[test(tokio::test)]
    async fn release_vf_frees_allocation_early() {
        let manager = manager(FakeHostDevices::new().with_sriov_device("eth0", 1), vec![
            request("default", "pod-a"),
        ]);
        manager.run_pass().await;

        assert!(manager.release_vf("default", "pod-a"));
        assert!(!manager.release_vf("default", "pod-a"));
        assert!(manager.get_vf_for_pod("default", "pod-a").is_none());
    }

    #[test(tokio::test(start_paused = true))]
    async fn loop_polls_on_interval_until_cancelled() {
        let manager = Arc::new(manager(
            FakeHostDevices::new().with_sriov_device("eth0", 1),
            vec![],
        ));
        assert_eq!(manager.state(), ManagerState::Stopped);

        let token = CancellationToken::new();
        let handle = {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.run(token).await })
        };

        // passes at t=0s, 30s and 60s
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(manager.state(), ManagerState::Running);
        assert_eq!(manager.workloads().calls.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert_eq!(manager.workloads().calls.load(Ordering::SeqCst), 3);
    }

    #[test(tokio::test(start_paused = true))]
    async fn loop_survives_failing_passes() {
        let manager = Arc::new(manager(
            FakeHostDevices::new().with_sriov_device("eth0", 1),
            vec![request("default", "pod-a")],
        ));
        manager.prober().host().set_enumerate_fails(true);

        let token = CancellationToken::new();
        let handle = {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.run(token).await })
        };

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(manager.consecutive_failures(), 2);

        manager.prober().host().set_enumerate_fails(false);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(manager.get_vf_for_pod("default", "pod-a").is_some());

        token.cancel();
        handle.await.unwrap();
    }
}
