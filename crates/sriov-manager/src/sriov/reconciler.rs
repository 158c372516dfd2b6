//! Reconciles VF allocations against the live set of requesting workloads.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use api_types::InventoryStats;
use api_types::VfId;
use api_types::WorkloadRef;
use tracing::debug;
use tracing::info;

use super::inventory::allocate_in;
use super::inventory::stats_of;
use super::inventory::VfInventory;

/// A workload observed in the cluster, as seen by one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRequest {
    pub workload: WorkloadRef,
    /// Whether the workload asks for hardware-accelerated networking
    pub wants_acceleration: bool,
    /// Whether the workload is shutting down or finished
    pub terminating: bool,
}

impl WorkloadRequest {
    pub fn new(workload: WorkloadRef) -> Self {
        Self {
            workload,
            wants_acceleration: true,
            terminating: false,
        }
    }

    pub fn terminating(mut self) -> Self {
        self.terminating = true;
        self
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub released: Vec<(VfId, WorkloadRef)>,
    pub allocated: Vec<(VfId, WorkloadRef)>,
    /// Requesting workloads left without a VF for lack of capacity
    pub unserved: Vec<WorkloadRef>,
    /// Inventory counters after the pass
    pub stats: InventoryStats,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.released.is_empty() && self.allocated.is_empty()
    }
}

/// Collapses the request list to live workloads, ordered by identity.
///
/// A workload is live while it asks for acceleration and is not terminating.
/// A workload listed more than once wants acceleration if any entry does and
/// is terminating if any entry is.
fn live_workloads(requests: &[WorkloadRequest]) -> BTreeSet<&WorkloadRef> {
    let mut seen: BTreeMap<&WorkloadRef, (bool, bool)> = BTreeMap::new();
    for request in requests {
        let entry = seen.entry(&request.workload).or_insert((false, false));
        entry.0 |= request.wants_acceleration;
        entry.1 |= request.terminating;
    }

    seen.into_iter()
        .filter(|(_, (wants, terminating))| *wants && !terminating)
        .map(|(workload, _)| workload)
        .collect()
}

/// Runs one reconciliation pass as a single inventory mutation.
///
/// Release pass: every allocation whose owner is not live is cleared,
/// including owners that stopped asking for acceleration.
/// Allocate pass: every live workload without a VF gets
/// the first free one, in workload identity order. Workloads left without a
/// VF are retried by the next pass.
///
/// `requests` must be fetched before calling; the inventory lock is held for
/// the whole pass.
pub fn reconcile(inventory: &VfInventory, requests: &[WorkloadRequest]) -> ReconcileSummary {
    let live = live_workloads(requests);
    let mut summary = ReconcileSummary::default();

    let mut vfs = inventory.write();

    for vf in vfs.values_mut() {
        let Some(owner) = &vf.allocated_to else {
            continue;
        };
        if live.contains(owner) {
            continue;
        }
        info!(vf = %vf.id, namespace = %owner.namespace, pod = %owner.name, "Owner gone, releasing VF");
        summary.released.push((vf.id.clone(), owner.clone()));
        vf.allocated_to = None;
    }

    for workload in live {
        if vfs.values().any(|vf| vf.is_owned_by(workload)) {
            continue;
        }
        match allocate_in(&mut vfs, workload) {
            Some(id) => {
                info!(vf = %id, namespace = %workload.namespace, pod = %workload.name, "Allocated VF");
                summary.allocated.push((id, workload.clone()));
            }
            None => {
                debug!(namespace = %workload.namespace, pod = %workload.name, "No free VF, workload stays unserved");
                summary.unserved.push(workload.clone());
            }
        }
    }

    summary.stats = stats_of(&vfs);
    drop(vfs);

    info!(
        allocated = summary.stats.allocated,
        total = summary.stats.total,
        unserved = summary.unserved.len(),
        "VF allocation reconciliation completed"
    );
    summary
}
