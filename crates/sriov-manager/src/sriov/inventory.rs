//! Authoritative in-memory VF inventory.
//!
//! All mutation goes through this type. The map is ordered by [`VfId`], which
//! makes "first free VF" a deterministic choice.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use api_types::InventoryStats;
use api_types::VfId;
use api_types::VirtualFunction;
use api_types::WorkloadRef;
use tracing::info;
use tracing::warn;

pub(crate) type VfMap = BTreeMap<VfId, VirtualFunction>;

/// Outcome of installing a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub total: usize,
    /// VFs whose allocation survived rediscovery
    pub carried_forward: usize,
    /// Allocations lost because their VF disappeared from the host
    pub dropped_allocations: Vec<(VfId, WorkloadRef)>,
}

#[derive(Debug, Default)]
pub struct VfInventory {
    vfs: RwLock<VfMap>,
}

impl VfInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, VfMap> {
        self.vfs.read().expect("poisoned")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, VfMap> {
        self.vfs.write().expect("poisoned")
    }

    /// Installs a freshly discovered set as the inventory.
    ///
    /// Allocations are carried forward for VFs that are still present; VFs
    /// missing from `discovered` are dropped together with their allocation.
    /// The new map is built before taking the lock; carrying allocations
    /// forward and the swap happen under one write lock, so readers never see
    /// a partial inventory and no concurrent release is lost.
    pub fn replace(&self, discovered: Vec<VirtualFunction>) -> ReplaceSummary {
        let mut next: VfMap = discovered
            .into_iter()
            .map(|mut vf| {
                vf.allocated_to = None;
                (vf.id.clone(), vf)
            })
            .collect();

        let mut summary = ReplaceSummary {
            total: next.len(),
            ..Default::default()
        };

        let mut current = self.write();
        for (id, previous) in current.iter() {
            let Some(owner) = &previous.allocated_to else {
                continue;
            };
            match next.get_mut(id) {
                Some(vf) => {
                    vf.allocated_to = Some(owner.clone());
                    summary.carried_forward += 1;
                }
                None => {
                    warn!(
                        vf = %id,
                        namespace = %owner.namespace,
                        pod = %owner.name,
                        "Allocated VF disappeared from host, allocation dropped"
                    );
                    summary
                        .dropped_allocations
                        .push((id.clone(), owner.clone()));
                }
            }
        }
        *current = next;

        summary
    }

    /// Allocates the first free VF (in identity order) to `workload`.
    ///
    /// A workload that already owns a VF gets that VF's identity back rather
    /// than a second one. Returns `None` when no VF is free.
    pub fn try_allocate(&self, workload: &WorkloadRef) -> Option<VfId> {
        allocate_in(&mut self.write(), workload)
    }

    /// Clears the allocation held by `workload`, returning whether one existed.
    pub fn release(&self, workload: &WorkloadRef) -> bool {
        let mut vfs = self.write();
        let released = release_in(&mut vfs, workload);
        if let Some(id) = &released {
            info!(vf = %id, namespace = %workload.namespace, pod = %workload.name, "Released VF");
        }
        released.is_some()
    }

    /// VF currently allocated to `workload`, if any.
    pub fn lookup(&self, workload: &WorkloadRef) -> Option<VirtualFunction> {
        self.read()
            .values()
            .find(|vf| vf.is_owned_by(workload))
            .cloned()
    }

    pub fn get(&self, id: &VfId) -> Option<VirtualFunction> {
        self.read().get(id).cloned()
    }

    /// All VFs in identity order.
    pub fn snapshot(&self) -> Vec<VirtualFunction> {
        self.read().values().cloned().collect()
    }

    pub fn stats(&self) -> InventoryStats {
        stats_of(&self.read())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

pub(crate) fn allocate_in(vfs: &mut VfMap, workload: &WorkloadRef) -> Option<VfId> {
    if let Some(existing) = vfs.values().find(|vf| vf.is_owned_by(workload)) {
        return Some(existing.id.clone());
    }

    let vf = vfs.values_mut().find(|vf| !vf.is_allocated())?;
    vf.allocated_to = Some(workload.clone());
    Some(vf.id.clone())
}

pub(crate) fn release_in(vfs: &mut VfMap, workload: &WorkloadRef) -> Option<VfId> {
    let vf = vfs.values_mut().find(|vf| vf.is_owned_by(workload))?;
    vf.allocated_to = None;
    Some(vf.id.clone())
}

pub(crate) fn stats_of(vfs: &VfMap) -> InventoryStats {
    InventoryStats {
        total: vfs.len(),
        allocated: vfs.values().filter(|vf| vf.is_allocated()).count(),
    }
}
