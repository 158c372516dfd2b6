use std::sync::Arc;

use crate::k8s::KubeWorkloadSource;
use crate::sriov::SriovManager;
use crate::sriov::SysfsDeviceState;
use crate::sriov::VfInventory;

pub type NodeManager = SriovManager<SysfsDeviceState, KubeWorkloadSource>;

/// Application dependencies - simple struct with Arc-wrapped services
pub struct ApplicationServices {
    /// Absent when SR-IOV management is disabled
    pub manager: Option<Arc<NodeManager>>,
    pub inventory: Arc<VfInventory>,
}
