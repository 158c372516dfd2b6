//! Shared API type definitions
//!
//! This crate contains the SR-IOV Virtual Function types shared between the
//! node manager and its collaborators (device-attachment agents, tooling),
//! together with the response envelopes of the manager's query API.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a Virtual Function: the physical device hosting it and its
/// index on that device.
///
/// Ordering is by device name first, then numerically by index, which is the
/// order the inventory uses when choosing a free VF.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VfId {
    /// Physical function name (e.g. `eth0`)
    pub pf_name: String,
    /// VF index on the physical function
    pub vf_index: u32,
}

impl VfId {
    pub fn new(pf_name: impl Into<String>, vf_index: u32) -> Self {
        Self {
            pf_name: pf_name.into(),
            vf_index,
        }
    }
}

impl fmt::Display for VfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-vf{}", self.pf_name, self.vf_index)
    }
}

/// Identity of a workload (pod) within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Where an interface name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameSource {
    /// Guessed from the `<device>_vf<index>` convention; may not exist on the host.
    Convention,
    /// Read from the host's device state.
    Kernel,
}

/// Network interface name of a VF.
///
/// Always advisory: a name with [`NameSource::Convention`] is a guess and
/// consumers must tolerate it being wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceName {
    pub name: String,
    pub source: NameSource,
}

impl InterfaceName {
    pub fn conventional(pf_name: &str, vf_index: u32) -> Self {
        Self {
            name: format!("{pf_name}_vf{vf_index}"),
            source: NameSource::Convention,
        }
    }

    pub fn kernel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: NameSource::Kernel,
        }
    }

    pub fn is_guess(&self) -> bool {
        self.source == NameSource::Convention
    }
}

/// One SR-IOV Virtual Function and its allocation status.
///
/// A VF is either free (`allocated_to` is `None`) or owned by exactly one
/// workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFunction {
    pub id: VfId,
    /// PCI slot name of the VF (e.g. `0000:3b:02.0`), empty if the host did not report one
    pub pci_address: String,
    pub interface_name: InterfaceName,
    /// Owning workload, if allocated
    pub allocated_to: Option<WorkloadRef>,
}

impl VirtualFunction {
    /// A freshly discovered, unallocated VF.
    pub fn discovered(id: VfId, pci_address: String, interface_name: InterfaceName) -> Self {
        Self {
            id,
            pci_address,
            interface_name,
            allocated_to: None,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated_to.is_some()
    }

    pub fn is_owned_by(&self, workload: &WorkloadRef) -> bool {
        self.allocated_to.as_ref() == Some(workload)
    }
}

/// Aggregate counters over an inventory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total: usize,
    pub allocated: usize,
}

/// Response for a VF lookup by workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfLookupResponse {
    /// Whether a VF is allocated to the workload
    pub success: bool,
    /// The allocated VF (present when successful)
    pub data: Option<VirtualFunction>,
    /// Response message
    pub message: String,
}

/// Response for an explicit VF release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfReleaseResponse {
    /// Whether a VF was actually released
    pub released: bool,
    /// Response message
    pub message: String,
}

/// Response listing the whole node inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub node: String,
    pub stats: InventoryStats,
    pub vfs: Vec<VirtualFunction>,
}
