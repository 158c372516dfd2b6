//! SR-IOV virtual function discovery, inventory and allocation.
//!
//! - [`DeviceProber`]: reads VF records from the host
//! - [`VfInventory`]: authoritative VF set and allocation state
//! - [`reconcile`]: converges allocations onto the live workload list
//! - [`SriovManager`]: drives discovery and reconciliation on an interval

pub mod capabilities;
pub mod error;
pub mod host;
pub mod inventory;
pub mod manager;
pub mod naming;
pub mod prober;
pub mod reconciler;
pub mod workloads;

pub use capabilities::validate_capabilities;
pub use error::CapabilityError;
pub use error::DiscoveryError;
pub use error::WorkloadListError;
pub use host::HostDeviceState;
pub use host::SysfsDeviceState;
pub use inventory::ReplaceSummary;
pub use inventory::VfInventory;
pub use manager::ManagerSettings;
pub use manager::ManagerState;
pub use manager::PassOutcome;
pub use manager::SriovManager;
pub use naming::InterfaceNameResolver;
pub use naming::NamingMode;
pub use prober::DeviceFilter;
pub use prober::DeviceProber;
pub use reconciler::reconcile;
pub use reconciler::ReconcileSummary;
pub use reconciler::WorkloadRequest;
pub use workloads::StaticWorkloadSource;
pub use workloads::WorkloadSource;
