//! Read access to host network-device state.
//!
//! The prober only talks to [`HostDeviceState`], so discovery can run against
//! the real `/sys` tree, a relocated sysfs root, or an in-memory fake.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;

use super::error::DiscoveryError;

/// Default mount point of sysfs.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Synchronous, fallible reads of host network-device state.
pub trait HostDeviceState: Send + Sync {
    /// Names of all network devices on the host.
    fn list_devices(&self) -> Result<Vec<String>, Report<DiscoveryError>>;

    /// Raw content of the device's configured VF count, `None` if the device
    /// has no such record (not SR-IOV capable).
    fn vf_count(&self, device: &str) -> Result<Option<String>, Report<DiscoveryError>>;

    /// Raw per-VF metadata record (uevent format).
    fn vf_metadata(&self, device: &str, index: u32) -> Result<String, Report<DiscoveryError>>;

    /// Kernel network interface names bound to the VF, empty if none.
    fn vf_interface_names(
        &self,
        device: &str,
        index: u32,
    ) -> Result<Vec<String>, Report<DiscoveryError>>;
}

/// [`HostDeviceState`] backed by a sysfs tree.
#[derive(Debug, Clone)]
pub struct SysfsDeviceState {
    root: PathBuf,
}

impl Default for SysfsDeviceState {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl SysfsDeviceState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn net_dir(&self) -> PathBuf {
        self.root.join("class").join("net")
    }

    fn device_dir(&self, device: &str) -> PathBuf {
        self.net_dir().join(device).join("device")
    }

    fn virtfn_dir(&self, device: &str, index: u32) -> PathBuf {
        self.device_dir(device).join(format!("virtfn{index}"))
    }
}

impl HostDeviceState for SysfsDeviceState {
    fn list_devices(&self) -> Result<Vec<String>, Report<DiscoveryError>> {
        let net_dir = self.net_dir();
        let entries = fs::read_dir(&net_dir)
            .change_context(DiscoveryError::Enumerate)
            .attach_printable_lazy(|| format!("path: {}", net_dir.display()))?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry
                .change_context(DiscoveryError::Enumerate)
                .attach_printable_lazy(|| format!("path: {}", net_dir.display()))?;
            devices.push(entry.file_name().to_string_lossy().into_owned());
        }
        devices.sort();
        Ok(devices)
    }

    fn vf_count(&self, device: &str) -> Result<Option<String>, Report<DiscoveryError>> {
        let path = self.device_dir(device).join("sriov_numvfs");
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Report::new(e)
                .change_context(DiscoveryError::ReadCount {
                    device: device.to_string(),
                })
                .attach_printable(format!("path: {}", path.display()))),
        }
    }

    fn vf_metadata(&self, device: &str, index: u32) -> Result<String, Report<DiscoveryError>> {
        let path = self.virtfn_dir(device, index).join("uevent");
        fs::read_to_string(&path)
            .change_context(DiscoveryError::ReadMetadata {
                device: device.to_string(),
                index,
            })
            .attach_printable_lazy(|| format!("path: {}", path.display()))
    }

    fn vf_interface_names(
        &self,
        device: &str,
        index: u32,
    ) -> Result<Vec<String>, Report<DiscoveryError>> {
        let path = self.virtfn_dir(device, index).join("net");
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            // VF not bound to a network driver
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Report::new(e)
                    .change_context(DiscoveryError::ReadMetadata {
                        device: device.to_string(),
                        index,
                    })
                    .attach_printable(format!("path: {}", path.display())))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.change_context(DiscoveryError::ReadMetadata {
                device: device.to_string(),
                index,
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Extracts the PCI slot name from a uevent record.
pub(crate) fn parse_pci_slot_name(uevent: &str) -> Option<&str> {
    uevent
        .lines()
        .find_map(|line| line.trim().strip_prefix("PCI_SLOT_NAME="))
}
