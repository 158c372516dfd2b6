//! VF discovery from host device state.

use api_types::VfId;
use api_types::VirtualFunction;
use error_stack::Report;
use tracing::debug;
use tracing::warn;

use super::error::DiscoveryError;
use super::host::parse_pci_slot_name;
use super::host::HostDeviceState;
use super::naming::HostResolver;
use super::naming::InterfaceNameResolver;

/// Device-name prefixes skipped by default (container bridges, veth pairs).
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["docker", "veth"];

/// Name-prefix heuristic for software network devices.
///
/// Known to exclude real hardware that happens to share a prefix, so the
/// prefix list is configurable and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    excluded_prefixes: Vec<String>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().map(|p| p.to_string()))
    }
}

impl DeviceFilter {
    pub fn new(excluded_prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded_prefixes: excluded_prefixes
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, device: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| device.starts_with(prefix.as_str()))
    }
}

/// Discovers VFs exposed by the host. Holds no state between passes.
pub struct DeviceProber<H> {
    host: H,
    filter: DeviceFilter,
    resolver: Box<dyn InterfaceNameResolver>,
}

impl<H: HostDeviceState> DeviceProber<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            filter: DeviceFilter::default(),
            resolver: Box::new(HostResolver),
        }
    }

    pub fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn InterfaceNameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Runs one discovery pass.
    ///
    /// Only a failure to list the host's devices fails the pass; per-device
    /// and per-VF failures are logged and the item skipped. Returned VFs are
    /// unallocated and sorted by identity.
    pub fn discover(&self) -> Result<Vec<VirtualFunction>, Report<DiscoveryError>> {
        let devices = self.host.list_devices()?;
        let mut discovered = Vec::new();

        for device in devices {
            if self.filter.is_excluded(&device) {
                continue;
            }

            let Some(count) = self.read_vf_count(&device) else {
                continue;
            };

            debug!(device = %device, count, "Found SR-IOV device");

            for index in 0..count {
                match self.probe_vf(&device, index) {
                    Ok(vf) => discovered.push(vf),
                    Err(e) => {
                        warn!(device = %device, index, "Skipping VF: {e:?}");
                    }
                }
            }
        }

        discovered.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(discovered)
    }

    /// Positive VF count of a device, `None` when the device should be skipped.
    fn read_vf_count(&self, device: &str) -> Option<u32> {
        let raw = match self.host.vf_count(device) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(device, "Skipping device: {e:?}");
                return None;
            }
        };

        match parse_vf_count(device, &raw) {
            Ok(count) if count > 0 => u32::try_from(count).ok(),
            Ok(_) => None,
            Err(e) => {
                warn!(device, "Skipping device: {e:?}");
                None
            }
        }
    }

    fn probe_vf(&self, device: &str, index: u32) -> Result<VirtualFunction, Report<DiscoveryError>> {
        let metadata = self.host.vf_metadata(device, index)?;
        let pci_address = match parse_pci_slot_name(&metadata) {
            Some(address) => address.to_string(),
            None => {
                debug!(device, index, "VF metadata has no PCI slot name");
                String::new()
            }
        };
        let interface_name = self.resolver.resolve(&self.host, device, index);

        Ok(VirtualFunction::discovered(
            VfId::new(device, index),
            pci_address,
            interface_name,
        ))
    }
}

fn parse_vf_count(device: &str, raw: &str) -> Result<i64, Report<DiscoveryError>> {
    raw.trim().parse::<i64>().map_err(|e| {
        Report::new(DiscoveryError::ParseCount {
            device: device.to_string(),
            value: raw.trim().to_string(),
        })
        .attach_printable(e.to_string())
    })
}
