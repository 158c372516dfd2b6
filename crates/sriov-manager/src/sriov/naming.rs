//! Advisory interface names for discovered VFs.

use std::str::FromStr;

use api_types::InterfaceName;
use tracing::debug;

use super::host::HostDeviceState;

/// Derives the network interface name reported for a VF.
///
/// Whatever the strategy, the result is advisory and callers must tolerate a
/// name that does not exist on the host.
pub trait InterfaceNameResolver: Send + Sync {
    fn resolve(&self, host: &dyn HostDeviceState, device: &str, index: u32) -> InterfaceName;
}

/// Always reports the `<device>_vf<index>` guess.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConventionResolver;

impl InterfaceNameResolver for ConventionResolver {
    fn resolve(&self, _host: &dyn HostDeviceState, device: &str, index: u32) -> InterfaceName {
        InterfaceName::conventional(device, index)
    }
}

/// Reports the kernel-assigned name when the host exposes one, otherwise the
/// conventional guess.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostResolver;

impl InterfaceNameResolver for HostResolver {
    fn resolve(&self, host: &dyn HostDeviceState, device: &str, index: u32) -> InterfaceName {
        match host.vf_interface_names(device, index) {
            Ok(names) => match names.into_iter().next() {
                Some(name) => InterfaceName::kernel(name),
                None => InterfaceName::conventional(device, index),
            },
            Err(e) => {
                debug!(device, index, "Falling back to conventional VF name: {e:?}");
                InterfaceName::conventional(device, index)
            }
        }
    }
}

/// Configurable naming strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    Convention,
    #[default]
    Host,
}

impl NamingMode {
    pub fn resolver(self) -> Box<dyn InterfaceNameResolver> {
        match self {
            NamingMode::Convention => Box::new(ConventionResolver),
            NamingMode::Host => Box::new(HostResolver),
        }
    }
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "convention" => Ok(NamingMode::Convention),
            "host" => Ok(NamingMode::Host),
            other => Err(format!(
                "invalid interface naming mode: {other}, must be one of: convention, host"
            )),
        }
    }
}
