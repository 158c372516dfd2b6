use std::path::PathBuf;

use clap::Parser;

use crate::sriov::DeviceFilter;
use crate::sriov::DeviceProber;
use crate::sriov::NamingMode;
use crate::sriov::SysfsDeviceState;

/// Arguments of the one-shot host inspection commands.
#[derive(Parser, Clone, Debug)]
pub struct HostArgs {
    #[arg(
        long,
        env = "NSM_SYSFS_ROOT",
        value_hint = clap::ValueHint::DirPath,
        default_value = "/sys",
        help = "Root of the sysfs tree"
    )]
    pub sysfs_root: PathBuf,

    #[arg(
        long,
        env = "NSM_EXCLUDED_DEVICE_PREFIXES",
        help = "Comma-separated device name prefixes to skip (empty disables)"
    )]
    pub excluded_device_prefixes: Option<String>,

    #[arg(
        long,
        env = "NSM_INTERFACE_NAMING",
        default_value = "host",
        help = "VF interface naming, either 'host' or 'convention'"
    )]
    pub interface_naming: NamingMode,
}

impl HostArgs {
    pub fn prober(&self) -> DeviceProber<SysfsDeviceState> {
        let filter = match &self.excluded_device_prefixes {
            Some(prefixes) => DeviceFilter::new(super::split_prefixes(prefixes)),
            None => DeviceFilter::default(),
        };
        DeviceProber::new(SysfsDeviceState::new(&self.sysfs_root))
            .with_filter(filter)
            .with_resolver(self.interface_naming.resolver())
    }
}
