use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;

use super::error::CapabilityError;

/// Checks that the host exposes at least one SR-IOV capable network device.
///
/// A device counts as capable when it has a `sriov_numvfs` record, whatever
/// its current VF count. Returns the capable devices' VF count records.
pub fn validate_capabilities(sysfs_root: &Path) -> Result<Vec<PathBuf>, Report<CapabilityError>> {
    let pattern = sysfs_root.join("class/net/*/device/sriov_numvfs");
    let pattern = pattern.to_string_lossy();

    let matches = glob::glob(&pattern).change_context(CapabilityError::SearchFailed {
        message: format!("invalid pattern {pattern}"),
    })?;

    let devices: Vec<PathBuf> = matches.filter_map(Result::ok).collect();
    if devices.is_empty() {
        return Err(Report::new(CapabilityError::NoCapableDevices)
            .attach_printable(format!("searched {pattern}")));
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn finds_capable_devices() {
        let root = tempfile::tempdir().unwrap();
        let device_dir = root.path().join("class/net/eth0/device");
        fs::create_dir_all(&device_dir).unwrap();
        fs::write(device_dir.join("sriov_numvfs"), "0\n").unwrap();
        fs::create_dir_all(root.path().join("class/net/lo")).unwrap();

        let devices = validate_capabilities(root.path()).unwrap();
        assert_eq!(devices, vec![device_dir.join("sriov_numvfs")]);
    }

    #[test]
    fn reports_missing_capability() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("class/net/lo")).unwrap();

        let err = validate_capabilities(root.path()).unwrap_err();
        assert_eq!(err.current_context(), &CapabilityError::NoCapableDevices);
    }
}
