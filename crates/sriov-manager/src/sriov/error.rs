use core::error::Error;

/// Errors raised while reading host device state.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum DiscoveryError {
    #[display("Failed to enumerate network devices")]
    Enumerate,
    #[display("Failed to read VF count of {device}")]
    ReadCount { device: String },
    #[display("Failed to parse VF count of {device}: {value:?}")]
    ParseCount { device: String, value: String },
    #[display("Failed to read metadata of VF {index} on {device}")]
    ReadMetadata { device: String, index: u32 },
}

impl Error for DiscoveryError {}

/// Errors raised while fetching the live workload list.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum WorkloadListError {
    #[display("Failed to list workloads requesting SR-IOV")]
    ListFailed,
}

impl Error for WorkloadListError {}

/// Errors raised by the one-shot host capability check.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CapabilityError {
    #[display("Failed to search for SR-IOV capable devices: {message}")]
    SearchFailed { message: String },
    #[display("No SR-IOV capable devices found")]
    NoCapableDevices,
}

impl Error for CapabilityError {}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn discovery_error_display_formatting() {
        assert_eq!(
            DiscoveryError::ParseCount {
                device: "eth0".to_string(),
                value: "two".to_string(),
            }
            .to_string(),
            "Failed to parse VF count of eth0: \"two\""
        );
        assert_eq!(
            DiscoveryError::ReadMetadata {
                device: "eth0".to_string(),
                index: 3,
            }
            .to_string(),
            "Failed to read metadata of VF 3 on eth0"
        );
        assert_eq!(
            CapabilityError::NoCapableDevices.to_string(),
            "No SR-IOV capable devices found"
        );
    }
}
