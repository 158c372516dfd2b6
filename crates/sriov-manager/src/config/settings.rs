//! Resolved daemon settings.
//!
//! Sources in order of precedence: CLI arguments and `NSM_*` environment
//! variables, the JSON config file, built-in defaults.

use core::error::Error;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;

use super::daemon::DaemonArgs;
use super::split_prefixes;
use crate::k8s::DEFAULT_LABEL_DOMAIN;
use crate::sriov::host::DEFAULT_SYSFS_ROOT;
use crate::sriov::manager::DEFAULT_POLL_INTERVAL;
use crate::sriov::prober::DEFAULT_EXCLUDED_PREFIXES;
use crate::sriov::NamingMode;

pub const DEFAULT_API_LISTEN_ADDR: &str = "0.0.0.0:8089";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_millis(10);
pub const DEFAULT_CLOUD_HEARTBEAT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigError {
    #[display("Failed to read config file {}", path.display())]
    ReadFile { path: PathBuf },
    #[display("Failed to parse config file {}", path.display())]
    ParseFile { path: PathBuf },
    #[display("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Error for ConfigError {}

/// QoS class used to prioritize the node's traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum QosPriority {
    #[default]
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

impl QosPriority {
    fn parse(value: &str) -> Result<Self, Report<ConfigError>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(invalid(
                "qos priority",
                &format!("{value:?} must be one of: high, medium, low"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
pub enum FailoverStrategy {
    #[display("fast")]
    Fast,
    #[default]
    #[display("balanced")]
    Balanced,
    #[display("reliable")]
    Reliable,
}

impl FailoverStrategy {
    fn parse(value: &str) -> Result<Self, Report<ConfigError>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "reliable" => Ok(Self::Reliable),
            _ => Err(invalid(
                "failover strategy",
                &format!("{value:?} must be one of: fast, balanced, reliable"),
            )),
        }
    }
}

/// On-disk configuration. Every key is optional; keys outside this set are
/// rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeConfigFile {
    pub qos_priority: Option<String>,
    pub edge_node_id: Option<String>,
    #[serde(rename = "enableSRIOV", alias = "enableSriov")]
    pub enable_sriov: Option<bool>,
    #[serde(rename = "enableDPDK", alias = "enableDpdk")]
    pub enable_dpdk: Option<bool>,
    /// Milliseconds. The misspelled key is the one deployed files use.
    #[serde(rename = "latencyTreshold", alias = "latencyThreshold")]
    pub latency_threshold_ms: Option<u64>,
    pub cloud_heartbeat_sec: Option<u64>,
    pub failover_strategy: Option<String>,
    /// An empty string selects in-cluster or default config.
    pub kubeconfig: Option<PathBuf>,
    pub node_name: Option<String>,
    pub k8s_namespace: Option<String>,
    pub label_domain: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub shutdown_timeout_secs: Option<u64>,
    pub sysfs_root: Option<PathBuf>,
    pub excluded_device_prefixes: Option<Vec<String>>,
    pub interface_naming: Option<NamingMode>,
    pub enable_api: Option<bool>,
    pub api_listen_addr: Option<String>,
}

impl NodeConfigFile {
    pub fn load(path: &Path) -> Result<Self, Report<ConfigError>> {
        let content = std::fs::read_to_string(path).change_context(ConfigError::ReadFile {
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&content).change_context(ConfigError::ParseFile {
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub qos_priority: QosPriority,
    pub edge_node_id: String,
    pub enable_sriov: bool,
    pub enable_dpdk: bool,
    pub latency_threshold: Duration,
    pub cloud_heartbeat: Duration,
    pub failover_strategy: FailoverStrategy,
    pub kubeconfig: Option<PathBuf>,
    pub node_name: Option<String>,
    pub k8s_namespace: Option<String>,
    pub label_domain: String,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub sysfs_root: PathBuf,
    pub excluded_device_prefixes: Vec<String>,
    pub interface_naming: NamingMode,
    pub enable_api: bool,
    pub api_listen_addr: String,
}

impl NodeSettings {
    /// Loads the config file named by `args` (if any) and resolves settings.
    pub fn resolve(args: &DaemonArgs) -> Result<Self, Report<ConfigError>> {
        let file = match &args.config {
            Some(path) => NodeConfigFile::load(path)?,
            None => NodeConfigFile::default(),
        };
        Self::from_sources(args, file)
    }

    pub fn from_sources(
        args: &DaemonArgs,
        file: NodeConfigFile,
    ) -> Result<Self, Report<ConfigError>> {
        let excluded_device_prefixes = match &args.excluded_device_prefixes {
            Some(prefixes) => split_prefixes(prefixes),
            None => file.excluded_device_prefixes.unwrap_or_else(|| {
                DEFAULT_EXCLUDED_PREFIXES
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            }),
        };

        let qos_priority = match args.qos_priority.as_deref().or(file.qos_priority.as_deref()) {
            Some(value) => QosPriority::parse(value)?,
            None => QosPriority::default(),
        };
        let failover_strategy = match args
            .failover_strategy
            .as_deref()
            .or(file.failover_strategy.as_deref())
        {
            Some(value) => FailoverStrategy::parse(value)?,
            None => FailoverStrategy::default(),
        };

        let settings = Self {
            qos_priority,
            edge_node_id: args
                .edge_node_id
                .clone()
                .or(file.edge_node_id)
                .unwrap_or_else(default_edge_node_id),
            enable_sriov: args.enable_sriov.or(file.enable_sriov).unwrap_or(true),
            enable_dpdk: args.enable_dpdk.or(file.enable_dpdk).unwrap_or(false),
            latency_threshold: args
                .latency_threshold_ms
                .or(file.latency_threshold_ms)
                .map_or(DEFAULT_LATENCY_THRESHOLD, Duration::from_millis),
            cloud_heartbeat: args
                .cloud_heartbeat_sec
                .or(file.cloud_heartbeat_sec)
                .map_or(DEFAULT_CLOUD_HEARTBEAT, Duration::from_secs),
            failover_strategy,
            kubeconfig: args
                .kubeconfig
                .clone()
                .filter(|path| !path.as_os_str().is_empty())
                .or(file.kubeconfig.filter(|path| !path.as_os_str().is_empty())),
            node_name: args.node_name.clone().or(file.node_name),
            k8s_namespace: args.k8s_namespace.clone().or(file.k8s_namespace),
            label_domain: args
                .label_domain
                .clone()
                .or(file.label_domain)
                .unwrap_or_else(|| DEFAULT_LABEL_DOMAIN.to_string()),
            poll_interval: args
                .poll_interval_secs
                .or(file.poll_interval_secs)
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs),
            shutdown_timeout: args
                .shutdown_timeout_secs
                .or(file.shutdown_timeout_secs)
                .map_or(DEFAULT_SHUTDOWN_TIMEOUT, Duration::from_secs),
            sysfs_root: args
                .sysfs_root
                .clone()
                .or(file.sysfs_root)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSFS_ROOT)),
            excluded_device_prefixes,
            interface_naming: args
                .interface_naming
                .or(file.interface_naming)
                .unwrap_or_default(),
            enable_api: args.enable_api.or(file.enable_api).unwrap_or(true),
            api_listen_addr: args
                .api_listen_addr
                .clone()
                .or(file.api_listen_addr)
                .unwrap_or_else(|| DEFAULT_API_LISTEN_ADDR.to_string()),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Report<ConfigError>> {
        if self.edge_node_id.trim().is_empty() {
            return Err(invalid("edge node id", "cannot be empty"));
        }
        if self.latency_threshold.is_zero() {
            return Err(invalid("latency threshold", "must be greater than 0"));
        }
        if self.cloud_heartbeat.is_zero() {
            return Err(invalid("cloud heartbeat interval", "must be greater than 0"));
        }
        if self.label_domain.trim().is_empty() {
            return Err(invalid("label domain", "cannot be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("poll interval", "must be greater than 0"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(invalid("shutdown timeout", "must be greater than 0"));
        }
        if self.enable_api && self.api_listen_addr.trim().is_empty() {
            return Err(invalid("api listen address", "cannot be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> Report<ConfigError> {
    Report::new(ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    })
}

/// `edge-<hostname>`, or `edge-<pid>` when the hostname is unavailable.
pub fn default_edge_node_id() -> String {
    match local_hostname() {
        Some(hostname) => format!("edge-{hostname}"),
        None => format!("edge-{}", std::process::id()),
    }
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn args() -> DaemonArgs {
        DaemonArgs {
            edge_node_id: Some("edge-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings = NodeSettings::from_sources(&args(), NodeConfigFile::default()).unwrap();

        assert_eq!(settings.edge_node_id, "edge-test");
        assert_eq!(settings.qos_priority, QosPriority::High);
        assert_eq!(settings.latency_threshold, Duration::from_millis(10));
        assert_eq!(settings.cloud_heartbeat, Duration::from_secs(30));
        assert_eq!(settings.failover_strategy, FailoverStrategy::Balanced);
        assert_eq!(settings.kubeconfig, None);
        assert!(settings.enable_sriov);
        assert!(!settings.enable_dpdk);
        assert_eq!(settings.poll_interval, Duration::from_secs(30));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(settings.label_domain, "akosrbn.io");
        assert_eq!(settings.sysfs_root, PathBuf::from("/sys"));
        assert_eq!(settings.excluded_device_prefixes, vec!["docker", "veth"]);
        assert_eq!(settings.interface_naming, NamingMode::Host);
        assert!(settings.enable_api);
        assert_eq!(settings.api_listen_addr, "0.0.0.0:8089");
    }

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let file: NodeConfigFile = serde_json::from_str(
            r#"{
                "edgeNodeId": "edge-file",
                "enableSRIOV": false,
                "pollIntervalSecs": 15,
                "labelDomain": "example.com",
                "excludedDevicePrefixes": [],
                "interfaceNaming": "convention"
            }"#,
        )
        .unwrap();
        let args = DaemonArgs {
            edge_node_id: Some("edge-cli".to_string()),
            poll_interval_secs: Some(5),
            ..Default::default()
        };

        let settings = NodeSettings::from_sources(&args, file).unwrap();

        assert_eq!(settings.edge_node_id, "edge-cli");
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert!(!settings.enable_sriov);
        assert_eq!(settings.label_domain, "example.com");
        assert!(settings.excluded_device_prefixes.is_empty());
        assert_eq!(settings.interface_naming, NamingMode::Convention);
    }

    #[test]
    fn cli_prefixes_are_comma_separated() {
        let args = DaemonArgs {
            excluded_device_prefixes: Some("docker, cni ,".to_string()),
            ..args()
        };

        let settings = NodeSettings::from_sources(&args, NodeConfigFile::default()).unwrap();
        assert_eq!(settings.excluded_device_prefixes, vec!["docker", "cni"]);
    }

    #[test]
    fn legacy_default_config_file_is_accepted() {
        let file: NodeConfigFile = serde_json::from_str(
            r#"{
                "qosPriority": "high",
                "edgeNodeId": "edge-x",
                "enableSRIOV": false,
                "enableDPDK": false,
                "latencyTreshold": 10,
                "cloudHeartbeatSec": 30,
                "failoverStrategy": "balanced",
                "kubeconfig": ""
            }"#,
        )
        .unwrap();

        let settings = NodeSettings::from_sources(&DaemonArgs::default(), file).unwrap();

        assert_eq!(settings.qos_priority, QosPriority::High);
        assert_eq!(settings.edge_node_id, "edge-x");
        assert!(!settings.enable_sriov);
        assert!(!settings.enable_dpdk);
        assert_eq!(settings.latency_threshold, Duration::from_millis(10));
        assert_eq!(settings.cloud_heartbeat, Duration::from_secs(30));
        assert_eq!(settings.failover_strategy, FailoverStrategy::Balanced);
        assert_eq!(settings.kubeconfig, None);
    }

    #[test]
    fn truly_unknown_file_keys_are_rejected() {
        let result = serde_json::from_str::<NodeConfigFile>(r#"{"qosPriorty": "high"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn legacy_values_parse_case_insensitively() {
        let file: NodeConfigFile = serde_json::from_str(
            r#"{"qosPriority": "Low", "failoverStrategy": "RELIABLE", "latencyThreshold": 25}"#,
        )
        .unwrap();
        let args = DaemonArgs {
            failover_strategy: Some("fast".to_string()),
            ..args()
        };

        let settings = NodeSettings::from_sources(&args, file).unwrap();

        assert_eq!(settings.qos_priority, QosPriority::Low);
        assert_eq!(settings.failover_strategy, FailoverStrategy::Fast);
        assert_eq!(settings.latency_threshold, Duration::from_millis(25));
    }

    #[test]
    fn invalid_qos_priority_is_rejected() {
        let args = DaemonArgs {
            qos_priority: Some("urgent".to_string()),
            ..args()
        };

        let err = NodeSettings::from_sources(&args, NodeConfigFile::default()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::Invalid {
                field: "qos priority",
                ..
            }
        ));
    }

    #[test]
    fn invalid_failover_strategy_is_rejected() {
        let file: NodeConfigFile =
            serde_json::from_str(r#"{"failoverStrategy": "eventual"}"#).unwrap();

        let err = NodeSettings::from_sources(&args(), file).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::Invalid {
                field: "failover strategy",
                ..
            }
        ));
    }

    #[test]
    fn zero_latency_threshold_is_invalid() {
        let args = DaemonArgs {
            latency_threshold_ms: Some(0),
            ..args()
        };

        let err = NodeSettings::from_sources(&args, NodeConfigFile::default()).unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::Invalid {
            field: "latency threshold",
            reason: "must be greater than 0".to_string(),
        });
    }

    #[test]
    fn zero_cloud_heartbeat_is_invalid() {
        let file: NodeConfigFile = serde_json::from_str(r#"{"cloudHeartbeatSec": 0}"#).unwrap();

        let err = NodeSettings::from_sources(&args(), file).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::Invalid {
                field: "cloud heartbeat interval",
                ..
            }
        ));
    }

    #[test]
    fn empty_cli_kubeconfig_falls_back_to_file() {
        let file = NodeConfigFile {
            kubeconfig: Some(PathBuf::from("/etc/kube/config")),
            ..Default::default()
        };
        let args = DaemonArgs {
            kubeconfig: Some(PathBuf::new()),
            ..args()
        };

        let settings = NodeSettings::from_sources(&args, file).unwrap();
        assert_eq!(settings.kubeconfig, Some(PathBuf::from("/etc/kube/config")));
    }

    #[test]
    fn zero_poll_interval_is_invalid() {
        let args = DaemonArgs {
            poll_interval_secs: Some(0),
            ..args()
        };

        let err = NodeSettings::from_sources(&args, NodeConfigFile::default()).unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::Invalid {
            field: "poll interval",
            reason: "must be greater than 0".to_string(),
        });
    }

    #[test]
    fn empty_edge_node_id_is_invalid() {
        let args = DaemonArgs {
            edge_node_id: Some("  ".to_string()),
            ..Default::default()
        };

        let err = NodeSettings::from_sources(&args, NodeConfigFile::default()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ConfigError::Invalid {
                field: "edge node id",
                ..
            }
        ));
    }

    #[test]
    fn default_edge_node_id_has_prefix() {
        let id = default_edge_node_id();
        assert!(id.starts_with("edge-"));
        assert!(id.len() > "edge-".len());
    }

    #[test]
    fn default_edge_node_id_uses_system_hostname() {
        let Some(name) = hostname::get().ok().and_then(|h| h.into_string().ok()) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        assert_eq!(default_edge_node_id(), format!("edge-{name}"));
    }

    #[test]
    fn resolve_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"edgeNodeId": "edge-file", "enableDPDK": true}"#).unwrap();

        let args = DaemonArgs {
            config: Some(path),
            ..Default::default()
        };
        let settings = NodeSettings::resolve(&args).unwrap();

        assert_eq!(settings.edge_node_id, "edge-file");
        assert!(settings.enable_dpdk);
    }

    #[test]
    fn resolve_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let args = DaemonArgs {
            config: Some(path.clone()),
            ..Default::default()
        };

        let err = NodeSettings::resolve(&args).unwrap_err();
        assert_eq!(err.current_context(), &ConfigError::ReadFile { path });
    }
}
