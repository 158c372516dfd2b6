use std::path::PathBuf;

use clap::Parser;

use crate::sriov::NamingMode;

/// Daemon arguments. Unset values fall back to the config file, then to
/// built-in defaults (see [`NodeSettings`](crate::config::NodeSettings)).
#[derive(Parser, Clone, Debug, Default)]
pub struct DaemonArgs {
    #[arg(
        long,
        env = "NSM_CONFIG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to a JSON config file with camelCase keys"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "NSM_QOS_PRIORITY",
        help = "QoS class for prioritization: high, medium or low"
    )]
    pub qos_priority: Option<String>,

    #[arg(
        long,
        env = "NSM_EDGE_NODE_ID",
        help = "Edge node identifier (defaults to edge-<hostname>)"
    )]
    pub edge_node_id: Option<String>,

    #[arg(
        long,
        env = "NSM_ENABLE_SRIOV",
        help = "Enable SR-IOV VF management",
        action = clap::ArgAction::Set
    )]
    pub enable_sriov: Option<bool>,

    #[arg(
        long,
        env = "NSM_ENABLE_DPDK",
        help = "Enable the DPDK acceleration path (not implemented)",
        action = clap::ArgAction::Set
    )]
    pub enable_dpdk: Option<bool>,

    #[arg(
        long,
        env = "NSM_LATENCY_TRESHOLD",
        help = "Maximum latency threshold in milliseconds"
    )]
    pub latency_threshold_ms: Option<u64>,

    #[arg(
        long,
        env = "NSM_CLOUD_HEARTBEAT_SEC",
        help = "Cloud connectivity heartbeat interval in seconds"
    )]
    pub cloud_heartbeat_sec: Option<u64>,

    #[arg(
        long,
        env = "NSM_FAILOVER_STRATEGY",
        help = "Failover strategy: fast, balanced or reliable"
    )]
    pub failover_strategy: Option<String>,

    #[arg(
        long,
        env = "NSM_KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "NSM_NODE_NAME",
        help = "Node name for filtering pods to this node only"
    )]
    pub node_name: Option<String>,

    #[arg(
        long,
        env = "NSM_NAMESPACE",
        help = "Kubernetes namespace to list pods from (all namespaces when unset)"
    )]
    pub k8s_namespace: Option<String>,

    #[arg(
        long,
        env = "NSM_LABEL_DOMAIN",
        help = "Domain of the network.nsm.<domain>/sriov pod label, e.g. akosrbn.io"
    )]
    pub label_domain: Option<String>,

    #[arg(
        long,
        env = "NSM_POLL_INTERVAL_SECS",
        help = "Seconds between discovery and reconciliation passes"
    )]
    pub poll_interval_secs: Option<u64>,

    #[arg(
        long,
        env = "NSM_SHUTDOWN_TIMEOUT_SECS",
        help = "Seconds to wait for tasks to stop on shutdown"
    )]
    pub shutdown_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "NSM_SYSFS_ROOT",
        value_hint = clap::ValueHint::DirPath,
        help = "Root of the sysfs tree, e.g. /sys"
    )]
    pub sysfs_root: Option<PathBuf>,

    #[arg(
        long,
        env = "NSM_EXCLUDED_DEVICE_PREFIXES",
        help = "Comma-separated device name prefixes to skip during discovery (empty disables)"
    )]
    pub excluded_device_prefixes: Option<String>,

    #[arg(
        long,
        env = "NSM_INTERFACE_NAMING",
        help = "VF interface naming, either 'host' or 'convention'"
    )]
    pub interface_naming: Option<NamingMode>,

    #[arg(
        long,
        env = "NSM_ENABLE_API",
        help = "Enable the HTTP query API",
        action = clap::ArgAction::Set
    )]
    pub enable_api: Option<bool>,

    #[arg(
        long,
        env = "NSM_API_LISTEN_ADDR",
        help = "HTTP API server listen address, e.g. 0.0.0.0:8089"
    )]
    pub api_listen_addr: Option<String>,

    #[arg(
        long,
        env = "NSM_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}
