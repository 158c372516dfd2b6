use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::services::NodeManager;
use crate::app::Application;
use crate::config::NodeSettings;
use crate::k8s::init_kube_client;
use crate::k8s::KubeWorkloadSource;
use crate::sriov::validate_capabilities;
use crate::sriov::DeviceFilter;
use crate::sriov::DeviceProber;
use crate::sriov::ManagerSettings;
use crate::sriov::SysfsDeviceState;
use crate::sriov::VfInventory;

/// Application builder
pub struct ApplicationBuilder {
    settings: NodeSettings,
}

impl ApplicationBuilder {
    pub fn new(settings: NodeSettings) -> Self {
        Self { settings }
    }

    /// Build complete application
    pub async fn build(self) -> Result<Application> {
        tracing::info!(
            edge_node_id = %self.settings.edge_node_id,
            qos_priority = %self.settings.qos_priority,
            failover_strategy = %self.settings.failover_strategy,
            latency_threshold = ?self.settings.latency_threshold,
            cloud_heartbeat = ?self.settings.cloud_heartbeat,
            "Building application components..."
        );

        if self.settings.enable_dpdk {
            tracing::warn!("DPDK support is not implemented, continuing with SR-IOV only");
        }

        let services = if self.settings.enable_sriov {
            let manager = Arc::new(self.create_manager().await?);
            ApplicationServices {
                inventory: manager.inventory(),
                manager: Some(manager),
            }
        } else {
            tracing::info!("SR-IOV support disabled");
            ApplicationServices {
                manager: None,
                inventory: Arc::new(VfInventory::new()),
            }
        };

        Ok(Application::new(services, self.settings))
    }

    async fn create_manager(&self) -> Result<NodeManager> {
        let settings = &self.settings;

        match validate_capabilities(&settings.sysfs_root) {
            Ok(devices) => {
                tracing::info!(device_count = devices.len(), "SR-IOV capable devices found");
            }
            Err(e) => {
                tracing::warn!("SR-IOV capability check failed, continuing: {e:?}");
            }
        }

        let client = init_kube_client(settings.kubeconfig.as_deref())
            .await
            .map_err(|e| anyhow::anyhow!("{e:?}"))
            .context("failed to initialize Kubernetes client")?;

        let workloads = KubeWorkloadSource::new(client, &settings.label_domain)
            .with_namespace(settings.k8s_namespace.clone())
            .with_node_name(settings.node_name.clone());

        let prober = DeviceProber::new(SysfsDeviceState::new(&settings.sysfs_root))
            .with_filter(DeviceFilter::new(
                settings.excluded_device_prefixes.iter().cloned(),
            ))
            .with_resolver(settings.interface_naming.resolver());

        Ok(NodeManager::new(
            prober,
            workloads,
            ManagerSettings {
                poll_interval: settings.poll_interval,
            },
        ))
    }
}
