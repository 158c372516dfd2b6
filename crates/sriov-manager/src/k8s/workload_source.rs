use api_types::WorkloadRef;
use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use tracing::debug;
use tracing::warn;

use super::types::KubernetesError;
use crate::sriov::error::WorkloadListError;
use crate::sriov::reconciler::WorkloadRequest;
use crate::sriov::workloads::WorkloadSource;

pub const DEFAULT_LABEL_DOMAIN: &str = "akosrbn.io";

/// Label marking a pod as requesting an SR-IOV VF.
pub fn sriov_label_key(domain: &str) -> String {
    format!("network.nsm.{domain}/sriov")
}

/// Lists SR-IOV requesting pods from the Kubernetes API.
pub struct KubeWorkloadSource {
    client: Client,
    namespace: Option<String>,
    node_name: Option<String>,
    label_key: String,
}

impl KubeWorkloadSource {
    pub fn new(client: Client, label_domain: &str) -> Self {
        Self {
            client,
            namespace: None,
            node_name: None,
            label_key: sriov_label_key(label_domain),
        }
    }

    /// Restricts listing to one namespace (all namespaces when `None`).
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Restricts listing to pods scheduled on `node_name`.
    pub fn with_node_name(mut self, node_name: Option<String>) -> Self {
        self.node_name = node_name;
        self
    }

    fn list_params(&self) -> ListParams {
        let params = ListParams::default().labels(&self.label_key);
        match &self.node_name {
            Some(node_name) => params.fields(&format!("spec.nodeName={node_name}")),
            None => params,
        }
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, Report<KubernetesError>> {
        let api: Api<Pod> = match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let pods = api
            .list(&self.list_params())
            .await
            .change_context(KubernetesError::ListFailed {
                message: format!("label selector {}", self.label_key),
            })?;
        Ok(pods.items)
    }
}

#[async_trait]
impl WorkloadSource for KubeWorkloadSource {
    #[tracing::instrument(skip(self), fields(namespace = ?self.namespace, node_name = ?self.node_name))]
    async fn list_requests(&self) -> Result<Vec<WorkloadRequest>, Report<WorkloadListError>> {
        let pods = self
            .list_pods()
            .await
            .change_context(WorkloadListError::ListFailed)?;

        debug!(pod_count = pods.len(), "Listed pods requesting SR-IOV");
        Ok(pods
            .iter()
            .filter_map(|pod| pod_to_request(pod, &self.label_key))
            .collect())
    }
}

/// Maps a listed pod to a workload request; unnamed pods are skipped.
pub(crate) fn pod_to_request(pod: &Pod, label_key: &str) -> Option<WorkloadRequest> {
    let metadata = &pod.metadata;
    let Some(name) = metadata.name.clone() else {
        warn!("Skipping pod without a name");
        return None;
    };
    let namespace = metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());

    let wants_acceleration = metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(label_key))
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

    let finished = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .is_some_and(|phase| matches!(phase, "Succeeded" | "Failed"));

    Some(WorkloadRequest {
        workload: WorkloadRef::new(namespace, name),
        wants_acceleration,
        terminating: metadata.deletion_timestamp.is_some() || finished,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::chrono::Utc;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sriov::inventory::test_support::vfs;
    use crate::sriov::reconcile;
    use crate::sriov::VfInventory;

    const LABEL: &str = "network.nsm.akosrbn.io/sriov";

    fn create_test_pod(name: &str, label_value: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(BTreeMap::from([(
                    LABEL.to_string(),
                    label_value.to_string(),
                )])),
                ..Default::default()
            },
            spec: None,
            status: None,
        }
    }

    #[test]
    fn label_key_uses_domain() {
        assert_eq!(sriov_label_key(DEFAULT_LABEL_DOMAIN), LABEL);
        assert_eq!(
            sriov_label_key("example.com"),
            "network.nsm.example.com/sriov"
        );
    }

    #[test]
    fn running_labelled_pod_requests_acceleration() {
        let request = pod_to_request(&create_test_pod("pod-a", "true"), LABEL).unwrap();

        assert_eq!(request, WorkloadRequest::new(WorkloadRef::new("default", "pod-a")));
    }

    #[test]
    fn label_value_is_case_insensitive() {
        let request = pod_to_request(&create_test_pod("pod-a", "True"), LABEL).unwrap();
        assert!(request.wants_acceleration);

        let request = pod_to_request(&create_test_pod("pod-a", "false"), LABEL).unwrap();
        assert!(!request.wants_acceleration);
    }

    #[test]
    fn relabelling_to_false_releases_vf() {
        let inventory = VfInventory::new();
        inventory.replace(vfs("eth0", 1));
        let owner = WorkloadRef::new("default", "pod-a");

        let requesting = pod_to_request(&create_test_pod("pod-a", "true"), LABEL).unwrap();
        reconcile(&inventory, &[requesting]);
        assert!(inventory.lookup(&owner).is_some());

        let withdrawn = pod_to_request(&create_test_pod("pod-a", "false"), LABEL).unwrap();
        let summary = reconcile(&inventory, &[withdrawn]);

        assert_eq!(summary.released.len(), 1);
        assert!(inventory.lookup(&owner).is_none());
    }

    #[test]
    fn deleted_pod_is_terminating() {
        let mut pod = create_test_pod("pod-a", "true");
        pod.metadata.deletion_timestamp = Some(Time(Utc::now()));

        assert!(pod_to_request(&pod, LABEL).unwrap().terminating);
    }

    #[test]
    fn finished_pod_is_terminating() {
        for (phase, terminating) in [
            ("Succeeded", true),
            ("Failed", true),
            ("Running", false),
            ("Pending", false),
        ] {
            let mut pod = create_test_pod("pod-a", "true");
            pod.status = Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });

            assert_eq!(
                pod_to_request(&pod, LABEL).unwrap().terminating,
                terminating,
                "phase {phase}"
            );
        }
    }

    #[test]
    fn pod_without_name_is_skipped() {
        let mut pod = create_test_pod("pod-a", "true");
        pod.metadata.name = None;

        assert_eq!(pod_to_request(&pod, LABEL), None);
    }

    #[test]
    fn pod_without_namespace_falls_back_to_default() {
        let mut pod = create_test_pod("pod-a", "true");
        pod.metadata.namespace = None;

        let request = pod_to_request(&pod, LABEL).unwrap();
        assert_eq!(request.workload, WorkloadRef::new("default", "pod-a"));
    }
}
