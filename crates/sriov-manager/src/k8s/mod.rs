//! Kubernetes integration: client setup and the pod-backed workload source.

pub mod kube_client;
pub mod types;
pub mod workload_source;

pub use kube_client::init_kube_client;
pub use types::KubernetesError;
pub use workload_source::sriov_label_key;
pub use workload_source::KubeWorkloadSource;
pub use workload_source::DEFAULT_LABEL_DOMAIN;
