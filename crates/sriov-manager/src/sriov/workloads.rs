//! Source of the live workload list consumed by reconciliation.

use std::sync::Mutex;

use async_trait::async_trait;
use error_stack::Report;

use super::error::WorkloadListError;
use super::reconciler::WorkloadRequest;

/// Lists workloads carrying the SR-IOV capability marker.
///
/// Implementations perform external I/O and are always called without the
/// inventory lock held.
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    async fn list_requests(&self) -> Result<Vec<WorkloadRequest>, Report<WorkloadListError>>;
}

/// Workload list held in memory, replaced wholesale by its owner.
///
/// Used by tests and by tooling that drives reconciliation without a cluster.
#[derive(Debug, Default)]
pub struct StaticWorkloadSource {
    requests: Mutex<Vec<WorkloadRequest>>,
    failure: Mutex<Option<String>>,
}

impl StaticWorkloadSource {
    pub fn new(requests: Vec<WorkloadRequest>) -> Self {
        Self {
            requests: Mutex::new(requests),
            failure: Mutex::new(None),
        }
    }

    /// Replaces the listed workloads and clears any injected failure.
    pub fn set(&self, requests: Vec<WorkloadRequest>) {
        *self.requests.lock().expect("poisoned") = requests;
        *self.failure.lock().expect("poisoned") = None;
    }

    /// Makes subsequent listings fail with `reason` until the next [`set`](Self::set).
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().expect("poisoned") = Some(reason.into());
    }
}

#[async_trait]
impl WorkloadSource for StaticWorkloadSource {
    async fn list_requests(&self) -> Result<Vec<WorkloadRequest>, Report<WorkloadListError>> {
        if let Some(reason) = self.failure.lock().expect("poisoned").clone() {
            return Err(Report::new(WorkloadListError::ListFailed).attach_printable(reason));
        }
        Ok(self.requests.lock().expect("poisoned").clone())
    }
}
