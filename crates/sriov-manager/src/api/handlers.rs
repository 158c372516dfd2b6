use std::sync::Arc;

use api_types::InventoryResponse;
use api_types::VfLookupResponse;
use api_types::VfReleaseResponse;
use api_types::WorkloadRef;
use poem::handler;
use poem::web::Data;
use poem::web::Json;
use poem::web::Path;
use tracing::info;
use tracing::warn;

use crate::sriov::VfInventory;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub node: String,
    pub inventory: Arc<VfInventory>,
}

/// List every VF known on this node
#[handler]
pub async fn list_vfs(ctx: Data<&ApiContext>) -> poem::Result<Json<InventoryResponse>> {
    let vfs = ctx.inventory.snapshot();
    let stats = ctx.inventory.stats();

    Ok(Json(InventoryResponse {
        node: ctx.node.clone(),
        stats,
        vfs,
    }))
}

/// Get the VF allocated to a pod
#[handler]
pub async fn get_vf_for_pod(
    Path((namespace, pod_name)): Path<(String, String)>,
    ctx: Data<&ApiContext>,
) -> poem::Result<Json<VfLookupResponse>> {
    let workload = WorkloadRef::new(&namespace, &pod_name);

    let Some(vf) = ctx.inventory.lookup(&workload) else {
        warn!(
            pod_name = %pod_name,
            namespace = %namespace,
            "No VF allocated to pod"
        );
        return Ok(Json(VfLookupResponse {
            success: false,
            data: None,
            message: format!("No VF allocated to pod {pod_name} in namespace {namespace}"),
        }));
    };

    Ok(Json(VfLookupResponse {
        success: true,
        message: format!("VF {} allocated to pod {pod_name}", vf.id),
        data: Some(vf),
    }))
}

/// Release a pod's VF without waiting for the next reconciliation
#[handler]
pub async fn release_vf(
    Path((namespace, pod_name)): Path<(String, String)>,
    ctx: Data<&ApiContext>,
) -> poem::Result<Json<VfReleaseResponse>> {
    let released = ctx
        .inventory
        .release(&WorkloadRef::new(&namespace, &pod_name));

    info!(
        pod_name = %pod_name,
        namespace = %namespace,
        released,
        "VF release requested"
    );

    let message = if released {
        format!("Released VF of pod {pod_name} in namespace {namespace}")
    } else {
        format!("No VF allocated to pod {pod_name} in namespace {namespace}")
    };
    Ok(Json(VfReleaseResponse { released, message }))
}
