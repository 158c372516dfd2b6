//! HTTP API for node-local collaborators
//!
//! # API Endpoints
//!
//! - `GET /api/v1/vfs` - Whole VF inventory of this node
//! - `GET /api/v1/vfs/:namespace/:pod` - VF allocated to a pod
//! - `DELETE /api/v1/vfs/:namespace/:pod` - Release a pod's VF ahead of reconciliation

pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::ApiError;
pub use handlers::ApiContext;
pub use server::ApiServer;
