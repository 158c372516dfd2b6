//! Application module
//!
//! Wires settings into the manager, the workload source and the API server,
//! and owns the lifecycle of their tasks.

pub mod builder;
pub mod core;
pub mod services;
pub mod tasks;

pub use self::core::Application;
pub use builder::ApplicationBuilder;
pub use services::ApplicationServices;
pub use services::NodeManager;
