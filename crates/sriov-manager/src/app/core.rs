use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::tasks::Tasks;
use crate::config::NodeSettings;

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    settings: NodeSettings,
}

impl Application {
    pub fn new(services: ApplicationServices, settings: NodeSettings) -> Self {
        Self { services, settings }
    }

    pub fn services(&self) -> &ApplicationServices {
        &self.services
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new();
        tasks.spawn_all_tasks(self);

        if let Err(e) = tasks.wait_for_completion(self.settings.shutdown_timeout).await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }

    /// Gracefully shutdown application
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application...");

        let stats = self.services.inventory.stats();
        tracing::info!(
            total = stats.total,
            allocated = stats.allocated,
            "Final VF inventory"
        );

        tracing::info!("Application shutdown completed");
        Ok(())
    }
}
