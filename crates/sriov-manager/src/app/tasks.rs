use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiContext;
use crate::api::ApiServer;
use crate::app::core::Application;
use crate::sriov::HostDeviceState;
use crate::sriov::SriovManager;
use crate::sriov::WorkloadSource;

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, app: &Application) {
        if let Some(manager) = &app.services().manager {
            let manager_task = self.spawn_manager_task(manager.clone());
            self.tasks.push(manager_task);
        }

        let settings = app.settings();
        if settings.enable_api {
            let ctx = ApiContext {
                node: settings.edge_node_id.clone(),
                inventory: app.services().inventory.clone(),
            };
            let api_server_task = self.spawn_api_server_task(ctx, settings.api_listen_addr.clone());
            self.tasks.push(api_server_task);
        }
    }

    pub fn spawn_manager_task<H, W>(&self, manager: Arc<SriovManager<H, W>>) -> JoinHandle<()>
    where
        H: HostDeviceState + 'static,
        W: WorkloadSource + 'static,
    {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tracing::info!("Starting SR-IOV manager task");
            manager.run(token).await;
            tracing::info!("SR-IOV manager task completed");
        })
    }

    fn spawn_api_server_task(&self, ctx: ApiContext, listen_addr: String) -> JoinHandle<()> {
        let token = self.cancellation_token.clone();
        tokio::spawn(async move {
            let api_server = ApiServer::new(ctx, listen_addr);
            if let Err(e) = api_server.run(token).await {
                tracing::error!("API server failed: {e:?}");
            } else {
                tracing::info!("API server completed");
            }
        })
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self, shutdown_timeout: Duration) -> Result<()> {
        if self.tasks.is_empty() {
            tracing::warn!("No tasks to run");
            return Ok(());
        }

        let signal_handler = {
            use tokio::signal::unix::signal;
            use tokio::signal::unix::SignalKind;
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT, initiating graceful shutdown");
                    }
                }
            })
        };

        tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
            }
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, index, _remaining) = result;
                self.tasks.remove(index);
                match result {
                    Err(e) => tracing::error!("Task completed with error: {e}"),
                    Ok(()) => tracing::warn!("Task completed unexpectedly, shutting down"),
                }
            }
        }

        self.shutdown(shutdown_timeout).await;
        Ok(())
    }

    /// Cancels every task and waits for them, bounded by `timeout`.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        self.cancellation_token.cancel();
        join_with_timeout(std::mem::take(&mut self.tasks), timeout).await
    }
}

async fn join_with_timeout(tasks: Vec<JoinHandle<()>>, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Task failed during shutdown: {e}");
            }
        }
    })
    .await
    .map(|()| true)
    .unwrap_or_else(|_| {
        tracing::warn!("Task shutdown timed out after {:?}", timeout);
        false
    })
}
