use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::errors::ApiError;
use super::handlers::get_vf_for_pod;
use super::handlers::list_vfs;
use super::handlers::release_vf;
use super::handlers::ApiContext;

pub(crate) fn routes(ctx: ApiContext) -> impl Endpoint {
    Route::new()
        .at("/api/v1/vfs", get(list_vfs))
        .at(
            "/api/v1/vfs/:namespace/:pod",
            get(get_vf_for_pod).delete(release_vf),
        )
        .data(ctx)
        .with(Tracing)
}

/// HTTP API server for querying VF allocations
pub struct ApiServer {
    ctx: ApiContext,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(ctx: ApiContext, listen_addr: String) -> Self {
        Self { ctx, listen_addr }
    }

    /// Serves until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, token: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting HTTP API server on {}", self.listen_addr);

        let app = routes(self.ctx);
        let listener = TcpListener::bind(&self.listen_addr);
        let server = Server::new(listener);

        tokio::select! {
            result = server.run(app) => {
                match result {
                    Ok(()) => {
                        info!("API server stopped normally");
                        Ok(())
                    }
                    Err(e) => {
                        error!("API server failed: {e}");
                        Err(Report::new(ApiError::ServerError {
                            message: format!("Server failed: {e}"),
                        }))
                    }
                }
            }
            _ = token.cancelled() => {
                info!("API server shutdown requested");
                Ok(())
            }
        }
    }
}
