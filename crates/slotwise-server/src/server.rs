use std::sync::Arc;

use slotwise_service::AppointmentsService;
use slotwise_store::Database;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Slotwise JSON-RPC server.
pub struct SlotwiseServer {
    config: ServerConfig,
    service: Arc<AppointmentsService>,
}

impl SlotwiseServer {
    pub fn new(config: ServerConfig, db: Arc<dyn Database>) -> ServerResult<Self> {
        let service = AppointmentsService::new(db, config.service.clone())?;
        Ok(Self {
            config,
            service: Arc::new(service),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<AppointmentsService> {
        &self.service
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.service), &self.config)
    }

    /// Serve until the process is stopped.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "slotwise server listening");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
