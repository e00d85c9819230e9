use std::future::Future;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::cors::cors_layer;
use crate::error::{NayaError, Result};
use crate::provisioning::{self, AdminState};
use crate::relay::{naya_chat, RelayState};

pub const VERSION: &str = env!("NAYA_GIT_SHA");

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayState,
    pub admin: Option<AdminState>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self> {
        let admin = config
            .backend
            .as_ref()
            .map(AdminState::from_backend)
            .transpose()?;
        Ok(Self {
            relay: RelayState::new(config)?,
            admin,
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/naya-chat", post(naya_chat))
        .with_state(state.relay);
    if let Some(admin) = state.admin {
        router = router.merge(provisioning::routes(admin));
    }
    router.layer(middleware::from_fn(cors_layer))
}

/// Serves on an already-bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| NayaError::Runtime(e.to_string()))
}

pub async fn run_with_shutdown<F>(config: Config, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| NayaError::Runtime(format!("bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| NayaError::Runtime(e.to_string()))?;
    tracing::info!(
        addr = %local,
        provisioning = state.admin.is_some(),
        version = VERSION,
        "naya relay listening"
    );
    serve_listener(listener, state, shutdown).await
}

pub async fn run(config: Config, addr: &str) -> Result<()> {
    run_with_shutdown(config, addr, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    })
    .await
}
