use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use log::error;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::sync::Mutex;

use modemtrace::controller::{CurrentState, ModemController, ModemError};
use modemtrace::modem_config::{CustomConfig, PredefinedConfig};

use crate::config::Config;

pub struct ServerState {
    pub config: Config,
    /// One modem, one controller. The lock spans a whole multi-command
    /// exchange so reads and applies never interleave on the AT channel.
    pub controller: Mutex<ModemController<File>>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub config: PredefinedConfig,
    #[serde(default)]
    pub custom: CustomConfig,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub applied: PredefinedConfig,
    pub reboot_needed: bool,
}

fn error_response(err: ModemError) -> (StatusCode, String) {
    let status = match &err {
        ModemError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        ModemError::Plan(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("modem operation failed: {err}");
    (status, err.to_string())
}

pub async fn get_state(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<CurrentState>, (StatusCode, String)> {
    let mut controller = state.controller.lock().await;
    let current = controller.read_current().await.map_err(error_response)?;
    Ok(Json(current))
}

pub async fn apply_config(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, (StatusCode, String)> {
    let mut controller = state.controller.lock().await;
    controller
        .apply(request.config, request.custom)
        .await
        .map_err(error_response)?;
    Ok(Json(ApplyResponse {
        applied: request.config,
        reboot_needed: controller.reboot_needed(),
    }))
}

pub async fn generate_coredump(
    State(state): State<Arc<ServerState>>,
) -> Result<(), (StatusCode, String)> {
    let mut controller = state.controller.lock().await;
    controller.generate_coredump().await.map_err(error_response)
}

pub async fn restart_modem(
    State(state): State<Arc<ServerState>>,
) -> Result<(), (StatusCode, String)> {
    let mut controller = state.controller.lock().await;
    controller.restart_modem().await.map_err(error_response)
}
