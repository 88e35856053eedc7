//! Hot-reloadable server tuning, modeled on the teacher's
//! `lobby::reload_config`: read a JSON file into an `RwLock`-guarded struct,
//! exposed through a `/reload` route so operators can retune a running
//! server without a restart. Unit master data stays embedded and is
//! intentionally not part of this — see `catalog.rs`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;

const CONFIG_PATH: &str = "ServerConfig.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub stage_length: f64,
    pub countdown_start: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            stage_length: battle_core::room::STAGE_LENGTH,
            countdown_start: 3,
        }
    }
}

/// Reloads `ServerConfig.json` if present; keeps the existing config and
/// logs a warning if the file is missing or malformed, since an operator
/// may simply not have customized it yet.
pub async fn reload_config(state: &Arc<crate::state::AppState>) -> Result<ServerConfig, String> {
    let content = fs::read_to_string(CONFIG_PATH)
        .await
        .map_err(|e| format!("failed to read {CONFIG_PATH}: {e}"))?;
    let parsed: ServerConfig =
        serde_json::from_str(&content).map_err(|e| format!("failed to parse {CONFIG_PATH}: {e}"))?;
    let mut guard = state.config.write().await;
    *guard = parsed.clone();
    Ok(parsed)
}
