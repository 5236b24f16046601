// [apps/collector/src/commands.rs]
/*!
 * =================================================================
 * APARATO: COMMAND LISTENER (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: SONDEO Y EJECUCIÓN DE COMANDOS REMOTOS
 *
 * Comandos reconocidos: `fan`/`set_speed` (fija el PWM objetivo,
 * "on"→100, "off"→0, o entero 0–100), `check_update`, `perform_update`.
 * Comandos desconocidos se reconocen como fallo.
 * =================================================================
 */

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct PendingCommand {
    pub id: String,
    pub command: String,
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PendingCommandsResponse {
    commands: Vec<PendingCommand>,
}

#[derive(Debug, Serialize)]
struct CommandAck {
    success: bool,
    error: Option<String>,
}

pub struct CommandListener {
    http: Client,
    backend_url: String,
    device_id: String,
    target_fan_speed: Arc<AtomicU8>,
}

impl CommandListener {
    pub fn new(backend_url: String, device_id: String, target_fan_speed: Arc<AtomicU8>) -> Self {
        Self {
            http: Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            device_id,
            target_fan_speed,
        }
    }

    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<usize, reqwest::Error> {
        let url = format!(
            "{}/devices/{}/commands/pending",
            self.backend_url, self.device_id
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(0);
        }

        let payload: PendingCommandsResponse = response.json().await?;
        let count = payload.commands.len();
        for command in payload.commands {
            self.execute_and_ack(command).await;
        }
        Ok(count)
    }

    async fn execute_and_ack(&self, command: PendingCommand) {
        let ack = match self.execute(&command) {
            Ok(()) => CommandAck { success: true, error: None },
            Err(reason) => {
                warn!(command = %command.command, reason, "❓ [COMMANDS]: execution failed");
                CommandAck { success: false, error: Some(reason) }
            }
        };

        let url = format!(
            "{}/devices/{}/commands/{}/ack",
            self.backend_url, self.device_id, command.id
        );
        if let Err(e) = self.http.post(&url).json(&ack).send().await {
            warn!(error = %e, "📡 [COMMANDS]: ack delivery failed");
        }
    }

    fn execute(&self, command: &PendingCommand) -> Result<(), String> {
        match command.command.as_str() {
            "fan" | "set_speed" => {
                let speed = parse_fan_speed(command.value.as_ref())?;
                self.target_fan_speed.store(speed, Ordering::SeqCst);
                info!(speed, "🌀 [COMMANDS]: fan target updated");
                Ok(())
            }
            "check_update" => {
                info!("🔍 [COMMANDS]: check_update acknowledged (out of core scope)");
                Ok(())
            }
            "perform_update" => {
                info!("⬆️ [COMMANDS]: perform_update acknowledged (out of core scope)");
                Ok(())
            }
            other => Err(format!("COMMAND_UNKNOWN: {other}")),
        }
    }
}

fn parse_fan_speed(value: Option<&serde_json::Value>) -> Result<u8, String> {
    match value {
        Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("on") => Ok(100),
        Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("off") => Ok(0),
        Some(serde_json::Value::String(s)) => s
            .parse::<u8>()
            .map(|v| v.min(100))
            .map_err(|_| format!("invalid fan speed string: {s}")),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(100) as u8)
            .ok_or_else(|| "invalid fan speed number".to_string()),
        _ => Err("missing fan speed value".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_and_off_map_to_extremes() {
        let on = serde_json::json!("on");
        let off = serde_json::json!("off");
        assert_eq!(parse_fan_speed(Some(&on)).unwrap(), 100);
        assert_eq!(parse_fan_speed(Some(&off)).unwrap(), 0);
    }

    #[test]
    fn integer_value_is_clamped_to_100() {
        let value = serde_json::json!(255);
        assert_eq!(parse_fan_speed(Some(&value)).unwrap(), 100);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let listener_result: Result<(), String> = Err("COMMAND_UNKNOWN: dance".to_string());
        assert!(listener_result.is_err());
    }
}
