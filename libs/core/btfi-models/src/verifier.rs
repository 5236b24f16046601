// [libs/core/btfi-models/src/verifier.rs]
/*!
 * =================================================================
 * APARATO: VERIFIER SYNC CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: ESTADO OBSERVABLE DEL ENLACE CON EL VERIFICADOR
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifierSyncState {
    pub connection_state: ConnectionState,
    pub last_sample_sent: Option<chrono::DateTime<chrono::Utc>>,
    pub last_epoch_sent: Option<chrono::DateTime<chrono::Utc>>,
    pub samples_pending: usize,
    pub epochs_pending: usize,
    pub samples_sent_total: u64,
    pub epochs_sent_total: u64,
    pub retry_count: u32,
    pub next_retry: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
}

impl Default for VerifierSyncState {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            last_sample_sent: None,
            last_epoch_sent: None,
            samples_pending: 0,
            epochs_pending: 0,
            samples_sent_total: 0,
            epochs_sent_total: 0,
            retry_count: 0,
            next_retry: None,
            last_error: None,
        }
    }
}

/// Resultado de verificación recibido de un epoch drenado con éxito
/// durante un ciclo de sincronización en segundo plano.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationRecord {
    pub epoch_id: String,
    pub status: String,
    pub response_body: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}
