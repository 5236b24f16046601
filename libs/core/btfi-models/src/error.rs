// [libs/core/btfi-models/src/error.rs]
/*!
 * =================================================================
 * APARATO: CORE ERROR TAXONOMY (V1.0)
 * CLASIFICACIÓN: DOMAIN CONTRACTS (ESTRATO L2)
 * RESPONSABILIDAD: CATALOGACIÓN UNIFICADA DE FALLOS DEL NÚCLEO
 *
 * Cada variante corresponde a un kind de la tabla de errores del
 * pipeline medida-a-evidencia. Las fallas locales (lectura de sensor,
 * reintentos de red) se resuelven dentro de cada componente y nunca
 * llegan hasta aquí; esta enumeración es la que cruza fronteras de
 * crate hacia el orquestador.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IDENTITY_UNAVAILABLE: {0}")]
    IdentityUnavailable(String),

    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),

    #[error("SENSOR_READ_FAILED: {0}")]
    SensorReadFailed(String),

    #[error("CANONICALIZATION_FAULT: {0}")]
    Canonicalization(String),

    #[error("NO_SIGNATURE: sample or epoch carries no signing envelope")]
    NoSignature,

    #[error("HASH_MISMATCH: recomputed payload hash does not match signing.payload_hash")]
    HashMismatch,

    #[error("BAD_SIGNATURE: signature does not verify under the supplied public key")]
    BadSignature,

    #[error("MERKLE_MISMATCH: recomputed merkle root does not match the epoch's merkle_root")]
    MerkleMismatch,

    #[error("VALIDATION_REJECTED: {0}")]
    ValidationRejected(String),

    #[error("NETWORK_TIMEOUT: {0}")]
    NetworkTimeout(String),

    #[error("NETWORK_ERROR: {0}")]
    NetworkError(String),

    #[error("HTTP_STATUS: server responded with status {0}")]
    HttpStatus(u16),

    #[error("BUFFER_FULL: offline buffer is at capacity")]
    BufferFull,

    #[error("CONFIG_REJECTED: {0}")]
    ConfigRejected(String),

    #[error("COMMAND_UNKNOWN: {0}")]
    CommandUnknown(String),

    #[error("PACK_BUILD_FAILED: {0}")]
    PackBuildFailed(String),

    #[error("UPLOAD_FAILED: {0}")]
    UploadFailed(String),
}
