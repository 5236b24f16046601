// [libs/core/btfi-models/src/identity.rs]
/*!
 * =================================================================
 * APARATO: IDENTITY SNAPSHOT CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: INSTANTÁNEA DE IDENTIDAD PARA EMPAQUES DE EVIDENCIA
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HardwareBlock {
    pub platform: String,
    pub simulation_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CryptographyBlock {
    pub key_algorithm: String,
    pub public_key_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationBlock {
    pub device_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Realiza el `identity.json` de disco (spec.md §6) enriquecido con los
/// bloques de hardware/criptografía/registro que requiere el empaque de
/// evidencia (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceIdentitySnapshot {
    pub hardware: HardwareBlock,
    pub cryptography: CryptographyBlock,
    pub registration: RegistrationBlock,
}
