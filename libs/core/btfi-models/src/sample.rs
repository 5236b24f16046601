// [libs/core/btfi-models/src/sample.rs]
/*!
 * =================================================================
 * APARATO: SAMPLE CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: REGISTRO INMUTABLE DE UNA LECTURA DE TICK
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalySummary;

/// Envoltura de firma adjunta a una muestra o un epoch. La presencia de
/// `signing` obliga al invariante: recalcular el hash canónico del
/// documento con `signing` removido debe coincidir con `payload_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningEnvelope {
    pub device_id: String,
    /// Formato `"ed25519:" + hex(bytes)`.
    pub public_key: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload_hash: String,
    /// Formato `"ed25519:" + hex(bytes)`.
    pub signature: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FanMetrics {
    pub cfm: f64,
    pub rpm: f64,
    pub power_w: f64,
    pub efficiency_cfm_w: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentReading {
    pub tvoc_ppb: f64,
    pub eco2_ppm: f64,
    pub pm25_ugm3: f64,
    pub temp_c: f64,
    pub humidity_pct: f64,
    pub dp_pa: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DerivedMetrics {
    pub tar_cfm_min: f64,
    pub energy_wh: f64,
    pub voc_reduction_pct: f64,
}

/// Flags de frescura por campo, emitidos cuando el sensor físico falla
/// y se repite el último valor conocido.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StaleFlags {
    pub environment_stale: bool,
    pub fan_stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Secuencia monótona local, respaldo cuando el reloj de pared no
    /// garantiza monotonía (ver spec.md §9 Open Questions).
    pub monotonic_sequence: u64,
    pub device_id: String,
    pub pwm_percent: u8,
    pub fan: FanMetrics,
    pub environment: EnvironmentReading,
    pub derived: DerivedMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<AnomalySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing: Option<SigningEnvelope>,
    #[serde(default, skip_serializing_if = "is_default_stale_flags")]
    pub stale: StaleFlags,
}

fn is_default_stale_flags(f: &StaleFlags) -> bool {
    *f == StaleFlags::default()
}

impl Sample {
    /// Devuelve una copia sin la envoltura de firma, lista para
    /// canonicalizar y re-firmar.
    pub fn without_signing(&self) -> Sample {
        let mut clone = self.clone();
        clone.signing = None;
        clone
    }
}
