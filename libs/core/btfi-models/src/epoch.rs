// [libs/core/btfi-models/src/epoch.rs]
/*!
 * =================================================================
 * APARATO: EPOCH CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: FORMA SELLADA Y FIRMADA DE UN LOTE DE MUESTRAS
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::issuance::IssuanceRecord;
use crate::sample::SigningEnvelope;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EpochTime {
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FanPerformanceSummary {
    pub avg_cfm: f64,
    pub avg_power_w: f64,
    pub avg_rpm: f64,
    pub avg_efficiency_cfm_w: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AirQualitySummary {
    pub avg_tvoc_ppb: f64,
    pub avg_eco2_ppm: f64,
    pub avg_pm25_ugm3: f64,
    pub avg_temp_c: f64,
    pub avg_humidity_pct: f64,
    pub min_tvoc_ppb: f64,
    pub max_tvoc_ppb: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct MitigationSummary {
    pub total_tar_cfm_min: f64,
    pub total_energy_wh: f64,
    pub avg_voc_reduction_pct: f64,
}

/// Forma v1 anidada del resumen de epoch (spec.md §9 resuelve la
/// ambigüedad fuente a favor de esta forma; no hay fallback legacy plano).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EpochSummary {
    pub fan_performance: FanPerformanceSummary,
    pub air_quality: AirQualitySummary,
    pub mitigation: MitigationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Epoch {
    pub epoch_id: String,
    pub time: EpochTime,
    pub sample_count: usize,
    pub summary: EpochSummary,
    pub merkle_root: String,
    pub leaf_hashes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance: Option<IssuanceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing: Option<SigningEnvelope>,
}

impl Epoch {
    pub fn without_signing(&self) -> Epoch {
        let mut clone = self.clone();
        clone.signing = None;
        clone
    }

    /// `"btfi-" + start_hour (YYYYMMDDHH) + "-" + device_id`, deterministic
    /// per start-hour and device so re-emission of the same window upserts.
    pub fn derive_epoch_id(device_id: &str, start: chrono::DateTime<chrono::Utc>) -> String {
        format!("epoch-{}-{}", start.format("%Y%m%dT%H"), device_id)
    }
}
