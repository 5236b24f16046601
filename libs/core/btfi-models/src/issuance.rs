// [libs/core/btfi-models/src/issuance.rs]
/*!
 * =================================================================
 * APARATO: ISSUANCE CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: FORMA DE SALIDA DEL CÁLCULO DE EMISIÓN DE TOKENS
 *
 * Definido aquí (y no en btfi-issuance) para que tanto el ensamblador
 * de epochs como el empacador de evidencia puedan referenciar el tipo
 * sin depender del crate de dominio que lo calcula.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventValidity {
    Valid,
    InvalidFanOff,
    InvalidVocLow,
    InvalidVocHigh,
    InvalidData,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EventSummary {
    pub sample_count: usize,
    pub cfm_avg: f64,
    pub power_avg: f64,
    pub tvoc_avg: f64,
    pub minutes: f64,
    pub tar_event: f64,
    pub energy_event: f64,
    pub efficiency: f64,
    pub validity: EventValidity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct IssuanceSplit {
    pub total_tokens: f64,
    pub to_facilities: f64,
    pub to_verifiers: f64,
    pub to_treasury: f64,
    pub to_team: f64,
    pub team_cap_reached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuanceRecord {
    pub total_events: usize,
    pub valid_events: usize,
    pub total_tar_cfm_min: f64,
    pub quality_factor: f64,
    pub avg_efficiency_cfm_w: f64,
    pub eef: f64,
    pub ei: f64,
    pub tokens_base: f64,
    pub tokens_after_quality: f64,
    pub tokens_issued: f64,
    pub bcai_scalar: f64,
    pub base_rate: f64,
    pub split: IssuanceSplit,
}
