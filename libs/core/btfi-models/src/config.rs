// [libs/core/btfi-models/src/config.rs]
/*!
 * =================================================================
 * APARATO: CONFIGURATION CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: ESQUEMA FIJO DE OPCIONES MUTABLES Y SU HISTORIAL
 *
 * El esquema escribible se enumera en tiempo de compilación (spec.md
 * §4.12): cada clave tiene un tipo, un rango u conjunto opcional y un
 * valor por defecto. `ConfigKey` es exhaustivo a propósito — agregar
 * una opción nueva es un cambio de código, no de datos.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    SampleIntervalSeconds,
    EpochDurationMinutes,
    VerifierUrl,
    SyncIntervalSeconds,
    EnableVerifierSync,
    DefaultFanSpeed,
    MaxFanSpeed,
    SimulationMode,
    VocAlertThresholdPpb,
    VocCriticalThresholdPpb,
    AnomalySigmaThreshold,
    EnableAnomalyDetection,
    LogLevel,
    /// [NEW] supplemented from original_source/evidence/pack_builder.py
    ObjectStorageBucket,
    /// [NEW] supplemented from original_source/evidence/pack_builder.py
    EvidencePackRetainLocal,
    /// [NEW] supplemented from original_source/sensors/pressure_balance.py
    PressureImbalanceThresholdPa,
    /// [NEW] governance-only; see DESIGN.md for the Open Question resolution
    TeamTokenEmissionCap,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::SampleIntervalSeconds => "sample_interval_seconds",
            ConfigKey::EpochDurationMinutes => "epoch_duration_minutes",
            ConfigKey::VerifierUrl => "verifier_url",
            ConfigKey::SyncIntervalSeconds => "sync_interval_seconds",
            ConfigKey::EnableVerifierSync => "enable_verifier_sync",
            ConfigKey::DefaultFanSpeed => "default_fan_speed",
            ConfigKey::MaxFanSpeed => "max_fan_speed",
            ConfigKey::SimulationMode => "simulation_mode",
            ConfigKey::VocAlertThresholdPpb => "voc_alert_threshold_ppb",
            ConfigKey::VocCriticalThresholdPpb => "voc_critical_threshold_ppb",
            ConfigKey::AnomalySigmaThreshold => "anomaly_sigma_threshold",
            ConfigKey::EnableAnomalyDetection => "enable_anomaly_detection",
            ConfigKey::LogLevel => "log_level",
            ConfigKey::ObjectStorageBucket => "object_storage_bucket",
            ConfigKey::EvidencePackRetainLocal => "evidence_pack_retain_local",
            ConfigKey::PressureImbalanceThresholdPa => "pressure_imbalance_threshold_pa",
            ConfigKey::TeamTokenEmissionCap => "team_token_emission_cap",
        }
    }

    /// Opciones que exigen un cambio de política económica y jamás se
    /// aceptan desde una fuente `Remote`/`Api`, aun con firma de operador
    /// confiable válida — sólo mutables localmente o por `Reset`.
    pub fn is_governance_only(&self) -> bool {
        matches!(self, ConfigKey::TeamTokenEmissionCap)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "str",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Local,
    Remote,
    Api,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigHistoryRecord {
    pub key: ConfigKey,
    pub old: Option<ConfigValue>,
    pub new: ConfigValue,
    pub source: ConfigSource,
    pub changed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigRejectReason {
    UnknownKey,
    TypeMismatch { expected: &'static str, got: &'static str },
    OutOfRange,
    NotInEnumeratedSet,
    UnsignedUpdateRejected,
    BadSignature,
    GovernanceOnly,
    NoOp,
}

impl std::fmt::Display for ConfigRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigRejectReason::UnknownKey => write!(f, "unknown configuration key"),
            ConfigRejectReason::TypeMismatch { expected, got } => {
                write!(f, "expected type {expected}, got {got}")
            }
            ConfigRejectReason::OutOfRange => write!(f, "value outside the allowed numeric range"),
            ConfigRejectReason::NotInEnumeratedSet => write!(f, "value not in the enumerated set"),
            ConfigRejectReason::UnsignedUpdateRejected => {
                write!(f, "unsigned update rejected: a trusted operator key is configured")
            }
            ConfigRejectReason::BadSignature => write!(f, "update signature did not verify"),
            ConfigRejectReason::GovernanceOnly => {
                write!(f, "key is governance-only and cannot be changed remotely")
            }
            ConfigRejectReason::NoOp => write!(f, "new value equals old value, no history recorded"),
        }
    }
}
