// [libs/core/btfi-models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MODELS DOMAIN HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT DEL CONTRATO DE DATOS (ESTRATO L2)
 * RESPONSABILIDAD: RE-EXPORTACIÓN NOMINAL DE LOS TIPOS COMPARTIDOS
 * =================================================================
 */

pub mod anomaly;
pub mod config;
pub mod epoch;
pub mod error;
pub mod evidence;
pub mod identity;
pub mod issuance;
pub mod sample;
pub mod verifier;

pub mod prelude {
    pub use crate::anomaly::{AnomalyKind, AnomalyReport, AnomalySummary, BaselineStats, Severity};
    pub use crate::config::{
        ConfigHistoryRecord, ConfigKey, ConfigRejectReason, ConfigSource, ConfigValue,
    };
    pub use crate::epoch::{
        AirQualitySummary, Epoch, EpochSummary, EpochTime, FanPerformanceSummary,
        MitigationSummary,
    };
    pub use crate::error::CoreError;
    pub use crate::evidence::{EvidencePack, EvidencePackMetadata, LeafHashesDocument, SamplesDocument};
    pub use crate::identity::{CryptographyBlock, DeviceIdentitySnapshot, HardwareBlock, RegistrationBlock};
    pub use crate::issuance::{EventSummary, EventValidity, IssuanceRecord, IssuanceSplit};
    pub use crate::sample::{DerivedMetrics, EnvironmentReading, FanMetrics, Sample, SigningEnvelope, StaleFlags};
    pub use crate::verifier::{ConnectionState, VerificationRecord, VerifierSyncState};
}
