// [libs/domain/btfi-anomaly/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ANOMALY DOMAIN HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DETECCIÓN EN LÍNEA SOBRE EL FLUJO DE MUESTRAS
 * =================================================================
 */

pub mod detector;
pub mod limits;
pub mod pressure;

pub mod prelude {
    pub use crate::detector::{AnomalyDetector, TrackedBaselines};
    pub use crate::pressure::PressureBalanceTracker;
}
