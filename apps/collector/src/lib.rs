// [apps/collector/src/lib.rs]
/*!
 * =================================================================
 * APARATO: COLLECTOR APPLICATION HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L4)
 * RESPONSABILIDAD: RE-EXPORTACIÓN DE LOS MÓDULOS DE LA APLICACIÓN
 * =================================================================
 */

pub mod commands;
pub mod config;
pub mod fan;
pub mod orchestrator;
pub mod sensor;
pub mod simulator;

pub mod prelude {
    pub use crate::commands::{CommandListener, PendingCommand};
    pub use crate::config::{ConfigRegistry, ConfigUpdateBody, RangeConstraint, SignedConfigUpdate};
    pub use crate::fan::{FanCurveConfig, FanInterpolator};
    pub use crate::orchestrator::{load_baselines, save_baselines, CollectorOrchestrator, OrchestratorConfig};
    pub use crate::sensor::{PhysicalReadCallable, PhysicalSensorSource, SensorSource};
    pub use crate::simulator::{SimulatedSensorSource, SimulatorConfig};
}
