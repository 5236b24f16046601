// [apps/collector/src/sensor.rs]
/*!
 * =================================================================
 * APARATO: SENSOR SOURCE (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: UNA LECTURA AMBIENTAL POR TICK, REAL O SIMULADA
 *
 * Contrato único `read(pwm)`: una lectura fallida repite el último
 * valor conocido y marca `stale` en vez de propagar un error.
 * =================================================================
 */

use btfi_models::prelude::{EnvironmentReading, StaleFlags};
use tracing::warn;

pub trait SensorSource: Send {
    fn read(&mut self, pwm_percent: u8) -> (EnvironmentReading, StaleFlags);
}

/// Lectura física vía I2C u otro bus; la implementación de acceso a
/// hardware es un colaborador externo inyectado aquí.
pub trait PhysicalReadCallable: Send {
    fn try_read(&mut self) -> Option<EnvironmentReading>;
}

pub struct PhysicalSensorSource<R: PhysicalReadCallable> {
    reader: R,
    last_known_good: EnvironmentReading,
}

impl<R: PhysicalReadCallable> PhysicalSensorSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            last_known_good: EnvironmentReading::default(),
        }
    }
}

impl<R: PhysicalReadCallable> SensorSource for PhysicalSensorSource<R> {
    fn read(&mut self, _pwm_percent: u8) -> (EnvironmentReading, StaleFlags) {
        match self.reader.try_read() {
            Some(reading) => {
                self.last_known_good = reading;
                (reading, StaleFlags::default())
            }
            None => {
                warn!("🌫️ [SENSOR]: physical read failed, repeating last-known-good");
                (
                    self.last_known_good,
                    StaleFlags {
                        environment_stale: true,
                        fan_stale: false,
                    },
                )
            }
        }
    }
}
