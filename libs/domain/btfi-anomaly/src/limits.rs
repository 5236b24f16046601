// [libs/domain/btfi-anomaly/src/limits.rs]
/*!
 * APARATO: LÍMITES ABSOLUTOS (V1.0)
 * RESPONSABILIDAD: RANGOS FÍSICOS DE CADA CAMPO RASTREADO (regla 1, §4.5)
 */

/// Hard physical bounds per tracked field: `(min, max)`. A reading outside
/// its bound is a critical `ImpossibleValue`, regardless of baseline state.
pub const CFM_RANGE: (f64, f64) = (0.0, 1000.0);
pub const RPM_RANGE: (f64, f64) = (0.0, 5000.0);
pub const POWER_W_RANGE: (f64, f64) = (0.0, 200.0);
pub const TVOC_PPB_RANGE: (f64, f64) = (0.0, 10_000.0);
pub const ECO2_PPM_RANGE: (f64, f64) = (200.0, 10_000.0);
pub const TEMP_C_RANGE: (f64, f64) = (-20.0, 60.0);
pub const HUMIDITY_PCT_RANGE: (f64, f64) = (0.0, 100.0);
pub const DP_PA_RANGE: (f64, f64) = (-500.0, 500.0);

pub fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value >= min && value <= max
}
