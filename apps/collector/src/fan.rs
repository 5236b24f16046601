// [apps/collector/src/fan.rs]
/*!
 * =================================================================
 * APARATO: FAN INTERPOLATOR (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: CURVA PWM → (CFM, RPM, WATTS, EFICIENCIA)
 *
 * Sin estado. Interpolación lineal a trozos entre anclas fijas
 * `0,10,20,…,100`, sobre tres curvas independientes escaladas por los
 * máximos configurados.
 * =================================================================
 */

use btfi_models::prelude::FanMetrics;

const ANCHOR_COUNT: usize = 11;

/// Curva normalizada en `[0,1]` en cada uno de los 11 anclajes de PWM.
/// Forma monótona creciente, suavemente cóncava, representativa de un
/// ventilador axial típico.
const NORMALIZED_CURVE: [f64; ANCHOR_COUNT] = [
    0.00, 0.11, 0.22, 0.34, 0.47, 0.58, 0.69, 0.79, 0.88, 0.95, 1.00,
];

#[derive(Debug, Clone, Copy)]
pub struct FanCurveConfig {
    pub cfm_max: f64,
    pub rpm_max: f64,
    pub power_max_w: f64,
}

impl Default for FanCurveConfig {
    fn default() -> Self {
        Self {
            cfm_max: 400.0,
            rpm_max: 2400.0,
            power_max_w: 48.0,
        }
    }
}

pub struct FanInterpolator {
    config: FanCurveConfig,
}

impl FanInterpolator {
    pub fn new(config: FanCurveConfig) -> Self {
        Self { config }
    }

    /// Mapea un duty-cycle PWM (recortado a `[0,100]`) a métricas de
    /// ventilador. Sin modos de fallo.
    pub fn metrics(&self, pwm_percent: u8) -> FanMetrics {
        let pwm = (pwm_percent as f64).clamp(0.0, 100.0);
        let unit = interpolate(&NORMALIZED_CURVE, pwm);

        let cfm = unit * self.config.cfm_max;
        let rpm = unit * self.config.rpm_max;
        let power_w = unit * self.config.power_max_w;
        let efficiency_cfm_w = if power_w > 0.0 { cfm / power_w } else { 0.0 };

        FanMetrics {
            cfm,
            rpm,
            power_w,
            efficiency_cfm_w,
        }
    }
}

/// Interpolación lineal a trozos sobre anclas espaciadas cada 10 unidades.
fn interpolate(curve: &[f64; ANCHOR_COUNT], x: f64) -> f64 {
    let step = 10.0;
    let lower_index = ((x / step).floor() as usize).min(ANCHOR_COUNT - 2);
    let upper_index = lower_index + 1;

    let x0 = lower_index as f64 * step;
    let x1 = upper_index as f64 * step;
    let y0 = curve[lower_index];
    let y1 = curve[upper_index];

    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }

    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pwm_yields_zero_everything() {
        let interpolator = FanInterpolator::new(FanCurveConfig::default());
        let metrics = interpolator.metrics(0);
        assert_eq!(metrics.cfm, 0.0);
        assert_eq!(metrics.rpm, 0.0);
        assert_eq!(metrics.power_w, 0.0);
        assert_eq!(metrics.efficiency_cfm_w, 0.0);
    }

    #[test]
    fn full_pwm_yields_configured_maxima() {
        let config = FanCurveConfig::default();
        let interpolator = FanInterpolator::new(config);
        let metrics = interpolator.metrics(100);
        assert!((metrics.cfm - config.cfm_max).abs() < 1e-9);
        assert!((metrics.rpm - config.rpm_max).abs() < 1e-9);
        assert!((metrics.power_w - config.power_max_w).abs() < 1e-9);
    }

    #[test]
    fn midpoint_matches_the_anchor_exactly() {
        let config = FanCurveConfig::default();
        let interpolator = FanInterpolator::new(config);
        let metrics = interpolator.metrics(50);
        let expected_cfm = NORMALIZED_CURVE[5] * config.cfm_max;
        assert!((metrics.cfm - expected_cfm).abs() < 1e-9);
    }

    #[test]
    fn inputs_above_100_are_clamped() {
        let interpolator = FanInterpolator::new(FanCurveConfig::default());
        let clamped = interpolator.metrics(100);
        let over = interpolator.metrics(255);
        assert_eq!(clamped.cfm, over.cfm);
    }

    #[test]
    fn interpolation_is_monotonic_in_pwm() {
        let interpolator = FanInterpolator::new(FanCurveConfig::default());
        let mut last_cfm = -1.0;
        for pwm in 0..=100u8 {
            let metrics = interpolator.metrics(pwm);
            assert!(metrics.cfm >= last_cfm);
            last_cfm = metrics.cfm;
        }
    }
}
