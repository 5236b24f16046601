// [apps/collector/src/simulator.rs]
/*!
 * =================================================================
 * APARATO: SIMULATED SENSOR SOURCE (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: ENTORNO VIRTUAL PARA EJECUCIÓN HEADLESS/PRUEBAS
 *
 * VOC sigue una línea base con ruido configurado y eventos de pico
 * raros; un mayor CFM reduce el VOC hacia la base a una tasa
 * proporcional a `cfm / cfm_max`.
 *
 * `dp_pa` es una señal barométrica independiente del CFM (ruido propio
 * más un corrimiento cuando el ventilador está encendido), no una
 * función determinista de `fan.cfm` — de lo contrario la regla 8
 * (desbalance de presión) nunca podría activarse.
 * =================================================================
 */

use btfi_models::prelude::{EnvironmentReading, StaleFlags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fan::FanInterpolator;
use crate::sensor::SensorSource;

#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    pub voc_baseline_ppb: f64,
    pub voc_noise_ppb: f64,
    pub voc_spike_probability: f64,
    pub voc_spike_magnitude_ppb: f64,
    pub cfm_max: f64,
    pub eco2_baseline_ppm: f64,
    pub pm25_baseline_ugm3: f64,
    pub temp_baseline_c: f64,
    pub humidity_baseline_pct: f64,
    /// Sustained `dp_pa` shift (Pa) applied while the fan runs, on top of
    /// independent noise — negative mimics a building that bleeds negative
    /// pressure under exhaust (spec.md §4.5 rule 8).
    pub pressure_shift_pa: f64,
    pub pressure_noise_pa: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            voc_baseline_ppb: 150.0,
            voc_noise_ppb: 15.0,
            voc_spike_probability: 0.01,
            voc_spike_magnitude_ppb: 600.0,
            cfm_max: 400.0,
            eco2_baseline_ppm: 450.0,
            pm25_baseline_ugm3: 8.0,
            temp_baseline_c: 21.0,
            humidity_baseline_pct: 45.0,
            pressure_shift_pa: -3.0,
            pressure_noise_pa: 0.3,
        }
    }
}

pub struct SimulatedSensorSource {
    config: SimulatorConfig,
    rng: StdRng,
    current_voc_ppb: f64,
}

impl SimulatedSensorSource {
    pub fn new(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            current_voc_ppb: config.voc_baseline_ppb,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn step_voc(&mut self, cfm: f64) -> f64 {
        let noise = self.rng.gen_range(-self.config.voc_noise_ppb..=self.config.voc_noise_ppb);
        let mut voc = self.current_voc_ppb + noise;

        if self.rng.gen_bool(self.config.voc_spike_probability) {
            voc += self.config.voc_spike_magnitude_ppb;
        }

        let reduction_rate = (cfm / self.config.cfm_max).clamp(0.0, 1.0);
        voc -= (voc - self.config.voc_baseline_ppb) * reduction_rate * 0.2;

        self.current_voc_ppb = voc.max(0.0);
        self.current_voc_ppb
    }
}

impl SensorSource for SimulatedSensorSource {
    fn read(&mut self, pwm_percent: u8) -> (EnvironmentReading, StaleFlags) {
        let fan = FanInterpolator::new(crate::fan::FanCurveConfig {
            cfm_max: self.config.cfm_max,
            ..Default::default()
        })
        .metrics(pwm_percent);

        let tvoc_ppb = self.step_voc(fan.cfm);
        let eco2_ppm = self.config.eco2_baseline_ppm + self.rng.gen_range(-10.0..=10.0);
        let pm25_ugm3 = (self.config.pm25_baseline_ugm3 + self.rng.gen_range(-2.0..=2.0)).max(0.0);
        let temp_c = self.config.temp_baseline_c + self.rng.gen_range(-0.5..=0.5);
        let humidity_pct = self.config.humidity_baseline_pct + self.rng.gen_range(-3.0..=3.0);
        let noise = self
            .rng
            .gen_range(-self.config.pressure_noise_pa..=self.config.pressure_noise_pa);
        let dp_pa = if pwm_percent > 0 {
            self.config.pressure_shift_pa + noise
        } else {
            noise
        };

        (
            EnvironmentReading {
                tvoc_ppb,
                eco2_ppm,
                pm25_ugm3,
                temp_c,
                humidity_pct,
                dp_pa,
            },
            StaleFlags::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_cfm_pulls_voc_toward_baseline_faster() {
        let config = SimulatorConfig {
            voc_noise_ppb: 0.0,
            voc_spike_probability: 0.0,
            ..SimulatorConfig::default()
        };

        let mut low_fan = SimulatedSensorSource::new(config, 1);
        low_fan.current_voc_ppb = 800.0;
        let (low_reading, _) = low_fan.read(0);

        let mut high_fan = SimulatedSensorSource::new(config, 1);
        high_fan.current_voc_ppb = 800.0;
        let (high_reading, _) = high_fan.read(100);

        assert!(high_reading.tvoc_ppb < low_reading.tvoc_ppb);
    }

    #[test]
    fn simulated_reads_never_mark_stale() {
        let mut source = SimulatedSensorSource::new(SimulatorConfig::default(), 7);
        let (_, flags) = source.read(50);
        assert!(!flags.environment_stale);
        assert!(!flags.fan_stale);
    }
}
