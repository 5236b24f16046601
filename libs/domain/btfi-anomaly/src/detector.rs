// [libs/domain/btfi-anomaly/src/detector.rs]
/*!
 * =================================================================
 * APARATO: DETECTOR DE ANOMALÍAS (V1.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L3)
 * RESPONSABILIDAD: DETECCIÓN EN LÍNEA SOBRE UN FLUJO DE MUESTRAS
 *
 * Detector de un solo hilo, alimentado una muestra a la vez. La
 * actualización de baselines y ventanas ocurre *después* de detectar, de
 * modo que un único valor atípico no envenena instantáneamente las
 * estadísticas (spec.md §4.5).
 * =================================================================
 */

use std::collections::{HashSet, VecDeque};

use btfi_crypto::canon::sha256_hex;
use btfi_models::anomaly::{AnomalyKind, AnomalyReport, BaselineStats, Severity};
use btfi_models::sample::Sample;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::limits;
use crate::pressure::PressureBalanceTracker;

const FLATLINE_RUN_THRESHOLD: usize = 10;
const FLATLINE_EPSILON: f64 = 1e-3;
const SUDDEN_JUMP_SIGMA: f64 = 5.0;
const OUT_OF_RANGE_MIN_COUNT: u64 = 50;
const DEFAULT_REPLAY_WINDOW: usize = 1000;

#[derive(Debug, Default)]
struct FieldState {
    baseline: BaselineStats,
    last_value: Option<f64>,
    flatline_run: usize,
}

impl FieldState {
    /// Evaluates rules 1-4 for a single scalar field against its prior
    /// state, then folds `value` into that state.
    fn check_and_update(
        &mut self,
        field: &str,
        value: f64,
        hard_range: (f64, f64),
        sigma_threshold: f64,
        reports: &mut Vec<AnomalyReport>,
    ) {
        if !limits::in_range(value, hard_range) {
            reports.push(AnomalyReport {
                severity: Severity::Critical,
                kind: AnomalyKind::ImpossibleValue {
                    field: field.to_string(),
                    value,
                },
            });
        } else if self.baseline.count >= OUT_OF_RANGE_MIN_COUNT {
            let stddev = self.baseline.stddev();
            if stddev > 0.0 {
                let z = (value - self.baseline.mean).abs() / stddev;
                if z > sigma_threshold {
                    let severity = if z > 2.0 * sigma_threshold {
                        Severity::Critical
                    } else {
                        Severity::Warning
                    };
                    reports.push(AnomalyReport {
                        severity,
                        kind: AnomalyKind::OutOfRange {
                            field: field.to_string(),
                            value,
                            mean: self.baseline.mean,
                            stddev,
                        },
                    });
                }
            }
        }

        if let Some(last) = self.last_value {
            let stddev = self.baseline.stddev();
            if stddev > 0.0 && (value - last).abs() / stddev > SUDDEN_JUMP_SIGMA {
                reports.push(AnomalyReport {
                    severity: Severity::Warning,
                    kind: AnomalyKind::SuddenJump {
                        field: field.to_string(),
                        value,
                        last,
                        stddev,
                    },
                });
            }

            if (value - last).abs() < FLATLINE_EPSILON {
                self.flatline_run += 1;
            } else {
                self.flatline_run = 1;
            }
        } else {
            self.flatline_run = 1;
        }

        if self.flatline_run >= FLATLINE_RUN_THRESHOLD {
            reports.push(AnomalyReport {
                severity: Severity::Warning,
                kind: AnomalyKind::Flatline {
                    field: field.to_string(),
                    value,
                    run_length: self.flatline_run,
                },
            });
        }

        self.baseline.update(value);
        self.last_value = Some(value);
    }
}

pub struct AnomalyDetector {
    cfm: FieldState,
    rpm: FieldState,
    power_w: FieldState,
    tvoc_ppb: FieldState,
    eco2_ppm: FieldState,
    temp_c: FieldState,
    humidity_pct: FieldState,
    dp_pa: FieldState,
    recent_hashes: VecDeque<String>,
    recent_hash_set: HashSet<String>,
    replay_window: usize,
    watermark: Option<DateTime<Utc>>,
    pressure: PressureBalanceTracker,
    sigma_threshold: f64,
}

impl AnomalyDetector {
    pub fn new(sigma_threshold: f64) -> Self {
        Self {
            cfm: FieldState::default(),
            rpm: FieldState::default(),
            power_w: FieldState::default(),
            tvoc_ppb: FieldState::default(),
            eco2_ppm: FieldState::default(),
            temp_c: FieldState::default(),
            humidity_pct: FieldState::default(),
            dp_pa: FieldState::default(),
            recent_hashes: VecDeque::with_capacity(DEFAULT_REPLAY_WINDOW),
            recent_hash_set: HashSet::with_capacity(DEFAULT_REPLAY_WINDOW),
            replay_window: DEFAULT_REPLAY_WINDOW,
            watermark: None,
            pressure: PressureBalanceTracker::new(),
            sigma_threshold,
        }
    }

    pub fn with_sigma_threshold(&mut self, sigma_threshold: f64) {
        self.sigma_threshold = sigma_threshold;
    }

    /// Wires `pressure_imbalance_threshold_pa` (spec.md §4.12 extension)
    /// into the rule 8 tracker.
    pub fn with_pressure_imbalance_threshold_pa(&mut self, threshold_pa: f64) {
        self.pressure.set_threshold_pa(threshold_pa);
    }

    /// Restores persisted baselines across a restart (spec.md §4.11:
    /// "load persisted anomaly baselines" on orchestrator start).
    pub fn restore_baselines(&mut self, baselines: &TrackedBaselines) {
        self.cfm.baseline = baselines.cfm;
        self.rpm.baseline = baselines.rpm;
        self.power_w.baseline = baselines.power_w;
        self.tvoc_ppb.baseline = baselines.tvoc_ppb;
        self.eco2_ppm.baseline = baselines.eco2_ppm;
        self.temp_c.baseline = baselines.temp_c;
        self.humidity_pct.baseline = baselines.humidity_pct;
        self.dp_pa.baseline = baselines.dp_pa;
    }

    pub fn snapshot_baselines(&self) -> TrackedBaselines {
        TrackedBaselines {
            cfm: self.cfm.baseline,
            rpm: self.rpm.baseline,
            power_w: self.power_w.baseline,
            tvoc_ppb: self.tvoc_ppb.baseline,
            eco2_ppm: self.eco2_ppm.baseline,
            temp_c: self.temp_c.baseline,
            humidity_pct: self.humidity_pct.baseline,
            dp_pa: self.dp_pa.baseline,
        }
    }

    /// Evaluates all eight rules against `sample`, then folds its values
    /// into the running baselines, ring buffers, and replay window.
    pub fn detect(&mut self, sample: &Sample) -> Vec<AnomalyReport> {
        let mut reports = Vec::new();

        // Rules 5 & 6 read prior state before anything else mutates.
        if let Some(watermark) = self.watermark {
            if sample.timestamp <= watermark {
                reports.push(AnomalyReport {
                    severity: Severity::Critical,
                    kind: AnomalyKind::TimestampViolation {
                        timestamp: sample.timestamp,
                        watermark,
                    },
                });
            }
        }

        let content_hash = content_hash_of(sample);
        if self.recent_hash_set.contains(&content_hash) {
            reports.push(AnomalyReport {
                severity: Severity::Critical,
                kind: AnomalyKind::Replay {
                    payload_hash: content_hash.clone(),
                },
            });
        }

        // Rule 7: cross-sensor mismatch, evaluated on raw current values.
        let fan = &sample.fan;
        let mismatch = (fan.cfm > 10.0 && fan.power_w < 1.0)
            || (fan.cfm > 10.0 && fan.rpm < 100.0)
            || (fan.power_w > 5.0 && fan.rpm < 100.0)
            || (fan.power_w > 5.0 && fan.cfm / fan.power_w > 20.0);
        if mismatch {
            reports.push(AnomalyReport {
                severity: Severity::Warning,
                kind: AnomalyKind::CrossSensorMismatch {
                    description: format!(
                        "cfm={:.1} power_w={:.1} rpm={:.1}",
                        fan.cfm, fan.power_w, fan.rpm
                    ),
                },
            });
        }

        // Rules 1-4, per tracked field.
        let sigma = self.sigma_threshold;
        self.cfm
            .check_and_update("cfm", fan.cfm, limits::CFM_RANGE, sigma, &mut reports);
        self.rpm
            .check_and_update("rpm", fan.rpm, limits::RPM_RANGE, sigma, &mut reports);
        self.power_w.check_and_update(
            "power_w",
            fan.power_w,
            limits::POWER_W_RANGE,
            sigma,
            &mut reports,
        );
        let env = &sample.environment;
        self.tvoc_ppb.check_and_update(
            "tvoc_ppb",
            env.tvoc_ppb,
            limits::TVOC_PPB_RANGE,
            sigma,
            &mut reports,
        );
        self.eco2_ppm.check_and_update(
            "eco2_ppm",
            env.eco2_ppm,
            limits::ECO2_PPM_RANGE,
            sigma,
            &mut reports,
        );
        self.temp_c
            .check_and_update("temp_c", env.temp_c, limits::TEMP_C_RANGE, sigma, &mut reports);
        self.humidity_pct.check_and_update(
            "humidity_pct",
            env.humidity_pct,
            limits::HUMIDITY_PCT_RANGE,
            sigma,
            &mut reports,
        );
        self.dp_pa
            .check_and_update("dp_pa", env.dp_pa, limits::DP_PA_RANGE, sigma, &mut reports);

        // Rule 8 [NEW]: pressure imbalance, folded in as an additional
        // structural signal over the same stream. `dp_pa` rides on a
        // standard-atmosphere baseline to land in the tracker's expected
        // absolute hPa range; the tracker only ever compares deltas against
        // themselves, so the baseline's exact value doesn't matter.
        let fan_is_on = sample.pwm_percent > 0;
        if self.pressure.record(env.dp_pa / 100.0 + 1013.25, fan_is_on) {
            reports.push(AnomalyReport {
                severity: Severity::Warning,
                kind: AnomalyKind::PressureImbalance {
                    avg_delta_pa: env.dp_pa,
                    transitions: 0,
                },
            });
        }

        // Post-detection bookkeeping: watermark and replay window.
        if self.watermark.map_or(true, |w| sample.timestamp > w) {
            self.watermark = Some(sample.timestamp);
        }
        if self.recent_hashes.len() == self.replay_window {
            if let Some(oldest) = self.recent_hashes.pop_front() {
                self.recent_hash_set.remove(&oldest);
            }
        }
        self.recent_hashes.push_back(content_hash.clone());
        self.recent_hash_set.insert(content_hash);

        reports
    }
}

/// Content hash used for replay detection. Computed over the sensor
/// payload only (the sample is not yet signed at detection time per
/// spec.md §4.11's sensor-read → anomaly-check → sign ordering).
fn content_hash_of(sample: &Sample) -> String {
    let value = json!({
        "device_id": sample.device_id,
        "timestamp": sample.timestamp,
        "pwm_percent": sample.pwm_percent,
        "fan": sample.fan,
        "environment": sample.environment,
    });
    sha256_hex(value.to_string().as_bytes())
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct TrackedBaselines {
    pub cfm: BaselineStats,
    pub rpm: BaselineStats,
    pub power_w: BaselineStats,
    pub tvoc_ppb: BaselineStats,
    pub eco2_ppm: BaselineStats,
    pub temp_c: BaselineStats,
    pub humidity_pct: BaselineStats,
    pub dp_pa: BaselineStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::sample::{DerivedMetrics, EnvironmentReading, FanMetrics, StaleFlags};

    fn fixture_sample(seq: u64, offset_seconds: i64, cfm: f64) -> Sample {
        Sample {
            timestamp: chrono::DateTime::parse_from_rfc3339("2026-01-20T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
                + chrono::Duration::seconds(offset_seconds),
            monotonic_sequence: seq,
            device_id: "btfi-test".to_string(),
            pwm_percent: 50,
            fan: FanMetrics {
                cfm,
                rpm: 1500.0,
                power_w: 28.0,
                efficiency_cfm_w: cfm / 28.0,
            },
            environment: EnvironmentReading {
                tvoc_ppb: 200.0,
                eco2_ppm: 450.0,
                pm25_ugm3: 5.0,
                temp_c: 21.0,
                humidity_pct: 45.0,
                dp_pa: -1.0,
            },
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        }
    }

    #[test]
    fn impossible_value_is_flagged_regardless_of_baseline() {
        let mut detector = AnomalyDetector::new(3.0);
        let sample = fixture_sample(1, 0, 5000.0);
        let reports = detector.detect(&sample);
        assert!(reports.iter().any(|r| matches!(
            r.kind,
            AnomalyKind::ImpossibleValue { ref field, .. } if field == "cfm"
        )));
    }

    #[test]
    fn timestamp_violation_when_not_monotonic() {
        let mut detector = AnomalyDetector::new(3.0);
        detector.detect(&fixture_sample(1, 10, 250.0));
        let reports = detector.detect(&fixture_sample(2, 5, 250.0));
        assert!(reports
            .iter()
            .any(|r| matches!(r.kind, AnomalyKind::TimestampViolation { .. })));
    }

    #[test]
    fn replay_detects_identical_content() {
        let mut detector = AnomalyDetector::new(3.0);
        let mut a = fixture_sample(1, 0, 250.0);
        let b = fixture_sample(2, 10, 250.0);
        a.timestamp = b.timestamp;
        a.device_id = b.device_id.clone();
        detector.detect(&a);
        let reports = detector.detect(&a);
        assert!(reports
            .iter()
            .any(|r| matches!(r.kind, AnomalyKind::Replay { .. })));
    }

    #[test]
    fn flatline_fires_after_ten_identical_readings() {
        let mut detector = AnomalyDetector::new(3.0);
        let mut last_reports = Vec::new();
        for i in 0..12 {
            last_reports = detector.detect(&fixture_sample(i, i as i64 * 10, 250.0));
        }
        assert!(last_reports
            .iter()
            .any(|r| matches!(r.kind, AnomalyKind::Flatline { ref field, .. } if field == "cfm")));
    }

    #[test]
    fn cross_sensor_mismatch_when_cfm_high_power_low() {
        let mut detector = AnomalyDetector::new(3.0);
        let mut sample = fixture_sample(1, 0, 200.0);
        sample.fan.power_w = 0.5;
        let reports = detector.detect(&sample);
        assert!(reports
            .iter()
            .any(|r| matches!(r.kind, AnomalyKind::CrossSensorMismatch { .. })));
    }

    #[test]
    fn out_of_range_requires_warmed_up_baseline() {
        let mut detector = AnomalyDetector::new(3.0);
        for i in 0..60 {
            detector.detect(&fixture_sample(i, i as i64 * 10, 250.0));
        }
        let reports = detector.detect(&fixture_sample(61, 610, 600.0));
        assert!(reports
            .iter()
            .any(|r| matches!(r.kind, AnomalyKind::OutOfRange { ref field, .. } if field == "cfm")));
    }
}
