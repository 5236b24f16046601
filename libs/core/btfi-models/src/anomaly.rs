// [libs/core/btfi-models/src/anomaly.rs]
/*!
 * =================================================================
 * APARATO: ANOMALY CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: TIPOS COMPARTIDOS DEL DETECTOR DE ANOMALÍAS
 * =================================================================
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    ImpossibleValue { field: String, value: f64 },
    OutOfRange { field: String, value: f64, mean: f64, stddev: f64 },
    SuddenJump { field: String, value: f64, last: f64, stddev: f64 },
    Flatline { field: String, value: f64, run_length: usize },
    TimestampViolation { timestamp: chrono::DateTime<chrono::Utc>, watermark: chrono::DateTime<chrono::Utc> },
    Replay { payload_hash: String },
    CrossSensorMismatch { description: String },
    PressureImbalance { avg_delta_pa: f64, transitions: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyReport {
    pub severity: Severity,
    pub kind: AnomalyKind,
}

/// Resumen embebido en la muestra para que el verificador remoto pueda
/// adjudicar sin re-ejecutar el detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnomalySummary {
    pub report_count: usize,
    pub highest_severity: Option<Severity>,
    pub reports: Vec<AnomalyReport>,
}

impl AnomalySummary {
    pub fn from_reports(reports: Vec<AnomalyReport>) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let highest_severity = reports.iter().map(|r| r.severity).max();
        Some(Self {
            report_count: reports.len(),
            highest_severity,
            reports,
        })
    }
}

/// Estadísticas en línea de Welford para un campo rastreado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BaselineStats {
    pub count: u64,
    pub mean: f64,
    pub m2: f64,
    pub min: f64,
    pub max: f64,
}

impl BaselineStats {
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count as f64 - 1.0)
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_matches_naive_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut stats = BaselineStats::default();
        for v in values {
            stats.update(v);
        }
        let naive_mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert!((stats.mean - naive_mean).abs() < 1e-9);
        // population-adjacent sample variance, computed naively for comparison
        let naive_var: f64 = values.iter().map(|v| (v - naive_mean).powi(2)).sum::<f64>()
            / (values.len() as f64 - 1.0);
        assert!((stats.variance() - naive_var).abs() < 1e-9);
    }
}
