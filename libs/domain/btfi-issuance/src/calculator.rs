// [libs/domain/btfi-issuance/src/calculator.rs]
/*!
 * =================================================================
 * APARATO: CALCULADORA DE EMISIÓN DE TOKENS (V1.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L3)
 * RESPONSABILIDAD: FUNCIÓN DETERMINISTA DE EMISIÓN SOBRE UN EPOCH
 *
 * Sin modos de falla (spec.md §4.8): la configuración inválida se
 * rechaza en `IssuanceConfig::validate`, nunca en el cómputo. El único
 * estado mutable es el acumulado de tokens de equipo entregados, que
 * gobierna el recorte por `team_cap` entre epochs sucesivos.
 * =================================================================
 */

use btfi_models::issuance::{EventSummary, EventValidity, IssuanceRecord, IssuanceSplit};
use btfi_models::sample::Sample;
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IssuanceConfig {
    pub samples_per_event: usize,
    pub sample_interval_seconds: f64,
    pub cfm_min: f64,
    pub voc_gating_enabled: bool,
    pub voc_min_ppb: f64,
    pub voc_max_ppb: f64,
    pub base_rate: f64,
    pub baseline_efficiency_cfm_w: f64,
    pub ei_min: f64,
    pub ei_max: f64,
    pub bcai_scalar: f64,
    pub split_facilities: f64,
    pub split_verifiers: f64,
    pub split_treasury: f64,
    pub split_team: f64,
    pub team_cap: f64,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            samples_per_event: 60,
            sample_interval_seconds: 12.0,
            cfm_min: 10.0,
            voc_gating_enabled: false,
            voc_min_ppb: 0.0,
            voc_max_ppb: 10_000.0,
            base_rate: 0.001,
            baseline_efficiency_cfm_w: 9.0,
            ei_min: 0.8,
            ei_max: 1.2,
            bcai_scalar: 1.0,
            split_facilities: 0.75,
            split_verifiers: 0.05,
            split_treasury: 0.10,
            split_team: 0.10,
            team_cap: f64::INFINITY,
        }
    }
}

impl IssuanceConfig {
    /// The four splits must sum to 1.0 (spec.md §4.8). Checked at config
    /// load time, never at compute time.
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.split_facilities + self.split_verifiers + self.split_treasury + self.split_team;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(format!("issuance splits must sum to 1.0, got {sum}"));
        }
        if self.samples_per_event == 0 {
            return Err("samples_per_event must be > 0".to_string());
        }
        Ok(())
    }
}

pub struct IssuanceCalculator {
    config: IssuanceConfig,
    team_tokens_issued_total: f64,
}

impl IssuanceCalculator {
    pub fn new(config: IssuanceConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            team_tokens_issued_total: 0.0,
        })
    }

    pub fn team_tokens_issued_total(&self) -> f64 {
        self.team_tokens_issued_total
    }

    /// Groups `samples` into events of exactly `samples_per_event` (the
    /// last partial group still counts if non-empty), scores each event,
    /// then computes the epoch-level issuance record.
    #[instrument(skip_all)]
    pub fn calculate(&mut self, samples: &[Sample]) -> IssuanceRecord {
        let events: Vec<EventSummary> = samples
            .chunks(self.config.samples_per_event)
            .map(|chunk| self.score_event(chunk))
            .collect();
        self.compute_epoch_level(&events)
    }

    fn score_event(&self, chunk: &[Sample]) -> EventSummary {
        if chunk.is_empty() {
            return EventSummary {
                sample_count: 0,
                cfm_avg: 0.0,
                power_avg: 0.0,
                tvoc_avg: 0.0,
                minutes: 0.0,
                tar_event: 0.0,
                energy_event: 0.0,
                efficiency: 0.0,
                validity: EventValidity::InvalidData,
            };
        }

        let n = chunk.len() as f64;
        let cfm_avg = chunk.iter().map(|s| s.fan.cfm).sum::<f64>() / n;
        let power_avg = chunk.iter().map(|s| s.fan.power_w).sum::<f64>() / n;
        let tvoc_avg = chunk.iter().map(|s| s.environment.tvoc_ppb).sum::<f64>() / n;
        let minutes = n * self.config.sample_interval_seconds / 60.0;
        let tar_event = cfm_avg * minutes;
        let energy_event = power_avg * (minutes / 60.0);
        let efficiency = if power_avg > 0.0 { cfm_avg / power_avg } else { 0.0 };

        let validity = if cfm_avg < self.config.cfm_min {
            EventValidity::InvalidFanOff
        } else if self.config.voc_gating_enabled && tvoc_avg < self.config.voc_min_ppb {
            EventValidity::InvalidVocLow
        } else if self.config.voc_gating_enabled && tvoc_avg > self.config.voc_max_ppb {
            EventValidity::InvalidVocHigh
        } else {
            EventValidity::Valid
        };

        EventSummary {
            sample_count: chunk.len(),
            cfm_avg,
            power_avg,
            tvoc_avg,
            minutes,
            tar_event,
            energy_event,
            efficiency,
            validity,
        }
    }

    /// Epoch-level aggregation over already-scored events (spec.md §4.8
    /// "Epoch-level" bullets). Exposed directly so callers holding
    /// pre-aggregated totals (e.g. a test fixture matching spec.md §8 S3)
    /// can drive the split/team-cap logic without re-deriving events from
    /// raw samples.
    pub fn compute_epoch_level(&mut self, events: &[EventSummary]) -> IssuanceRecord {
        let total_events = events.len();
        let valid_events: Vec<&EventSummary> =
            events.iter().filter(|e| e.validity == EventValidity::Valid).collect();
        let valid_event_count = valid_events.len();

        let total_tar: f64 = valid_events.iter().map(|e| e.tar_event).sum();
        let quality_factor = if total_events == 0 {
            0.0
        } else {
            valid_event_count as f64 / total_events as f64
        };

        let efficiencies: Vec<f64> = valid_events
            .iter()
            .map(|e| e.efficiency)
            .filter(|&eff| eff > 0.0)
            .collect();
        let avg_efficiency = if efficiencies.is_empty() {
            0.0
        } else {
            efficiencies.iter().sum::<f64>() / efficiencies.len() as f64
        };

        let eef = if self.config.baseline_efficiency_cfm_w > 0.0 {
            avg_efficiency / self.config.baseline_efficiency_cfm_w
        } else {
            0.0
        };
        let ei = eef.clamp(self.config.ei_min, self.config.ei_max);

        let tokens_base = self.config.base_rate * ei * total_tar;
        let tokens_after_quality = tokens_base * quality_factor;
        let tokens_issued = if self.config.bcai_scalar > 0.0 {
            tokens_after_quality / self.config.bcai_scalar
        } else {
            0.0
        };

        let split = self.split_tokens(tokens_issued);

        info!(
            total_events,
            valid_event_count,
            tokens_issued,
            team_cap_reached = split.team_cap_reached,
            "🪙 [ISSUANCE]: Epoch scored"
        );

        IssuanceRecord {
            total_events,
            valid_events: valid_event_count,
            total_tar_cfm_min: total_tar,
            quality_factor,
            avg_efficiency_cfm_w: avg_efficiency,
            eef,
            ei,
            tokens_base,
            tokens_after_quality,
            tokens_issued,
            bcai_scalar: self.config.bcai_scalar,
            base_rate: self.config.base_rate,
            split,
        }
    }

    fn split_tokens(&mut self, tokens_issued: f64) -> IssuanceSplit {
        let facilities = tokens_issued * self.config.split_facilities;
        let verifiers = tokens_issued * self.config.split_verifiers;
        let mut treasury = tokens_issued * self.config.split_treasury;
        let team_share_raw = tokens_issued * self.config.split_team;

        let remaining_allowance = (self.config.team_cap - self.team_tokens_issued_total).max(0.0);
        let (team, team_cap_reached) = if self.team_tokens_issued_total + team_share_raw > self.config.team_cap {
            let overflow = team_share_raw - remaining_allowance;
            treasury += overflow;
            (remaining_allowance, true)
        } else {
            (team_share_raw, false)
        };

        self.team_tokens_issued_total += team;

        IssuanceSplit {
            total_tokens: tokens_issued,
            to_facilities: facilities,
            to_verifiers: verifiers,
            to_treasury: treasury,
            to_team: team,
            team_cap_reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round6(v: f64) -> f64 {
        (v * 1_000_000.0).round() / 1_000_000.0
    }

    #[test]
    fn rejects_splits_that_do_not_sum_to_one() {
        let mut config = IssuanceConfig::default();
        config.split_team = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reference_token_split_matches_documented_defaults() {
        let config = IssuanceConfig::default();
        let mut calculator = IssuanceCalculator::new(config).unwrap();

        let event = EventSummary {
            sample_count: 60,
            cfm_avg: 0.0,
            power_avg: 0.0,
            tvoc_avg: 0.0,
            minutes: 0.0,
            tar_event: 21540.0,
            energy_event: 0.0,
            efficiency: 3.78,
            validity: EventValidity::Valid,
        };

        let record = calculator.compute_epoch_level(&[event]);

        assert!((record.ei - 0.8).abs() < 1e-9);
        assert!((record.tokens_issued - 17.232).abs() < 1e-9);
        assert_eq!(round6(record.split.to_facilities), 12.924);
        assert_eq!(round6(record.split.to_verifiers), 0.8616);
        assert_eq!(round6(record.split.to_treasury), 1.7232);
        assert_eq!(round6(record.split.to_team), 1.7232);
        assert!(!record.split.team_cap_reached);
    }

    #[test]
    fn split_always_sums_to_tokens_issued() {
        let config = IssuanceConfig::default();
        let mut calculator = IssuanceCalculator::new(config).unwrap();
        let event = EventSummary {
            sample_count: 60,
            cfm_avg: 300.0,
            power_avg: 30.0,
            tvoc_avg: 150.0,
            minutes: 12.0,
            tar_event: 3600.0,
            energy_event: 6.0,
            efficiency: 10.0,
            validity: EventValidity::Valid,
        };
        let record = calculator.compute_epoch_level(&[event]);
        let summed = record.split.to_facilities
            + record.split.to_verifiers
            + record.split.to_treasury
            + record.split.to_team;
        assert!((summed - record.tokens_issued).abs() < 1e-9);
    }

    #[test]
    fn team_cap_overflow_routes_to_treasury() {
        let mut config = IssuanceConfig::default();
        config.team_cap = 1.0;
        let mut calculator = IssuanceCalculator::new(config).unwrap();

        let event = EventSummary {
            sample_count: 60,
            cfm_avg: 0.0,
            power_avg: 0.0,
            tvoc_avg: 0.0,
            minutes: 0.0,
            tar_event: 21540.0,
            energy_event: 0.0,
            efficiency: 3.78,
            validity: EventValidity::Valid,
        };
        let record = calculator.compute_epoch_level(&[event]);

        assert!(record.split.team_cap_reached);
        assert_eq!(record.split.to_team, 1.0);
        assert!(calculator.team_tokens_issued_total() <= 1.0 + 1e-9);
        let summed = record.split.to_facilities
            + record.split.to_verifiers
            + record.split.to_treasury
            + record.split.to_team;
        assert!((summed - record.tokens_issued).abs() < 1e-9);
    }

    #[test]
    fn fan_off_event_is_invalid_and_excluded_from_tar() {
        let config = IssuanceConfig::default();
        let mut calculator = IssuanceCalculator::new(config).unwrap();
        let event = EventSummary {
            sample_count: 60,
            cfm_avg: 2.0,
            power_avg: 1.0,
            tvoc_avg: 100.0,
            minutes: 12.0,
            tar_event: 24.0,
            energy_event: 0.2,
            efficiency: 2.0,
            validity: EventValidity::InvalidFanOff,
        };
        let record = calculator.compute_epoch_level(&[event]);
        assert_eq!(record.valid_events, 0);
        assert_eq!(record.total_tar_cfm_min, 0.0);
        assert_eq!(record.quality_factor, 0.0);
    }

    #[test]
    fn score_event_from_raw_samples_groups_into_fixed_size_events() {
        use btfi_models::sample::{DerivedMetrics, EnvironmentReading, FanMetrics, StaleFlags};

        let mut config = IssuanceConfig::default();
        config.samples_per_event = 2;
        let mut calculator = IssuanceCalculator::new(config).unwrap();

        let make = |cfm: f64| Sample {
            timestamp: "2026-01-20T12:00:00Z".parse().unwrap(),
            monotonic_sequence: 0,
            device_id: "btfi-test".into(),
            pwm_percent: 80,
            fan: FanMetrics {
                cfm,
                rpm: 1500.0,
                power_w: 30.0,
                efficiency_cfm_w: cfm / 30.0,
            },
            environment: EnvironmentReading::default(),
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        };

        let samples = vec![make(300.0), make(300.0), make(300.0)];
        let record = calculator.calculate(&samples);
        assert_eq!(record.total_events, 2);
    }
}
