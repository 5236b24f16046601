// [libs/domain/btfi-epoch/src/assembler.rs]
/*!
 * =================================================================
 * APARATO: ENSAMBLADOR DE EPOCHS (V1.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L3)
 * RESPONSABILIDAD: VENTANEO DE MUESTRAS Y SELLADO DE UN EPOCH
 *
 * Dueño exclusivo del buffer de epoch en curso.
 * Closure is a literal wall-clock delta (spec.md §4.7: "if
 * `sample.timestamp − start_time ≥ epoch_duration`, close the epoch"),
 * not a sample-count proxy — tick overrun and inter-sample drift
 * (spec.md §4.11's "no catch-up bursts") are expected to legitimately
 * stretch or compress the number of samples a window holds.
 *
 * The firma (paso 5) y el cálculo de emisión (paso 6) no viven aquí:
 * este crate sólo depende de btfi-crypto/btfi-models, así que el
 * orquestador llama a `btfi_crypto::signer::sign` y a `btfi_issuance`
 * sobre el `ClosedEpochBatch` devuelto por `push`/`force_close`.
 * =================================================================
 */

use btfi_crypto::canon::{sha256_hex, strip_underscore_prefixed};
use btfi_models::epoch::{Epoch, EpochTime};
use btfi_models::sample::Sample;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use crate::merkle::merkle_root;
use crate::summary::summarize;

/// An epoch sealed off the in-progress buffer, paired with its raw
/// samples (the evidence pack and the issuance calculator both need the
/// samples themselves, not just the epoch document).
pub struct ClosedEpochBatch {
    pub epoch: Epoch,
    pub samples: Vec<Sample>,
}

struct OpenEpoch {
    start_time: DateTime<Utc>,
    samples: Vec<Sample>,
}

pub struct EpochAssembler {
    device_id: String,
    epoch_duration: Duration,
    open: Option<OpenEpoch>,
}

impl EpochAssembler {
    pub fn new(device_id: String, epoch_duration: Duration) -> Self {
        Self {
            device_id,
            epoch_duration,
            open: None,
        }
    }

    pub fn has_open_epoch(&self) -> bool {
        self.open.is_some()
    }

    /// Appends `sample` to the in-progress epoch, opening one if none is
    /// active. Returns a sealed batch once `sample.timestamp − start_time
    /// ≥ epoch_duration` (spec.md §4.7 step 1, literal wall-clock rule).
    #[instrument(skip_all, fields(device_id = %self.device_id))]
    pub fn push(&mut self, sample: Sample) -> Option<ClosedEpochBatch> {
        let start_time = match &self.open {
            Some(open) => open.start_time,
            None => sample.timestamp,
        };

        let elapsed = sample.timestamp - start_time;
        let open = self.open.get_or_insert_with(|| OpenEpoch {
            start_time,
            samples: Vec::new(),
        });
        open.samples.push(sample);

        if elapsed >= self.epoch_duration {
            return Some(self.close());
        }
        None
    }

    /// Closes any open epoch with `>= 1` sample regardless of elapsed
    /// duration — used on shutdown so no buffered samples are lost
    /// (spec.md §4.7 "On abrupt shutdown").
    pub fn force_close(&mut self) -> Option<ClosedEpochBatch> {
        match &self.open {
            Some(open) if !open.samples.is_empty() => Some(self.close()),
            _ => None,
        }
    }

    fn close(&mut self) -> ClosedEpochBatch {
        let open = self.open.take().expect("close called with an open epoch");
        let start = open.start_time;
        let end = open.samples.last().map(|s| s.timestamp).unwrap_or(start);
        let duration_minutes = (end - start).num_seconds() as f64 / 60.0;

        let leaf_hashes: Vec<String> = open.samples.iter().map(leaf_hash_of).collect();
        let merkle_root_hex = merkle_root(&leaf_hashes);
        let summary = summarize(&open.samples);
        let sample_count = open.samples.len();

        let epoch = Epoch {
            epoch_id: Epoch::derive_epoch_id(&self.device_id, start),
            time: EpochTime {
                start,
                end,
                duration_minutes,
            },
            sample_count,
            summary,
            merkle_root: merkle_root_hex,
            leaf_hashes,
            issuance: None,
            signing: None,
        };

        info!(epoch_id = %epoch.epoch_id, sample_count, "📦 [EPOCH]: Window sealed");

        ClosedEpochBatch {
            epoch,
            samples: open.samples,
        }
    }
}

/// Leaf hash for one sample (spec.md §4.7 step 2): canonicalize with any
/// `_`-prefixed fields stripped, then SHA-256.
fn leaf_hash_of(sample: &Sample) -> String {
    let value = serde_json::to_value(sample).expect("sample serializes to JSON");
    let cleaned = strip_underscore_prefixed(value);
    let bytes = serde_json::to_vec(&cleaned).expect("cleaned value serializes to bytes");
    sha256_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::sample::{DerivedMetrics, EnvironmentReading, FanMetrics, StaleFlags};

    fn sample_at(seconds_offset: i64) -> Sample {
        Sample {
            timestamp: "2026-01-20T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
                + Duration::seconds(seconds_offset),
            monotonic_sequence: seconds_offset as u64,
            device_id: "btfi-test".into(),
            pwm_percent: 50,
            fan: FanMetrics {
                cfm: 250.0,
                rpm: 1500.0,
                power_w: 28.0,
                efficiency_cfm_w: 250.0 / 28.0,
            },
            environment: EnvironmentReading::default(),
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        }
    }

    #[test]
    fn sixth_tick_crossing_the_wall_clock_boundary_closes_the_epoch() {
        let mut assembler = EpochAssembler::new("btfi-test".into(), Duration::minutes(1));
        let mut closed = None;
        for i in 0..=5 {
            closed = assembler.push(sample_at(i * 12));
        }
        let batch = closed.expect("sample at offset 60s >= 60s epoch_duration closes the epoch");
        assert_eq!(batch.epoch.sample_count, 6);
        assert_eq!(batch.epoch.leaf_hashes.len(), 6);
        assert!(!assembler.has_open_epoch());
    }

    #[test]
    fn sustained_tick_overrun_still_closes_on_elapsed_wall_clock_time() {
        // Ticks land every 70s instead of the nominal interval; closure must
        // trigger off the timestamp delta, not a count of samples seen.
        let mut assembler = EpochAssembler::new("btfi-test".into(), Duration::minutes(1));
        let first = assembler.push(sample_at(0));
        assert!(first.is_none());
        let batch = assembler
            .push(sample_at(70))
            .expect("70s elapsed >= 60s epoch_duration closes after just 2 samples");
        assert_eq!(batch.epoch.sample_count, 2);
    }

    #[test]
    fn does_not_close_before_quota_reached() {
        let mut assembler = EpochAssembler::new("btfi-test".into(), Duration::minutes(60));
        let closed = assembler.push(sample_at(0));
        assert!(closed.is_none());
        assert!(assembler.has_open_epoch());
    }

    #[test]
    fn force_close_seals_a_partial_window() {
        let mut assembler = EpochAssembler::new("btfi-test".into(), Duration::minutes(60));
        assembler.push(sample_at(0));
        assembler.push(sample_at(12));
        let batch = assembler.force_close().expect("open epoch with samples");
        assert_eq!(batch.epoch.sample_count, 2);
        assert!(assembler.force_close().is_none());
    }

    #[test]
    fn leaf_hash_matches_merkle_root_rule() {
        let mut assembler = EpochAssembler::new("btfi-test".into(), Duration::seconds(12));
        assembler.push(sample_at(0));
        let batch = assembler.push(sample_at(12)).unwrap();
        assert_eq!(
            batch.epoch.merkle_root,
            crate::merkle::merkle_root(&batch.epoch.leaf_hashes)
        );
    }
}
