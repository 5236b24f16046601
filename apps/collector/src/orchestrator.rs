// [apps/collector/src/orchestrator.rs]
/*!
 * =================================================================
 * APARATO: COLLECTOR ORCHESTRATOR (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: DUEÑO DEL TICK; COMPONE C1-C10 EN UN SOLO CICLO
 *
 * Orden por tick: leer PWM → leer sensor → detectar anomalías →
 * adjuntar resumen → firmar → persistir → empujar al ensamblador de
 * epochs → si cierra, emitir/empaquetar/subir/enlazar → difundir la
 * muestra al uplink del verificador. El uplink de fondo y el sondeo de
 * comandos son workers aparte y viven en `main.rs`, no aquí.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btfi_anomaly::prelude::{AnomalyDetector, TrackedBaselines};
use btfi_crypto::prelude::{sign, DeviceIdentity};
use btfi_epoch::prelude::{ClosedEpochBatch, EpochAssembler};
use btfi_evidence::prelude::{build_pack, write_local_copy, ObjectStorageUploader, PackInput};
use btfi_evidence::apply_retention_policy;
use btfi_issuance::prelude::IssuanceCalculator;
use btfi_models::prelude::{
    AnomalySummary, DerivedMetrics, DeviceIdentitySnapshot, EnvironmentReading, FanMetrics, Sample,
};
use btfi_store::prelude::{EpochRepository, SampleRepository};
use btfi_verifier_client::prelude::VerifierUplink;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::fan::FanInterpolator;
use crate::sensor::SensorSource;

pub struct OrchestratorConfig {
    pub sample_interval_seconds: u32,
    pub issuance_model_version: String,
    pub evidence_local_dir: PathBuf,
    pub evidence_retain_local: bool,
    /// Línea base nominal usada para expresar la reducción de VOC como
    /// porcentaje; no es el baseline estadístico del detector, que se
    /// actualiza en línea.
    pub voc_baseline_ppb: f64,
    /// Kill switch del detector de anomalías; cuando es `false`, el tick
    /// no llama a `detect` y la muestra queda sin `anomalies`.
    pub enable_anomaly_detection: bool,
}

pub struct CollectorOrchestrator {
    identity: Arc<DeviceIdentity>,
    identity_snapshot: DeviceIdentitySnapshot,
    fan: FanInterpolator,
    sensor: Box<dyn SensorSource>,
    detector: AnomalyDetector,
    assembler: EpochAssembler,
    issuance: IssuanceCalculator,
    sample_repository: SampleRepository,
    epoch_repository: EpochRepository,
    uplink: Arc<VerifierUplink>,
    object_storage: Option<Arc<ObjectStorageUploader>>,
    target_fan_speed: Arc<AtomicU8>,
    sequence: u64,
    config: OrchestratorConfig,
}

impl CollectorOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<DeviceIdentity>,
        identity_snapshot: DeviceIdentitySnapshot,
        fan: FanInterpolator,
        sensor: Box<dyn SensorSource>,
        detector: AnomalyDetector,
        assembler: EpochAssembler,
        issuance: IssuanceCalculator,
        sample_repository: SampleRepository,
        epoch_repository: EpochRepository,
        uplink: Arc<VerifierUplink>,
        object_storage: Option<Arc<ObjectStorageUploader>>,
        target_fan_speed: Arc<AtomicU8>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            identity,
            identity_snapshot,
            fan,
            sensor,
            detector,
            assembler,
            issuance,
            sample_repository,
            epoch_repository,
            uplink,
            object_storage,
            target_fan_speed,
            sequence: 0,
            config,
        }
    }

    pub fn snapshot_baselines(&self) -> TrackedBaselines {
        self.detector.snapshot_baselines()
    }

    /// Un ciclo completo del tick: lectura, detección, firma,
    /// persistencia y (si corresponde) cierre del epoch en curso.
    #[instrument(skip(self))]
    async fn tick(&mut self) {
        let pwm_percent = self.target_fan_speed.load(Ordering::SeqCst);
        let fan = self.fan.metrics(pwm_percent);
        let (environment, stale) = self.sensor.read(pwm_percent);
        let derived = derive_metrics(&fan, &environment, self.config.sample_interval_seconds, self.config.voc_baseline_ppb);

        let mut sample = Sample {
            timestamp: Utc::now(),
            monotonic_sequence: self.sequence,
            device_id: self.identity.device_id().to_string(),
            pwm_percent,
            fan,
            environment,
            derived,
            anomalies: None,
            signing: None,
            stale,
        };
        self.sequence += 1;

        if self.config.enable_anomaly_detection {
            let reports = self.detector.detect(&sample);
            sample.anomalies = AnomalySummary::from_reports(reports);
        }

        let signed_sample = match sign(&sample, &self.identity) {
            Ok(signed) => signed,
            Err(e) => {
                error!(error = %e, "✍️ [ORCHESTRATOR]: sample signing failed, dropping tick");
                return;
            }
        };

        if let Err(e) = self.sample_repository.insert_sample(&signed_sample).await {
            warn!(error = %e, "💾 [ORCHESTRATOR]: sample persistence failed");
        }

        let sample_for_uplink = signed_sample.clone();

        if let Some(batch) = self.assembler.push(signed_sample) {
            self.finalize_epoch(batch).await;
        }

        self.uplink.send_sample(sample_for_uplink).await;
    }

    /// Camino compartido entre el cierre normal por cuota y el cierre
    /// forzado en apagado.
    async fn finalize_epoch(&mut self, batch: ClosedEpochBatch) {
        let mut epoch = batch.epoch;
        epoch.issuance = Some(self.issuance.calculate(&batch.samples));

        let signed_epoch = match sign(&epoch, &self.identity) {
            Ok(signed) => signed,
            Err(e) => {
                error!(error = %e, "✍️ [ORCHESTRATOR]: epoch signing failed, epoch lost");
                return;
            }
        };

        if let Err(e) = self.epoch_repository.upsert_epoch(&signed_epoch).await {
            warn!(error = %e, "💾 [ORCHESTRATOR]: epoch persistence failed");
        }

        self.build_and_ship_evidence(&signed_epoch, batch.samples).await;
        self.uplink.send_epoch(signed_epoch).await;
    }

    async fn build_and_ship_evidence(&self, signed_epoch: &btfi_models::prelude::Epoch, samples: Vec<Sample>) {
        let pack_input = PackInput {
            epoch: signed_epoch.clone(),
            samples,
            device_identity: self.identity_snapshot.clone(),
            sample_interval_seconds: self.config.sample_interval_seconds,
            issuance_model_version: self.config.issuance_model_version.clone(),
        };

        let built = match build_pack(pack_input) {
            Ok(built) => built,
            Err(e) => {
                warn!(error = %e, "📦 [ORCHESTRATOR]: evidence pack build failed");
                return;
            }
        };

        let local_path = match write_local_copy(&self.config.evidence_local_dir, &signed_epoch.epoch_id, &built.archive_bytes) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "📦 [ORCHESTRATOR]: failed to write local evidence pack");
                return;
            }
        };

        if let Some(uploader) = &self.object_storage {
            let device_id = &self.identity_snapshot.registration.device_id;
            let object_key = ObjectStorageUploader::object_key(device_id, &signed_epoch.epoch_id, built.pack.metadata.created_at);

            match uploader
                .upload(
                    &object_key,
                    built.archive_bytes,
                    &signed_epoch.epoch_id,
                    device_id,
                    &built.pack.metadata.pack_hash,
                    built.pack.metadata.sample_count,
                )
                .await
            {
                Ok(()) => {
                    if let Err(e) = apply_retention_policy(&local_path, self.config.evidence_retain_local) {
                        warn!(error = %e, "🗑️ [ORCHESTRATOR]: retention policy cleanup failed");
                    }
                }
                Err(e) => warn!(error = %e, "☁️ [ORCHESTRATOR]: evidence upload failed, keeping local copy"),
            }
        }
    }

    /// Cierre forzado de cualquier epoch abierto al apagar; recorre el
    /// mismo camino de firma/persistencia/empaque.
    async fn finalize_on_shutdown(&mut self) {
        if let Some(batch) = self.assembler.force_close() {
            self.finalize_epoch(batch).await;
        }
    }

    /// Bucle de tick: objetivo de período `sample_interval_seconds`; si
    /// un tick se excede, el siguiente arranca de inmediato y el
    /// desbordamiento sólo se registra, sin ráfagas de recuperación. Se
    /// detiene cuando `stop_rx` reporta `true`, finaliza cualquier epoch
    /// abierto y devuelve `self` para que el invocador pueda leer el
    /// snapshot final de baselines.
    pub async fn run(mut self, mut stop_rx: watch::Receiver<bool>) -> Self {
        let tick_interval = Duration::from_secs(self.config.sample_interval_seconds as u64);
        info!(interval_s = self.config.sample_interval_seconds, "🌀 [ORCHESTRATOR]: tick loop started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let tick_start = tokio::time::Instant::now();
            self.tick().await;
            let elapsed = tick_start.elapsed();

            if elapsed > tick_interval {
                warn!(elapsed_ms = elapsed.as_millis() as u64, "⏱️ [ORCHESTRATOR]: tick overran its period, starting next tick immediately");
                continue;
            }

            let remaining = tick_interval - elapsed;
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("🛑 [ORCHESTRATOR]: tick loop stopped, finalizing open epoch");
        self.finalize_on_shutdown().await;
        self
    }
}

/// `tar_cfm_min`/`energy_wh` escalan linealmente por la fracción del
/// intervalo de muestreo que representa este tick, igual que
/// `tar_event`/`energy_event` a nivel de evento escalan por `minutes`.
/// `voc_reduction_pct` expresa la reducción frente a la línea base
/// nominal configurada, recortada a `[0,100]`.
fn derive_metrics(
    fan: &FanMetrics,
    environment: &EnvironmentReading,
    sample_interval_seconds: u32,
    voc_baseline_ppb: f64,
) -> DerivedMetrics {
    let minutes = sample_interval_seconds as f64 / 60.0;
    let tar_cfm_min = fan.cfm * minutes;
    let energy_wh = fan.power_w * (minutes / 60.0);
    let voc_reduction_pct = if voc_baseline_ppb > 0.0 {
        (((voc_baseline_ppb - environment.tvoc_ppb) / voc_baseline_ppb) * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    DerivedMetrics {
        tar_cfm_min,
        energy_wh,
        voc_reduction_pct,
    }
}

const BASELINES_FILENAME: &str = "anomaly_baselines.json";

/// Carga las baselines persistidas en `state_dir`, si existen.
pub fn load_baselines(state_dir: &Path) -> TrackedBaselines {
    let path = state_dir.join(BASELINES_FILENAME);
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(error = %e, "⚠️ [ORCHESTRATOR]: malformed anomaly_baselines.json, starting from zero");
            TrackedBaselines::default()
        }),
        Err(_) => TrackedBaselines::default(),
    }
}

/// Persiste las baselines al apagar.
pub fn save_baselines(state_dir: &Path, baselines: &TrackedBaselines) {
    let path = state_dir.join(BASELINES_FILENAME);
    match serde_json::to_vec_pretty(baselines) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&path, bytes) {
                warn!(error = %e, "⚠️ [ORCHESTRATOR]: failed to persist anomaly baselines");
            }
        }
        Err(e) => warn!(error = %e, "⚠️ [ORCHESTRATOR]: failed to serialize anomaly baselines"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::EnvironmentReading as EnvReading;

    #[test]
    fn derived_metrics_scale_by_interval_fraction() {
        let fan = FanMetrics {
            cfm: 300.0,
            rpm: 1800.0,
            power_w: 36.0,
            efficiency_cfm_w: 300.0 / 36.0,
        };
        let environment = EnvReading { tvoc_ppb: 75.0, ..Default::default() };
        let derived = derive_metrics(&fan, &environment, 12, 150.0);

        assert!((derived.tar_cfm_min - 300.0 * (12.0 / 60.0)).abs() < 1e-9);
        assert!((derived.energy_wh - 36.0 * (12.0 / 3600.0)).abs() < 1e-9);
        assert!((derived.voc_reduction_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn voc_reduction_is_clamped_to_zero_when_above_baseline() {
        let fan = FanMetrics::default();
        let environment = EnvReading { tvoc_ppb: 900.0, ..Default::default() };
        let derived = derive_metrics(&fan, &environment, 12, 150.0);
        assert_eq!(derived.voc_reduction_pct, 0.0);
    }

    #[test]
    fn baselines_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut baselines = TrackedBaselines::default();
        baselines.cfm.update(120.0);
        baselines.cfm.update(130.0);

        save_baselines(dir.path(), &baselines);
        let reloaded = load_baselines(dir.path());
        assert_eq!(reloaded.cfm.count, 2);
        assert!((reloaded.cfm.mean - 125.0).abs() < 1e-9);
    }

    #[test]
    fn missing_baselines_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let baselines = load_baselines(dir.path());
        assert_eq!(baselines.cfm.count, 0);
    }
}
