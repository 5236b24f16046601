// [apps/collector/src/main.rs]
/*!
 * =================================================================
 * APARATO: COLLECTOR SHELL (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL ORQUESTADOR
 *
 * 1. Directivas de arranque (clap) + identidad + almacén local.
 * 2. Registro de config remota; sus valores siembran
 *    los componentes de dominio en este arranque (no hay sondeo de
 *    config propio: las actualizaciones llegan por una fachada REST
 *    fuera de alcance de este binario).
 * 3. Construcción bottom-up de C2-C10.
 * 4. Una sola señal de apagado (`watch::channel`) compartida por el
 *    orquestador, el drenaje de fondo del uplink y el sondeo de
 *    comandos.
 * =================================================================
 */

use std::path::PathBuf;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use btfi_collector_lib::prelude::{
    load_baselines, save_baselines, CollectorOrchestrator, CommandListener, ConfigRegistry,
    FanCurveConfig, FanInterpolator, OrchestratorConfig, SensorSource, SimulatedSensorSource,
    SimulatorConfig,
};

use btfi_anomaly::prelude::AnomalyDetector;
use btfi_crypto::prelude::DeviceIdentity;
use btfi_epoch::prelude::EpochAssembler;
use btfi_evidence::prelude::{ObjectStorageConfig, ObjectStorageUploader};
use btfi_issuance::prelude::{IssuanceCalculator, IssuanceConfig};
use btfi_models::prelude::{ConfigKey, ConfigValue};
use btfi_store::prelude::{EpochRepository, SampleRepository, StoreClient};
use btfi_verifier_client::prelude::{VerifierClient, VerifierUplink};

#[derive(Parser, Debug)]
#[command(
    author = "BTFI Collective",
    version = "1.0",
    about = "BTFI Collector — measurement-to-evidence firmware for a networked ventilation appliance"
)]
struct CollectorDirectives {
    /// Directorio de estado del dispositivo: identidad, config, baselines.
    #[arg(long, env = "DEVICE_STATE_DIR", default_value = "device_state")]
    device_state_dir: PathBuf,

    /// URL local o `:memory:` para el almacén libsql.
    #[arg(long, env = "DATABASE_URL", default_value = "btfi-collector.db")]
    database_url: String,

    /// Etiqueta de plataforma de hardware, persistida en el bloque de
    /// identidad de cada paquete de evidencia.
    #[arg(long, env = "DEVICE_PLATFORM", default_value = "sbc-sim")]
    platform: String,

    /// Semilla determinista para el simulador de sensores.
    #[arg(long, env = "SIMULATION_SEED", default_value_t = 42)]
    simulation_seed: u64,

    /// API key presentada al verificador en cada envío.
    #[arg(long, env = "VERIFIER_API_KEY", default_value = "")]
    verifier_api_key: String,

    /// URL base del backend que expone comandos pendientes para este
    /// dispositivo.
    #[arg(long, env = "BACKEND_URL", default_value = "")]
    backend_url: String,

    #[arg(long, env = "COMMAND_POLL_INTERVAL_SECONDS", default_value_t = 15)]
    command_poll_interval_seconds: u64,

    /// Clave pública Ed25519 (hex) del operador confiable para config
    /// remota firmada; sin ella, actualizaciones no firmadas se aceptan.
    #[arg(long, env = "TRUSTED_OPERATOR_PUBLIC_KEY_HEX")]
    trusted_operator_public_key_hex: Option<String>,

    #[arg(long, env = "OBJECT_STORAGE_ENDPOINT")]
    object_storage_endpoint: Option<String>,

    #[arg(long, env = "OBJECT_STORAGE_ACCESS_KEY_ID", default_value = "")]
    object_storage_access_key_id: String,

    #[arg(long, env = "OBJECT_STORAGE_SECRET_ACCESS_KEY", default_value = "")]
    object_storage_secret_access_key: String,

    #[arg(long, env = "OBJECT_STORAGE_REGION", default_value = "us-east-1")]
    object_storage_region: String,

    #[arg(long, env = "EVIDENCE_LOCAL_DIR", default_value = "evidence_packs")]
    evidence_local_dir: PathBuf,

    #[arg(long, env = "ISSUANCE_MODEL_VERSION", default_value = "v1")]
    issuance_model_version: String,

    /// Línea base nominal de VOC usada para expresar `derived.voc_reduction_pct`.
    #[arg(long, env = "VOC_BASELINE_PPB", default_value_t = 150.0)]
    voc_baseline_ppb: f64,
}

fn config_bool(registry: &ConfigRegistry, key: ConfigKey, fallback: bool) -> bool {
    match registry.get(key) {
        ConfigValue::Bool(b) => b,
        other => {
            warn!(key = key.as_str(), type_name = other.type_name(), "⚠️ [CONFIG]: unexpected type for bool option, using fallback");
            fallback
        }
    }
}

fn config_int(registry: &ConfigRegistry, key: ConfigKey, fallback: i64) -> i64 {
    match registry.get(key) {
        ConfigValue::Int(i) => i,
        other => {
            warn!(key = key.as_str(), type_name = other.type_name(), "⚠️ [CONFIG]: unexpected type for int option, using fallback");
            fallback
        }
    }
}

fn config_float(registry: &ConfigRegistry, key: ConfigKey, fallback: f64) -> f64 {
    match registry.get(key) {
        ConfigValue::Float(f) => f,
        other => {
            warn!(key = key.as_str(), type_name = other.type_name(), "⚠️ [CONFIG]: unexpected type for float option, using fallback");
            fallback
        }
    }
}

fn config_str(registry: &ConfigRegistry, key: ConfigKey, fallback: &str) -> String {
    match registry.get(key) {
        ConfigValue::Str(s) => s,
        other => {
            warn!(key = key.as_str(), type_name = other.type_name(), "⚠️ [CONFIG]: unexpected type for string option, using fallback");
            fallback.to_string()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    info!("💠 [SHELL]: BTFI Collector bootstrap starting");
    let directives = CollectorDirectives::parse();

    std::fs::create_dir_all(&directives.device_state_dir)
        .context("IO_FAULT: unable to create device state directory")?;
    std::fs::create_dir_all(&directives.evidence_local_dir)
        .context("IO_FAULT: unable to create evidence pack directory")?;

    // 1. Identidad y config remota.
    let identity = DeviceIdentity::load_or_create(&directives.device_state_dir)
        .context("FATAL: device identity unavailable, refusing to start")?;
    let identity = Arc::new(identity);

    let trusted_operator_key = directives
        .trusted_operator_public_key_hex
        .as_deref()
        .map(parse_verifying_key)
        .transpose()
        .context("FATAL: malformed trusted operator public key")?;

    let config_registry = ConfigRegistry::new(directives.device_state_dir.clone(), trusted_operator_key);

    let sample_interval_seconds = config_int(&config_registry, ConfigKey::SampleIntervalSeconds, 12).max(1) as u32;
    let epoch_duration_minutes = config_int(&config_registry, ConfigKey::EpochDurationMinutes, 5).max(1);
    let verifier_url = config_str(&config_registry, ConfigKey::VerifierUrl, "");
    let sync_interval_seconds = config_int(&config_registry, ConfigKey::SyncIntervalSeconds, 30).max(1) as u64;
    let enable_verifier_sync = config_bool(&config_registry, ConfigKey::EnableVerifierSync, true);
    let default_fan_speed = config_int(&config_registry, ConfigKey::DefaultFanSpeed, 40).clamp(0, 100) as u8;
    let simulation_mode = config_bool(&config_registry, ConfigKey::SimulationMode, true);
    let anomaly_sigma_threshold = config_float(&config_registry, ConfigKey::AnomalySigmaThreshold, 3.0);
    let enable_anomaly_detection = config_bool(&config_registry, ConfigKey::EnableAnomalyDetection, true);
    let object_storage_bucket = config_str(&config_registry, ConfigKey::ObjectStorageBucket, "");
    let evidence_pack_retain_local = config_bool(&config_registry, ConfigKey::EvidencePackRetainLocal, false);
    let pressure_imbalance_threshold_pa =
        config_float(&config_registry, ConfigKey::PressureImbalanceThresholdPa, -2.0);

    // 2. Almacén local durable.
    let store = StoreClient::connect(&directives.database_url)
        .await
        .context("FATAL: local durable store unavailable, refusing to start")?;
    let sample_repository = SampleRepository::new(store.clone());
    let epoch_repository = EpochRepository::new(store.clone());

    // 3. Componentes de dominio, en el orden C2-C9 del tick.
    let fan = FanInterpolator::new(FanCurveConfig::default());

    let sensor: Box<dyn SensorSource> = if simulation_mode {
        Box::new(SimulatedSensorSource::new(SimulatorConfig::default(), directives.simulation_seed))
    } else {
        // No hay un lector físico inyectable en este árbol (el acceso a
        // hardware es un colaborador externo). Se cae al simulador en
        // vez de fallar el arranque.
        warn!("🔧 [SHELL]: simulation_mode=false but no physical sensor reader is wired into this build, falling back to the simulator");
        Box::new(SimulatedSensorSource::new(SimulatorConfig::default(), directives.simulation_seed))
    };

    if !enable_anomaly_detection {
        info!("🔕 [SHELL]: enable_anomaly_detection=false, the tick will not run the detector");
    }
    let mut detector = AnomalyDetector::new(anomaly_sigma_threshold);
    detector.with_pressure_imbalance_threshold_pa(pressure_imbalance_threshold_pa);
    detector.restore_baselines(&load_baselines(&directives.device_state_dir));

    let assembler = EpochAssembler::new(
        identity.device_id().to_string(),
        chrono::Duration::minutes(epoch_duration_minutes),
    );

    let issuance_config = IssuanceConfig {
        sample_interval_seconds: sample_interval_seconds as f64,
        ..IssuanceConfig::default()
    };
    issuance_config
        .validate()
        .map_err(|e| anyhow::anyhow!("FATAL: invalid issuance configuration: {e}"))?;
    let issuance = IssuanceCalculator::new(issuance_config).map_err(|e| anyhow::anyhow!("FATAL: {e}"))?;

    let verifier_client = VerifierClient::new(verifier_url.clone(), directives.verifier_api_key.clone());
    let uplink = Arc::new(VerifierUplink::new(verifier_client, store, Duration::from_secs(sync_interval_seconds)));

    let object_storage = if !object_storage_bucket.is_empty() && !directives.object_storage_access_key_id.is_empty() {
        let uploader = ObjectStorageUploader::connect(ObjectStorageConfig {
            bucket: object_storage_bucket,
            endpoint: directives.object_storage_endpoint.clone(),
            access_key_id: directives.object_storage_access_key_id.clone(),
            secret_access_key: directives.object_storage_secret_access_key.clone(),
            region: directives.object_storage_region.clone(),
        })
        .await;
        info!("☁️ [SHELL]: object storage uploader connected");
        Some(Arc::new(uploader))
    } else {
        info!("☁️ [SHELL]: no object storage bucket configured, evidence packs stay local-only");
        None
    };

    let target_fan_speed = Arc::new(AtomicU8::new(default_fan_speed));
    let identity_snapshot = identity.identity_snapshot(directives.platform.clone(), simulation_mode);

    let orchestrator = CollectorOrchestrator::new(
        Arc::clone(&identity),
        identity_snapshot,
        fan,
        sensor,
        detector,
        assembler,
        issuance,
        sample_repository,
        epoch_repository,
        Arc::clone(&uplink),
        object_storage,
        Arc::clone(&target_fan_speed),
        OrchestratorConfig {
            sample_interval_seconds,
            issuance_model_version: directives.issuance_model_version.clone(),
            evidence_local_dir: directives.evidence_local_dir.clone(),
            evidence_retain_local: evidence_pack_retain_local,
            voc_baseline_ppb: directives.voc_baseline_ppb,
            enable_anomaly_detection,
        },
    );

    // 4. Señal única de apagado, compartida por los tres bucles de fondo.
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ [SIGNAL]: shutdown requested by host, sealing current epoch and draining queues");
            let _ = stop_tx.send(true);
        }
    });

    let uplink_task = if enable_verifier_sync && !verifier_url.is_empty() {
        let uplink = Arc::clone(&uplink);
        let stop_rx = stop_rx.clone();
        Some(tokio::spawn(async move {
            uplink
                .run_background_sync(
                    |record| info!(epoch_id = %record.epoch_id, "✅ [UPLINK]: epoch verified"),
                    stop_rx,
                )
                .await;
        }))
    } else {
        info!("🔌 [SHELL]: verifier sync disabled, uplink will not drain its buffer in the background");
        None
    };

    let command_task = if directives.backend_url.is_empty() {
        info!("📭 [SHELL]: no backend_url configured, command polling disabled");
        None
    } else {
        let listener = CommandListener::new(
            directives.backend_url.clone(),
            identity.device_id().to_string(),
            Arc::clone(&target_fan_speed),
        );
        let poll_interval = Duration::from_secs(directives.command_poll_interval_seconds.max(1));
        let mut stop_rx = stop_rx.clone();
        Some(tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {
                        if let Err(e) = listener.poll_once().await {
                            warn!(error = %e, "📡 [COMMANDS]: poll cycle failed");
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        }))
    };

    info!("🚀 [SHELL]: handing control to the collector orchestrator, transitioning to OPERATIONAL");
    let finished = orchestrator.run(stop_rx).await;
    save_baselines(&directives.device_state_dir, &finished.snapshot_baselines());

    if let Some(task) = uplink_task {
        if let Err(e) = task.await {
            error!(error = %e, "🔌 [SHELL]: uplink background task ended abnormally");
        }
    }
    if let Some(task) = command_task {
        if let Err(e) = task.await {
            error!(error = %e, "📡 [SHELL]: command poll task ended abnormally");
        }
    }

    info!("🏁 [SHELL]: shutdown sequence concluded, collector offline");
    Ok(())
}

fn parse_verifying_key(hex_str: &str) -> Result<ed25519_dalek::VerifyingKey> {
    let raw = hex::decode(hex_str).context("trusted operator key is not valid hex")?;
    let raw: [u8; 32] = raw
        .try_into()
        .map_err(|_| anyhow::anyhow!("trusted operator key must be 32 bytes"))?;
    ed25519_dalek::VerifyingKey::from_bytes(&raw).context("trusted operator key is not a valid Ed25519 point")
}
