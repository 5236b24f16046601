// [libs/infra/btfi-verifier-client/src/uplink.rs]
/*!
 * APARATO: VERIFIER UPLINK (V1.0)
 * RESPONSABILIDAD: MÁQUINA DE ESTADOS, ENVÍO INMEDIATO Y DRENAJE EN SEGUNDO PLANO
 *
 * Disconnected → Connecting → Connected → Reconnecting → Error → Reconnecting → …
 * Connected es el único estado en el que los envíos se intentan con
 * avidez; en cualquier otro estado los items van directo al búfer durable.
 */

use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use btfi_models::prelude::{ConnectionState, Epoch, Sample, VerificationRecord, VerifierSyncState};
use btfi_store::prelude::StoreClient;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::client::VerifierClient;
use crate::queue::{OfflineQueue, QUEUE_DEFAULT_MAX_BUFFERED_EPOCHS, QUEUE_DEFAULT_MAX_BUFFERED_SAMPLES};

const DRAIN_SAMPLES_PER_CYCLE: usize = 50;
const DRAIN_EPOCHS_PER_CYCLE: usize = 10;

#[derive(Clone, Copy)]
pub struct BackoffConfig {
    pub init: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffConfig {
    /// `delay = min(backoff_max, backoff_init * 2^retry_count)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let scaled = self.init.as_secs_f64() * 2f64.powi(retry_count as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }
}

pub struct VerifierUplink {
    client: VerifierClient,
    queue: OfflineQueue,
    state: Mutex<VerifierSyncState>,
    backoff: BackoffConfig,
    sync_interval: Duration,
    verification_records: Mutex<Vec<VerificationRecord>>,
}

impl VerifierUplink {
    pub fn new(client: VerifierClient, store: StoreClient, sync_interval: Duration) -> Self {
        Self::with_caps(
            client,
            store,
            sync_interval,
            QUEUE_DEFAULT_MAX_BUFFERED_SAMPLES as usize,
            QUEUE_DEFAULT_MAX_BUFFERED_EPOCHS as usize,
        )
    }

    pub fn with_caps(
        client: VerifierClient,
        store: StoreClient,
        sync_interval: Duration,
        max_samples: usize,
        max_epochs: usize,
    ) -> Self {
        Self {
            client,
            queue: OfflineQueue::new(store, max_samples, max_epochs),
            state: Mutex::new(VerifierSyncState::default()),
            backoff: BackoffConfig::default(),
            sync_interval,
            verification_records: Mutex::new(Vec::new()),
        }
    }

    pub fn state_snapshot(&self) -> VerifierSyncState {
        self.state.lock().unwrap().clone()
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connection_state == ConnectionState::Connected
    }

    /// Intento inmediato de un POST corto si `Connected`; en cualquier
    /// otro estado el item se encola en la base local sin intentar la red.
    #[instrument(skip(self, sample))]
    pub async fn send_sample(&self, sample: Sample) {
        if !self.is_connected() {
            self.buffer_sample(sample).await;
            return;
        }

        match self.client.send_sample(&sample).await {
            Ok(()) => {
                let mut state = self.state.lock().unwrap();
                state.connection_state = ConnectionState::Connected;
                state.last_sample_sent = Some(Utc::now());
                state.samples_sent_total += 1;
                state.retry_count = 0;
                state.next_retry = None;
            }
            Err(e) => {
                warn!(error = %e, "📡 [UPLINK]: sample send failed, buffering");
                self.mark_failure(e.to_string());
                self.buffer_sample(sample).await;
            }
        }
    }

    #[instrument(skip(self, epoch))]
    pub async fn send_epoch(&self, epoch: Epoch) {
        if !self.is_connected() {
            self.buffer_epoch(epoch).await;
            return;
        }

        match self.client.send_epoch(&epoch).await {
            Ok(response_body) => {
                let epoch_id = epoch.epoch_id.clone();
                let mut state = self.state.lock().unwrap();
                state.connection_state = ConnectionState::Connected;
                state.last_epoch_sent = Some(Utc::now());
                state.epochs_sent_total += 1;
                state.retry_count = 0;
                state.next_retry = None;
                drop(state);
                self.record_verification(epoch_id, "accepted".to_string(), response_body);
            }
            Err(e) => {
                warn!(error = %e, "📡 [UPLINK]: epoch send failed, buffering");
                self.mark_failure(e.to_string());
                self.buffer_epoch(epoch).await;
            }
        }
    }

    async fn buffer_sample(&self, sample: Sample) {
        if let Err(e) = self.queue.enqueue_sample(sample).await {
            error!(error = %e, "📡 [UPLINK]: failed to persist sample to the offline queue, sample lost");
        }
        self.refresh_pending_counts().await;
    }

    async fn buffer_epoch(&self, epoch: Epoch) {
        if let Err(e) = self.queue.enqueue_epoch(epoch).await {
            error!(error = %e, "📡 [UPLINK]: failed to persist epoch to the offline queue, epoch lost");
        }
        self.refresh_pending_counts().await;
    }

    fn mark_failure(&self, error_message: String) {
        let mut state = self.state.lock().unwrap();
        state.connection_state = ConnectionState::Error;
        state.retry_count += 1;
        state.last_error = Some(error_message);
        state.next_retry = Some(Utc::now() + chrono::Duration::from_std(self.backoff.delay_for(state.retry_count)).unwrap_or_default());
    }

    fn record_verification(&self, epoch_id: String, status: String, response_body: String) {
        self.verification_records.lock().unwrap().push(VerificationRecord {
            epoch_id,
            status,
            response_body,
            received_at: Utc::now(),
        });
    }

    pub fn verification_records(&self) -> Vec<VerificationRecord> {
        self.verification_records.lock().unwrap().clone()
    }

    async fn refresh_pending_counts(&self) {
        let samples_pending = self.queue.samples_pending().await.unwrap_or_else(|e| {
            error!(error = %e, "📡 [UPLINK]: failed to count pending samples");
            0
        });
        let epochs_pending = self.queue.epochs_pending().await.unwrap_or_else(|e| {
            error!(error = %e, "📡 [UPLINK]: failed to count pending epochs");
            0
        });
        let mut state = self.state.lock().unwrap();
        state.samples_pending = samples_pending;
        state.epochs_pending = epochs_pending;
    }

    /// Un ciclo de drenaje: hasta 50 muestras, luego hasta 10 epochs;
    /// se detiene en el primer fallo de cada tipo, o si la base local
    /// local no responde.
    async fn drain_cycle(&self, on_epoch_verified: &(dyn Fn(VerificationRecord) + Send + Sync)) {
        if !self.client.is_reachable().await {
            let mut state = self.state.lock().unwrap();
            state.connection_state = ConnectionState::Reconnecting;
            return;
        }

        {
            let mut state = self.state.lock().unwrap();
            state.connection_state = ConnectionState::Connected;
        }

        for _ in 0..DRAIN_SAMPLES_PER_CYCLE {
            let queued = match self.queue.peek_sample().await {
                Ok(Some(q)) => q,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "📡 [UPLINK]: failed to read offline queue, halting sample drain");
                    break;
                }
            };
            match self.client.send_sample(&queued.sample).await {
                Ok(()) => {
                    if let Err(e) = self.queue.delete_sample(queued.id).await {
                        error!(error = %e, "📡 [UPLINK]: sample sent but could not be removed from the queue");
                        break;
                    }
                    let mut state = self.state.lock().unwrap();
                    state.last_sample_sent = Some(Utc::now());
                    state.samples_sent_total += 1;
                }
                Err(e) => {
                    warn!(error = %e, "📡 [UPLINK]: drain halted on sample failure");
                    if let Err(mark_err) = self.queue.mark_sample_attempt(queued.id).await {
                        error!(error = %mark_err, "📡 [UPLINK]: failed to record sample retry attempt");
                    }
                    self.mark_failure(e.to_string());
                    break;
                }
            }
        }

        for _ in 0..DRAIN_EPOCHS_PER_CYCLE {
            let queued = match self.queue.peek_epoch().await {
                Ok(Some(q)) => q,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "📡 [UPLINK]: failed to read offline queue, halting epoch drain");
                    break;
                }
            };
            match self.client.send_epoch(&queued.epoch).await {
                Ok(response_body) => {
                    if let Err(e) = self.queue.delete_epoch(queued.id).await {
                        error!(error = %e, "📡 [UPLINK]: epoch sent but could not be removed from the queue");
                        break;
                    }
                    let epoch_id = queued.epoch.epoch_id.clone();
                    {
                        let mut state = self.state.lock().unwrap();
                        state.last_epoch_sent = Some(Utc::now());
                        state.epochs_sent_total += 1;
                    }
                    self.record_verification(epoch_id.clone(), "accepted".to_string(), response_body.clone());
                    on_epoch_verified(VerificationRecord {
                        epoch_id,
                        status: "accepted".to_string(),
                        response_body,
                        received_at: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "📡 [UPLINK]: drain halted on epoch failure");
                    if let Err(mark_err) = self.queue.mark_epoch_attempt(queued.id).await {
                        error!(error = %mark_err, "📡 [UPLINK]: failed to record epoch retry attempt");
                    }
                    self.mark_failure(e.to_string());
                    break;
                }
            }
        }

        self.refresh_pending_counts().await;
    }

    /// Bucle de fondo: corre hasta que `stop_rx` reporte `true`. La
    /// señal de parada se respeta tras el POST en curso, nunca lo
    /// interrumpe.
    pub async fn run_background_sync(
        self: Arc<Self>,
        on_epoch_verified: impl Fn(VerificationRecord) + Send + Sync + 'static,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        info!("🔄 [UPLINK]: background sync loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.sync_interval) => {
                    self.drain_cycle(&on_epoch_verified).await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("🛑 [UPLINK]: background sync loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{
        AirQualitySummary, DerivedMetrics, EnvironmentReading, EpochSummary, EpochTime, FanMetrics,
        FanPerformanceSummary, MitigationSummary, StaleFlags,
    };

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let backoff = BackoffConfig::default();
        assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(20), Duration::from_secs(300));
    }

    fn sample() -> Sample {
        Sample {
            timestamp: Utc::now(),
            monotonic_sequence: 0,
            device_id: "btfi-test".to_string(),
            pwm_percent: 50,
            fan: FanMetrics::default(),
            environment: EnvironmentReading::default(),
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        }
    }

    fn epoch(epoch_id: &str) -> Epoch {
        Epoch {
            epoch_id: epoch_id.to_string(),
            time: EpochTime { start: Utc::now(), end: Utc::now(), duration_minutes: 60.0 },
            sample_count: 0,
            summary: EpochSummary {
                fan_performance: FanPerformanceSummary::default(),
                air_quality: AirQualitySummary::default(),
                mitigation: MitigationSummary::default(),
            },
            merkle_root: "x".to_string(),
            leaf_hashes: vec![],
            issuance: None,
            signing: None,
        }
    }

    /// spec.md §8 S4: enqueueing while offline must be visible in the
    /// status snapshot immediately, without waiting for a sync cycle.
    #[tokio::test]
    async fn offline_buffering_is_reflected_in_state_snapshot_without_a_sync_cycle() {
        let store = StoreClient::connect(":memory:").await.unwrap();
        let client = VerifierClient::new("http://127.0.0.1:1".to_string(), String::new());
        let uplink = VerifierUplink::new(client, store, Duration::from_secs(300));

        uplink.send_sample(sample()).await;
        uplink.send_sample(sample()).await;
        uplink.send_sample(sample()).await;
        uplink.send_epoch(epoch("epoch-1")).await;

        let state = uplink.state_snapshot();
        assert_eq!(state.samples_pending, 3);
        assert_eq!(state.epochs_pending, 1);
        assert_eq!(state.samples_sent_total, 0);
    }
}
