// [libs/infra/btfi-verifier-client/src/queue.rs]
/*!
 * APARATO: OFFLINE UPLINK QUEUE (V1.0)
 * RESPONSABILIDAD: FACHADA DEL UPLINK SOBRE LA COLA DURABLE DE BTFI-STORE
 *
 * Envoltura delgada sobre `btfi_store::UplinkQueueRepository`: el uplink
 * nunca toca SQL directamente, sólo ve `enqueue_*`/`peek_oldest_*`/
 * `delete_*`/`mark_*_attempt`. Un fallo de envío deja la fila en su
 * sitio (FIFO por `id`) en vez de reordenarla.
 */

use btfi_models::prelude::{Epoch, Sample};
use btfi_store::prelude::{QueuedEpoch, QueuedSample, StoreClient, StoreError, UplinkQueueRepository};

pub use btfi_store::prelude::{DEFAULT_MAX_BUFFERED_EPOCHS, DEFAULT_MAX_BUFFERED_SAMPLES};

pub struct OfflineQueue {
    repository: UplinkQueueRepository,
}

impl OfflineQueue {
    pub fn new(client: StoreClient, max_samples: usize, max_epochs: usize) -> Self {
        Self {
            repository: UplinkQueueRepository::with_caps(client, max_samples as i64, max_epochs as i64),
        }
    }

    pub fn with_defaults(client: StoreClient) -> Self {
        Self::new(
            client,
            DEFAULT_MAX_BUFFERED_SAMPLES as usize,
            DEFAULT_MAX_BUFFERED_EPOCHS as usize,
        )
    }

    pub async fn enqueue_sample(&self, sample: Sample) -> Result<(), StoreError> {
        self.repository.enqueue_sample(&sample).await
    }

    pub async fn enqueue_epoch(&self, epoch: Epoch) -> Result<(), StoreError> {
        self.repository.enqueue_epoch(&epoch).await
    }

    pub async fn samples_pending(&self) -> Result<usize, StoreError> {
        self.repository.samples_pending().await
    }

    pub async fn epochs_pending(&self) -> Result<usize, StoreError> {
        self.repository.epochs_pending().await
    }

    pub async fn peek_sample(&self) -> Result<Option<QueuedSample>, StoreError> {
        self.repository.peek_oldest_sample().await
    }

    pub async fn peek_epoch(&self) -> Result<Option<QueuedEpoch>, StoreError> {
        self.repository.peek_oldest_epoch().await
    }

    pub async fn delete_sample(&self, id: i64) -> Result<(), StoreError> {
        self.repository.delete_sample(id).await
    }

    pub async fn delete_epoch(&self, id: i64) -> Result<(), StoreError> {
        self.repository.delete_epoch(id).await
    }

    pub async fn mark_sample_attempt(&self, id: i64) -> Result<(), StoreError> {
        self.repository.mark_sample_attempt(id).await
    }

    pub async fn mark_epoch_attempt(&self, id: i64) -> Result<(), StoreError> {
        self.repository.mark_epoch_attempt(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{
        AirQualitySummary, DerivedMetrics, EnvironmentReading, EpochSummary, EpochTime, FanMetrics,
        FanPerformanceSummary, MitigationSummary, StaleFlags,
    };
    use chrono::Utc;

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

    #[tokio::test]
    async fn sample_overflow_drops_oldest() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let queue = OfflineQueue::new(client, 2, 10);
        queue.enqueue_sample(sample()).await.unwrap();
        queue.enqueue_sample(sample()).await.unwrap();
        queue.enqueue_sample(sample()).await.unwrap();
        assert_eq!(queue.samples_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_epoch_id_upserts_in_place() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let queue = OfflineQueue::new(client, 10, 10);
        queue.enqueue_epoch(epoch("epoch-1")).await.unwrap();
        queue.enqueue_epoch(epoch("epoch-2")).await.unwrap();
        queue.enqueue_epoch(epoch("epoch-1")).await.unwrap();
        assert_eq!(queue.epochs_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn peek_is_fifo() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let queue = OfflineQueue::new(client, 10, 10);
        queue.enqueue_epoch(epoch("epoch-1")).await.unwrap();
        queue.enqueue_epoch(epoch("epoch-2")).await.unwrap();
        let first = queue.peek_epoch().await.unwrap().unwrap();
        assert_eq!(first.epoch.epoch_id, "epoch-1");
    }

    #[tokio::test]
    async fn queue_persists_across_process_restart_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sync_buffer.db");
        let db_url = db_path.to_str().unwrap();

        {
            let client = StoreClient::connect(db_url).await.unwrap();
            let queue = OfflineQueue::new(client, 10, 10);
            queue.enqueue_sample(sample()).await.unwrap();
            queue.enqueue_epoch(epoch("epoch-1")).await.unwrap();
        }

        let client = StoreClient::connect(db_url).await.unwrap();
        let reopened = OfflineQueue::new(client, 10, 10);
        assert_eq!(reopened.samples_pending().await.unwrap(), 1);
        assert_eq!(reopened.epochs_pending().await.unwrap(), 1);
    }
}
