// [libs/infra/btfi-store/src/repositories/uplink_queue.rs]
/*!
 * APARATO: UPLINK QUEUE REPOSITORY (V1.0)
 * RESPONSABILIDAD: PERSISTENCIA DURABLE DE MUESTRAS Y EPOCHS PENDIENTES DE ENVÍO
 *
 * FIFO por tipo: la fila de menor `id` es siempre la próxima candidata.
 * Un fallo de envío no reordena nada — la fila permanece en su sitio y
 * sólo se actualiza `attempt_count`/`last_attempt`; un éxito la borra.
 * Los epochs son upsert-por-`epoch_id`.
 */

use btfi_models::prelude::{Epoch, Sample};
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::{instrument, warn};

use crate::client::StoreClient;
use crate::errors::StoreError;

pub const DEFAULT_MAX_BUFFERED_SAMPLES: i64 = 10_000;
pub const DEFAULT_MAX_BUFFERED_EPOCHS: i64 = 100;

#[derive(Debug, Clone)]
pub struct QueuedSample {
    pub id: i64,
    pub sample: Sample,
    pub attempt_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct QueuedEpoch {
    pub id: i64,
    pub epoch: Epoch,
    pub attempt_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct UplinkQueueRepository {
    client: StoreClient,
    max_samples: i64,
    max_epochs: i64,
}

impl UplinkQueueRepository {
    pub fn new(client: StoreClient) -> Self {
        Self::with_caps(client, DEFAULT_MAX_BUFFERED_SAMPLES, DEFAULT_MAX_BUFFERED_EPOCHS)
    }

    pub fn with_caps(client: StoreClient, max_samples: i64, max_epochs: i64) -> Self {
        Self { client, max_samples, max_epochs }
    }

    #[instrument(skip(self, sample))]
    pub async fn enqueue_sample(&self, sample: &Sample) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        let payload_json = serde_json::to_string(sample)?;

        connection
            .execute(
                "INSERT INTO pending_samples (payload_json) VALUES (?1)",
                params![payload_json],
            )
            .await?;

        let overflow = self.count(&connection, "pending_samples").await? - self.max_samples;
        if overflow > 0 {
            connection
                .execute(
                    "DELETE FROM pending_samples WHERE id IN (
                        SELECT id FROM pending_samples ORDER BY id ASC LIMIT ?1
                    )",
                    params![overflow],
                )
                .await?;
            warn!(overflow, "🪣 [UPLINK_QUEUE]: dropped oldest buffered sample(s), queue at capacity");
        }
        Ok(())
    }

    /// Epochs son únicos por `epoch_id`: una re-inserción sobreescribe en
    /// su sitio sin alterar su posición FIFO original.
    #[instrument(skip(self, epoch))]
    pub async fn enqueue_epoch(&self, epoch: &Epoch) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        let payload_json = serde_json::to_string(epoch)?;

        connection
            .execute(
                "INSERT INTO pending_epochs (epoch_id, payload_json) VALUES (?1, ?2)
                 ON CONFLICT(epoch_id) DO UPDATE SET payload_json = excluded.payload_json",
                params![epoch.epoch_id.clone(), payload_json],
            )
            .await?;

        let overflow = self.count(&connection, "pending_epochs").await? - self.max_epochs;
        if overflow > 0 {
            connection
                .execute(
                    "DELETE FROM pending_epochs WHERE id IN (
                        SELECT id FROM pending_epochs ORDER BY id ASC LIMIT ?1
                    )",
                    params![overflow],
                )
                .await?;
            warn!(overflow, "🪣 [UPLINK_QUEUE]: dropped oldest buffered epoch(s), queue at capacity");
        }
        Ok(())
    }

    pub async fn samples_pending(&self) -> Result<usize, StoreError> {
        let connection = self.client.connection()?;
        Ok(self.count(&connection, "pending_samples").await? as usize)
    }

    pub async fn epochs_pending(&self) -> Result<usize, StoreError> {
        let connection = self.client.connection()?;
        Ok(self.count(&connection, "pending_epochs").await? as usize)
    }

    async fn count(&self, connection: &libsql::Connection, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let mut rows = connection.query(&sql, ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Fila de menor `id` sin borrarla; el llamador decide `delete_sample`
    /// en éxito o `mark_sample_attempt` en fallo.
    #[instrument(skip(self))]
    pub async fn peek_oldest_sample(&self) -> Result<Option<QueuedSample>, StoreError> {
        let connection = self.client.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, payload_json, attempt_count, last_attempt
                 FROM pending_samples ORDER BY id ASC LIMIT 1",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let id: i64 = row.get(0)?;
                let payload_json: String = row.get(1)?;
                let attempt_count: i64 = row.get(2)?;
                let last_attempt: Option<String> = row.get(3)?;
                Ok(Some(QueuedSample {
                    id,
                    sample: serde_json::from_str(&payload_json)?,
                    attempt_count: attempt_count as u32,
                    last_attempt: last_attempt.and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok()).map(|dt| dt.with_timezone(&Utc)),
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn delete_sample(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        connection.execute("DELETE FROM pending_samples WHERE id = ?1", params![id]).await?;
        Ok(())
    }

    pub async fn mark_sample_attempt(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        connection
            .execute(
                "UPDATE pending_samples SET attempt_count = attempt_count + 1, last_attempt = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn peek_oldest_epoch(&self) -> Result<Option<QueuedEpoch>, StoreError> {
        let connection = self.client.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, payload_json, attempt_count, last_attempt
                 FROM pending_epochs ORDER BY id ASC LIMIT 1",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let id: i64 = row.get(0)?;
                let payload_json: String = row.get(1)?;
                let attempt_count: i64 = row.get(2)?;
                let last_attempt: Option<String> = row.get(3)?;
                Ok(Some(QueuedEpoch {
                    id,
                    epoch: serde_json::from_str(&payload_json)?,
                    attempt_count: attempt_count as u32,
                    last_attempt: last_attempt.and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok()).map(|dt| dt.with_timezone(&Utc)),
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn delete_epoch(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        connection.execute("DELETE FROM pending_epochs WHERE id = ?1", params![id]).await?;
        Ok(())
    }

    pub async fn mark_epoch_attempt(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        connection
            .execute(
                "UPDATE pending_epochs SET attempt_count = attempt_count + 1, last_attempt = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{
        AirQualitySummary, DerivedMetrics, EnvironmentReading, EpochSummary, EpochTime, FanMetrics,
        FanPerformanceSummary, MitigationSummary, StaleFlags,
    };

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
        let repo = UplinkQueueRepository::with_caps(client, 2, 10);
        repo.enqueue_sample(&sample()).await.unwrap();
        repo.enqueue_sample(&sample()).await.unwrap();
        repo.enqueue_sample(&sample()).await.unwrap();
        assert_eq!(repo.samples_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_epoch_id_upserts_in_place() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = UplinkQueueRepository::with_caps(client, 10, 10);
        repo.enqueue_epoch(&epoch("epoch-1")).await.unwrap();
        repo.enqueue_epoch(&epoch("epoch-2")).await.unwrap();
        repo.enqueue_epoch(&epoch("epoch-1")).await.unwrap();
        assert_eq!(repo.epochs_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn peek_is_fifo_by_insertion_order() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = UplinkQueueRepository::with_caps(client, 10, 10);
        repo.enqueue_epoch(&epoch("epoch-1")).await.unwrap();
        repo.enqueue_epoch(&epoch("epoch-2")).await.unwrap();
        let first = repo.peek_oldest_epoch().await.unwrap().unwrap();
        assert_eq!(first.epoch.epoch_id, "epoch-1");
    }

    #[tokio::test]
    async fn failed_attempt_keeps_row_at_head_until_deleted() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = UplinkQueueRepository::with_caps(client, 10, 10);
        repo.enqueue_sample(&sample()).await.unwrap();
        repo.enqueue_sample(&sample()).await.unwrap();

        let first = repo.peek_oldest_sample().await.unwrap().unwrap();
        repo.mark_sample_attempt(first.id).await.unwrap();

        let still_first = repo.peek_oldest_sample().await.unwrap().unwrap();
        assert_eq!(still_first.id, first.id);
        assert_eq!(still_first.attempt_count, 1);

        repo.delete_sample(still_first.id).await.unwrap();
        let second = repo.peek_oldest_sample().await.unwrap().unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn queue_survives_across_repository_handles_on_same_connection() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo_a = UplinkQueueRepository::with_caps(client.clone(), 10, 10);
        repo_a.enqueue_sample(&sample()).await.unwrap();

        let repo_b = UplinkQueueRepository::with_caps(client, 10, 10);
        assert_eq!(repo_b.samples_pending().await.unwrap(), 1);
    }
}
