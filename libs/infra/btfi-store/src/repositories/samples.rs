// [libs/infra/btfi-store/src/repositories/samples.rs]
/*!
 * APARATO: SAMPLE REPOSITORY (V1.0)
 * RESPONSABILIDAD: PERSISTENCIA ACOTADA DE MUESTRAS
 *
 * El conteo de filas vivas jamás excede `TELEMETRY_BUFFER_SIZE`: cada
 * inserción desaloja el excedente más antiguo en el mismo statement.
 */

use btfi_models::prelude::Sample;
use libsql::params;
use tracing::{instrument, warn};

use crate::client::StoreClient;
use crate::errors::StoreError;

/// Tope por defecto cuando el llamador no especifica uno propio.
pub const DEFAULT_TELEMETRY_BUFFER_SIZE: i64 = 10_000;

pub struct SampleRepository {
    client: StoreClient,
    buffer_size: i64,
}

impl SampleRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            client,
            buffer_size: DEFAULT_TELEMETRY_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(client: StoreClient, buffer_size: i64) -> Self {
        Self { client, buffer_size }
    }

    #[instrument(skip(self, sample))]
    pub async fn insert_sample(&self, sample: &Sample) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        let payload_json = serde_json::to_string(sample)?;

        connection
            .execute(
                "INSERT INTO samples
                    (device_id, timestamp, pwm_percent, cfm, power_w, tvoc_ppb, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sample.device_id.clone(),
                    sample.timestamp.to_rfc3339(),
                    sample.pwm_percent as i64,
                    sample.fan.cfm,
                    sample.fan.power_w,
                    sample.environment.tvoc_ppb,
                    payload_json,
                ],
            )
            .await?;

        self.evict_overflow().await?;
        Ok(())
    }

    async fn evict_overflow(&self) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        let mut rows = connection.query("SELECT COUNT(*) FROM samples", ()).await?;
        let live_count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        let overflow = live_count - self.buffer_size;
        if overflow > 0 {
            warn!(overflow, "🪣 [SAMPLE_STORE]: evicting oldest rows to respect buffer size");
            connection
                .execute(
                    "DELETE FROM samples WHERE id IN (
                        SELECT id FROM samples ORDER BY id ASC LIMIT ?1
                    )",
                    params![overflow],
                )
                .await?;
        }
        Ok(())
    }

    /// Returns the `limit` most recently inserted samples, in insertion
    /// order — the newest rows, oldest-first within that window, not
    /// simply the first `limit` rows ever inserted.
    #[instrument(skip(self))]
    pub async fn recent_samples(&self, limit: i64) -> Result<Vec<Sample>, StoreError> {
        let connection = self.client.connection()?;
        let mut rows = connection
            .query(
                "SELECT payload_json FROM (
                    SELECT id, payload_json FROM samples ORDER BY id DESC LIMIT ?1
                 ) ORDER BY id ASC",
                params![limit],
            )
            .await?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            samples.push(serde_json::from_str(&payload)?);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{DerivedMetrics, EnvironmentReading, FanMetrics, StaleFlags};
    use chrono::Utc;

    fn sample_at(seq: u64, device_id: &str) -> Sample {
        Sample {
            timestamp: Utc::now(),
            monotonic_sequence: seq,
            device_id: device_id.to_string(),
            pwm_percent: 50,
            fan: FanMetrics {
                cfm: 100.0,
                rpm: 1200.0,
                power_w: 12.0,
                efficiency_cfm_w: 8.3,
            },
            environment: EnvironmentReading::default(),
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        }
    }

    #[tokio::test]
    async fn inserts_and_reads_back_in_order() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = SampleRepository::new(client);

        for seq in 0..5 {
            repo.insert_sample(&sample_at(seq, "dev-a")).await.unwrap();
        }

        let recent = repo.recent_samples(10).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].monotonic_sequence, 0);
        assert_eq!(recent[4].monotonic_sequence, 4);
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_buffer_size() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = SampleRepository::with_buffer_size(client, 3);

        for seq in 0..5 {
            repo.insert_sample(&sample_at(seq, "dev-a")).await.unwrap();
        }

        let recent = repo.recent_samples(10).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].monotonic_sequence, 2);
        assert_eq!(recent[2].monotonic_sequence, 4);
    }

    #[tokio::test]
    async fn recent_samples_with_limit_returns_the_newest_not_the_oldest() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = SampleRepository::new(client);

        for seq in 0..10 {
            repo.insert_sample(&sample_at(seq, "dev-a")).await.unwrap();
        }

        let recent = repo.recent_samples(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].monotonic_sequence, 7);
        assert_eq!(recent[1].monotonic_sequence, 8);
        assert_eq!(recent[2].monotonic_sequence, 9);
    }
}
