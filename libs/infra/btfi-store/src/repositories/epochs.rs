// [libs/infra/btfi-store/src/repositories/epochs.rs]
/*!
 * APARATO: EPOCH REPOSITORY (V1.0)
 * RESPONSABILIDAD: PERSISTENCIA UPSERT-BY-EPOCH_ID
 *
 * Un epoch re-emitido con el mismo `epoch_id` sobreescribe a su
 * predecesor.
 */

use btfi_models::prelude::Epoch;
use libsql::params;
use tracing::instrument;

use crate::client::StoreClient;
use crate::errors::StoreError;

pub struct EpochRepository {
    client: StoreClient,
}

impl EpochRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, epoch))]
    pub async fn upsert_epoch(&self, epoch: &Epoch) -> Result<(), StoreError> {
        let connection = self.client.connection()?;
        let payload_json = serde_json::to_string(epoch)?;

        connection
            .execute(
                "INSERT INTO epochs (epoch_id, device_id, start_time, sample_count, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(epoch_id) DO UPDATE SET
                    device_id = excluded.device_id,
                    start_time = excluded.start_time,
                    sample_count = excluded.sample_count,
                    payload_json = excluded.payload_json,
                    inserted_at = CURRENT_TIMESTAMP",
                params![
                    epoch.epoch_id.clone(),
                    epoch
                        .signing
                        .as_ref()
                        .map(|s| s.device_id.clone())
                        .unwrap_or_default(),
                    epoch.time.start.to_rfc3339(),
                    epoch.sample_count as i64,
                    payload_json,
                ],
            )
            .await?;

        Ok(())
    }

    /// Returns the `limit` most recently upserted epochs, in insertion
    /// order — mirrors `SampleRepository::recent_samples`'s newest-window,
    /// oldest-first-within-window shape.
    #[instrument(skip(self))]
    pub async fn recent_epochs(&self, limit: i64) -> Result<Vec<Epoch>, StoreError> {
        let connection = self.client.connection()?;
        let mut rows = connection
            .query(
                "SELECT payload_json FROM (
                    SELECT rowid, inserted_at, payload_json FROM epochs
                    ORDER BY inserted_at DESC, rowid DESC LIMIT ?1
                 ) ORDER BY inserted_at ASC, rowid ASC",
                params![limit],
            )
            .await?;

        let mut epochs = Vec::new();
        while let Some(row) = rows.next().await? {
            let payload: String = row.get(0)?;
            epochs.push(serde_json::from_str(&payload)?);
        }
        Ok(epochs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{AirQualitySummary, EpochSummary, EpochTime, FanPerformanceSummary, MitigationSummary};
    use chrono::Utc;

    fn epoch_with_id(epoch_id: &str, sample_count: usize) -> Epoch {
        Epoch {
            epoch_id: epoch_id.to_string(),
            time: EpochTime {
                start: Utc::now(),
                end: Utc::now(),
                duration_minutes: 60.0,
            },
            sample_count,
            summary: EpochSummary {
                fan_performance: FanPerformanceSummary::default(),
                air_quality: AirQualitySummary::default(),
                mitigation: MitigationSummary::default(),
            },
            merkle_root: "deadbeef".to_string(),
            leaf_hashes: vec!["a".to_string(); sample_count],
            issuance: None,
            signing: None,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_same_epoch_id() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = EpochRepository::new(client);

        repo.upsert_epoch(&epoch_with_id("epoch-1", 5)).await.unwrap();
        repo.upsert_epoch(&epoch_with_id("epoch-1", 7)).await.unwrap();

        let stored = repo.recent_epochs(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sample_count, 7);
    }

    #[tokio::test]
    async fn distinct_epoch_ids_both_persist() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = EpochRepository::new(client);

        repo.upsert_epoch(&epoch_with_id("epoch-1", 5)).await.unwrap();
        repo.upsert_epoch(&epoch_with_id("epoch-2", 5)).await.unwrap();

        let stored = repo.recent_epochs(10).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn recent_epochs_with_limit_returns_the_newest_not_the_oldest() {
        let client = StoreClient::connect(":memory:").await.unwrap();
        let repo = EpochRepository::new(client);

        for i in 0..5 {
            repo.upsert_epoch(&epoch_with_id(&format!("epoch-{i}"), i)).await.unwrap();
        }

        let stored = repo.recent_epochs(2).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].epoch_id, "epoch-3");
        assert_eq!(stored[1].epoch_id, "epoch-4");
    }
}
