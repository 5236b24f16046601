// [libs/infra/btfi-evidence/src/storage.rs]
/*!
 * APARATO: OBJECT STORAGE UPLOADER (V1.0)
 * RESPONSABILIDAD: SUBIDA S3-COMPATIBLE DE EMPAQUES DE EVIDENCIA
 *
 * Sin reintento interno: una falla de almacenamiento se reporta y el
 * paquete permanece local; el uplink del verificador es la única
 * superficie con reintentos.
 */

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::errors::EvidenceError;

pub struct ObjectStorageConfig {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

pub struct ObjectStorageUploader {
    client: Client,
    bucket: String,
}

impl ObjectStorageUploader {
    pub async fn connect(config: ObjectStorageConfig) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "btfi-evidence-static",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(aws_sdk_s3::config::Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true);

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        Self {
            client,
            bucket: config.bucket,
        }
    }

    /// Claves de objeto bajo `epochs/{device_id}/{YYYY}/{MM}/{DD}/{epoch_id}.zip`.
    pub fn object_key(device_id: &str, epoch_id: &str, created_at: DateTime<Utc>) -> String {
        format!(
            "epochs/{device_id}/{}/{}/{}/{epoch_id}.zip",
            created_at.format("%Y"),
            created_at.format("%m"),
            created_at.format("%d"),
        )
    }

    #[instrument(skip(self, archive_bytes))]
    pub async fn upload(
        &self,
        object_key: &str,
        archive_bytes: Vec<u8>,
        epoch_id: &str,
        device_id: &str,
        pack_hash: &str,
        sample_count: usize,
    ) -> Result<(), EvidenceError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .body(ByteStream::from(archive_bytes))
            .metadata("epoch_id", epoch_id)
            .metadata("device_id", device_id)
            .metadata("sha256", pack_hash)
            .metadata("sample_count", sample_count.to_string())
            .send()
            .await
            .map_err(|e| EvidenceError::Upload(e.to_string()))?;

        info!(object_key, "☁️ [EVIDENCE]: uploaded pack to object storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_key_follows_the_dated_layout() {
        let created_at = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let key = ObjectStorageUploader::object_key("btfi-deadbeef", "epoch-2026072812", created_at);
        assert_eq!(key, "epochs/btfi-deadbeef/2026/07/28/epoch-2026072812.zip");
    }
}
