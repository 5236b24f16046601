// [libs/infra/btfi-evidence/src/packer.rs]
/*!
 * APARATO: EVIDENCE PACK ASSEMBLER (V1.0)
 * RESPONSABILIDAD: EMPAQUE DE CINCO DOCUMENTOS EN UN ARCHIVO ZIP SELLADO
 *
 * `pack_hash` se calcula sobre la concatenación de los bytes canónicos
 * de los cuatro documentos de contenido (epoch, samples, device_identity,
 * leaf_hashes) — `metadata.json` es el único documento que *describe*
 * el paquete y por tanto no puede participar en su propio hash sin
 * recursión. Recalcular sobre los mismos cuatro documentos siempre
 * reproduce el mismo hash.
 */

use std::io::Write;
use std::path::{Path, PathBuf};

use btfi_crypto::canon::{sha256_hex, to_canonical_bytes};
use btfi_models::prelude::{
    DeviceIdentitySnapshot, Epoch, EvidencePack, EvidencePackMetadata, LeafHashesDocument, Sample,
    SamplesDocument,
};
use chrono::Utc;
use tracing::{info, instrument};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::errors::EvidenceError;

const SAMPLES_SCHEMA_VERSION: u32 = 1;

pub struct PackInput {
    pub epoch: Epoch,
    pub samples: Vec<Sample>,
    pub device_identity: DeviceIdentitySnapshot,
    pub sample_interval_seconds: u32,
    pub issuance_model_version: String,
}

pub struct BuiltPack {
    pub pack: EvidencePack,
    pub archive_bytes: Vec<u8>,
}

#[instrument(skip(input), fields(epoch_id = %input.epoch.epoch_id))]
pub fn build_pack(input: PackInput) -> Result<BuiltPack, EvidenceError> {
    let epoch_id = input.epoch.epoch_id.clone();

    let samples_doc = SamplesDocument {
        schema_version: SAMPLES_SCHEMA_VERSION,
        epoch_id: epoch_id.clone(),
        sample_interval_seconds: input.sample_interval_seconds,
        samples: input.samples,
    };

    let leaf_hashes_doc = LeafHashesDocument {
        epoch_id: epoch_id.clone(),
        hash_algorithm: "sha256".to_string(),
        leaves: input.epoch.leaf_hashes.clone(),
        merkle_root: input.epoch.merkle_root.clone(),
    };

    let pack_hash = content_hash(&input.epoch, &samples_doc, &input.device_identity, &leaf_hashes_doc)?;

    let metadata = EvidencePackMetadata {
        epoch_id: epoch_id.clone(),
        device_id: input.device_identity.registration.device_id.clone(),
        pack_hash,
        sample_count: input.epoch.sample_count,
        created_at: Utc::now(),
        storage_key: None,
        issuance_model_version: input.issuance_model_version,
    };

    let pack = EvidencePack {
        epoch: input.epoch,
        samples: samples_doc,
        device_identity: input.device_identity,
        leaf_hashes: leaf_hashes_doc,
        metadata,
    };

    let archive_bytes = write_archive(&pack)?;

    info!(%epoch_id, pack_hash = %pack.metadata.pack_hash, "📦 [EVIDENCE]: assembled pack archive");
    Ok(BuiltPack { pack, archive_bytes })
}

fn content_hash(
    epoch: &Epoch,
    samples: &SamplesDocument,
    device_identity: &DeviceIdentitySnapshot,
    leaf_hashes: &LeafHashesDocument,
) -> Result<String, EvidenceError> {
    let mut buffer = Vec::new();
    buffer.extend(to_canonical_bytes(epoch).map_err(|e| EvidenceError::Canonicalization(e.to_string()))?);
    buffer.extend(to_canonical_bytes(samples).map_err(|e| EvidenceError::Canonicalization(e.to_string()))?);
    buffer.extend(
        to_canonical_bytes(device_identity).map_err(|e| EvidenceError::Canonicalization(e.to_string()))?,
    );
    buffer.extend(
        to_canonical_bytes(leaf_hashes).map_err(|e| EvidenceError::Canonicalization(e.to_string()))?,
    );
    Ok(sha256_hex(&buffer))
}

fn write_archive(pack: &EvidencePack) -> Result<Vec<u8>, EvidenceError> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options: FileOptions = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        write_entry(&mut writer, options, "epoch.json", &pack.epoch)?;
        write_entry(&mut writer, options, "samples.json", &pack.samples)?;
        write_entry(&mut writer, options, "device_identity.json", &pack.device_identity)?;
        write_entry(&mut writer, options, "leaf_hashes.json", &pack.leaf_hashes)?;
        write_entry(&mut writer, options, "metadata.json", &pack.metadata)?;

        writer
            .finish()
            .map_err(|e| EvidenceError::Archive(format!("finalize zip: {e}")))?;
    }
    Ok(cursor.into_inner())
}

fn write_entry<T: serde::Serialize>(
    writer: &mut ZipWriter<&mut std::io::Cursor<Vec<u8>>>,
    options: FileOptions,
    name: &str,
    value: &T,
) -> Result<(), EvidenceError> {
    let bytes = to_canonical_bytes(value).map_err(|e| EvidenceError::Canonicalization(e.to_string()))?;
    writer
        .start_file(name, options)
        .map_err(|e| EvidenceError::Archive(format!("start entry {name}: {e}")))?;
    writer
        .write_all(&bytes)
        .map_err(|e| EvidenceError::Archive(format!("write entry {name}: {e}")))?;
    Ok(())
}

/// Persiste el archivo en disco bajo `local_dir/{epoch_id}.zip`.
pub fn write_local_copy(local_dir: &Path, epoch_id: &str, archive_bytes: &[u8]) -> Result<PathBuf, EvidenceError> {
    std::fs::create_dir_all(local_dir)?;
    let path = local_dir.join(format!("{epoch_id}.zip"));
    std::fs::write(&path, archive_bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::prelude::{
        AirQualitySummary, CryptographyBlock, EpochSummary, EpochTime, FanPerformanceSummary,
        HardwareBlock, MitigationSummary, RegistrationBlock,
    };
    use chrono::Utc;

    fn sample_epoch() -> Epoch {
        Epoch {
            epoch_id: "epoch-2026072800-btfi-deadbeef".to_string(),
            time: EpochTime {
                start: Utc::now(),
                end: Utc::now(),
                duration_minutes: 60.0,
            },
            sample_count: 0,
            summary: EpochSummary {
                fan_performance: FanPerformanceSummary::default(),
                air_quality: AirQualitySummary::default(),
                mitigation: MitigationSummary::default(),
            },
            merkle_root: sha256_hex(b""),
            leaf_hashes: vec![],
            issuance: None,
            signing: None,
        }
    }

    fn sample_identity() -> DeviceIdentitySnapshot {
        DeviceIdentitySnapshot {
            hardware: HardwareBlock {
                platform: "sbc-sim".to_string(),
                simulation_mode: true,
            },
            cryptography: CryptographyBlock {
                key_algorithm: "Ed25519".to_string(),
                public_key_hex: "ab".repeat(32),
            },
            registration: RegistrationBlock {
                device_id: "btfi-deadbeef".to_string(),
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn build_pack_produces_a_readable_zip_with_five_entries() {
        let input = PackInput {
            epoch: sample_epoch(),
            samples: vec![],
            device_identity: sample_identity(),
            sample_interval_seconds: 12,
            issuance_model_version: "v1".to_string(),
        };

        let built = build_pack(input).unwrap();
        let reader = std::io::Cursor::new(built.archive_bytes.clone());
        let mut archive = zip::ZipArchive::new(reader).unwrap();
        assert_eq!(archive.len(), 5);

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"epoch.json".to_string()));
        assert!(names.contains(&"metadata.json".to_string()));
    }

    #[test]
    fn recomputing_content_hash_reproduces_pack_hash() {
        let input = PackInput {
            epoch: sample_epoch(),
            samples: vec![],
            device_identity: sample_identity(),
            sample_interval_seconds: 12,
            issuance_model_version: "v1".to_string(),
        };

        let built = build_pack(input).unwrap();
        let recomputed = content_hash(
            &built.pack.epoch,
            &built.pack.samples,
            &built.pack.device_identity,
            &built.pack.leaf_hashes,
        )
        .unwrap();

        assert_eq!(recomputed, built.pack.metadata.pack_hash);
    }
}
