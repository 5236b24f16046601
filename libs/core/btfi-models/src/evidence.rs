// [libs/core/btfi-models/src/evidence.rs]
/*!
 * =================================================================
 * APARATO: EVIDENCE PACK CONTRACT (V1.0)
 * CLASIFICACIÓN: DOMAIN ENTITIES (ESTRATO L2)
 * RESPONSABILIDAD: DESCRIPCIÓN DEL ARCHIVO SELLADO POR CONTENIDO
 * =================================================================
 */

use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;
use crate::identity::DeviceIdentitySnapshot;
use crate::sample::Sample;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplesDocument {
    pub schema_version: u32,
    pub epoch_id: String,
    pub sample_interval_seconds: u32,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeafHashesDocument {
    pub epoch_id: String,
    pub hash_algorithm: String,
    pub leaves: Vec<String>,
    pub merkle_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePackMetadata {
    pub epoch_id: String,
    pub device_id: String,
    pub pack_hash: String,
    pub sample_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub storage_key: Option<String>,
    pub issuance_model_version: String,
}

/// Los cinco documentos que componen un empaque de evidencia (spec.md §3,
/// §4.9, §6). `pack_hash` en `metadata` sólo se conoce después de
/// serializar el archivo completo, por lo que se completa en dos fases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePack {
    pub epoch: Epoch,
    pub samples: SamplesDocument,
    pub device_identity: DeviceIdentitySnapshot,
    pub leaf_hashes: LeafHashesDocument,
    pub metadata: EvidencePackMetadata,
}
