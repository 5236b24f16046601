// [libs/infra/btfi-evidence/src/errors.rs]
//! APARATO: EVIDENCE ERROR CATALOG (V1.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE EMPAQUE Y SUBIDA

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("CANONICALIZATION_FAULT: {0}")]
    Canonicalization(String),

    #[error("ARCHIVE_FAULT: {0}")]
    Archive(String),

    #[error("UPLOAD_FAILED: {0}")]
    Upload(String),

    #[error("LOCAL_IO_FAULT: {0}")]
    Io(#[from] std::io::Error),
}
