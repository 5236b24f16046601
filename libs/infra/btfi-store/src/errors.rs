// [libs/infra/btfi-store/src/errors.rs]
//! APARATO: STORE ERROR CATALOG (V1.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE PERSISTENCIA LOCAL

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("STORAGE_CONNECTION_FAULT: {0}")]
    Connection(String),

    #[error("STORAGE_SCHEMA_FAULT: {0}")]
    Schema(String),

    #[error("STORAGE_QUERY_FAULT: {0}")]
    Query(#[from] libsql::Error),

    #[error("STORAGE_ENCODING_FAULT: {0}")]
    Encoding(#[from] serde_json::Error),
}
