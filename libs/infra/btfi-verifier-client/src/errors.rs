// [libs/infra/btfi-verifier-client/src/errors.rs]
//! APARATO: VERIFIER CLIENT ERROR CATALOG (V1.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE RED Y TRANSPORTE

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("NETWORK_FAULT: {0}")]
    Network(#[from] reqwest::Error),

    #[error("SERVER_REJECTION: {0}")]
    ServerRejection(String),

    #[error("ENCODING_FAULT: {0}")]
    Encoding(#[from] serde_json::Error),
}
