// [libs/infra/btfi-verifier-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: VERIFIER CLIENT HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: ENLACE DE SUBIDA CON BÚFER Y REINTENTO
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod queue;
pub mod uplink;

pub mod prelude {
    pub use crate::client::VerifierClient;
    pub use crate::errors::VerifierError;
    pub use crate::queue::{OfflineQueue, DEFAULT_MAX_BUFFERED_EPOCHS, DEFAULT_MAX_BUFFERED_SAMPLES};
    pub use crate::uplink::{BackoffConfig, VerifierUplink};
}
