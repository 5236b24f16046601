// [libs/infra/btfi-store/src/lib.rs]
/*!
 * =================================================================
 * APARATO: STORE INFRASTRUCTURE HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA LOCAL DURABLE DE MUESTRAS Y EPOCHS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub mod prelude {
    pub use crate::client::StoreClient;
    pub use crate::errors::StoreError;
    pub use crate::repositories::{EpochRepository, SampleRepository, UplinkQueueRepository};
    pub use crate::repositories::samples::DEFAULT_TELEMETRY_BUFFER_SIZE;
    pub use crate::repositories::uplink_queue::{
        QueuedEpoch, QueuedSample, DEFAULT_MAX_BUFFERED_EPOCHS, DEFAULT_MAX_BUFFERED_SAMPLES,
    };
}
