// [libs/domain/btfi-epoch/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EPOCH DOMAIN HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: VENTANEO, MERKLE Y RESUMEN DE EPOCHS
 * =================================================================
 */

pub mod assembler;
pub mod merkle;
pub mod summary;

pub mod prelude {
    pub use crate::assembler::{ClosedEpochBatch, EpochAssembler};
    pub use crate::merkle::merkle_root;
    pub use crate::summary::summarize;
}
