// [libs/domain/btfi-issuance/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ISSUANCE DOMAIN HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: CÁLCULO DE EMISIÓN DE TOKENS POR EPOCH
 * =================================================================
 */

pub mod calculator;

pub mod prelude {
    pub use crate::calculator::{IssuanceCalculator, IssuanceConfig};
}
