// [libs/core/btfi-crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTO DOMAIN HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1)
 * RESPONSABILIDAD: IDENTIDAD, CANONICALIZACIÓN Y FIRMA DEL NÚCLEO
 * =================================================================
 */

pub mod canon;
pub mod identity;
pub mod signer;

pub mod prelude {
    pub use crate::canon::{sha256_bytes, sha256_hex, strip_underscore_prefixed, to_canonical_bytes};
    pub use crate::identity::DeviceIdentity;
    pub use crate::signer::{sign, verify, Signable};
}
