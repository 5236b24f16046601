// [libs/infra/btfi-evidence/src/lib.rs]
/*!
 * =================================================================
 * APARATO: EVIDENCE INFRASTRUCTURE HUB (V1.0)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L3)
 * RESPONSABILIDAD: EMPAQUE Y SUBIDA DE EVIDENCIA SELLADA POR CONTENIDO
 * =================================================================
 */

pub mod errors;
pub mod packer;
pub mod storage;

use std::path::Path;

use tracing::info;

pub mod prelude {
    pub use crate::errors::EvidenceError;
    pub use crate::packer::{build_pack, write_local_copy, BuiltPack, PackInput};
    pub use crate::storage::{ObjectStorageConfig, ObjectStorageUploader};
}

/// Borra la copia local tras una subida exitosa cuando `retain_local`
/// es falso; en caso contrario, o si no se configuró almacenamiento
/// remoto, la copia permanece en disco.
pub fn apply_retention_policy(local_path: &Path, retain_local: bool) -> std::io::Result<()> {
    if retain_local {
        return Ok(());
    }
    if local_path.exists() {
        std::fs::remove_file(local_path)?;
        info!(path = %local_path.display(), "🗑️ [EVIDENCE]: removed local copy per retention policy");
    }
    Ok(())
}
