// [libs/core/btfi-crypto/src/identity.rs]
/*!
 * =================================================================
 * APARATO: DEVICE IDENTITY (V1.0)
 * CLASIFICACIÓN: CORE CRYPTOGRAPHY (ESTRATO L1)
 * RESPONSABILIDAD: CUSTODIA EXCLUSIVA DEL PAR DE CLAVES ED25519
 *
 * La clave privada nunca sale de este componente. Cualquier operación
 * de firma cruza hacia aquí mediante `sign`; no existe getter para el
 * material secreto.
 * =================================================================
 */

use std::fs;
use std::path::{Path, PathBuf};

use btfi_models::error::CoreError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

const PRIVATE_KEY_FILENAME: &str = "identity.key";
const PUBLIC_KEY_FILENAME: &str = "identity.pub";
const IDENTITY_MANIFEST_FILENAME: &str = "identity.json";

/// Contenedor estructurado para la clave privada en disco. No es PKCS8
/// literal pero cumple el mismo rol (spec.md §6: "PKCS8 PEM o un
/// contenedor estructurado equivalente"), restringido a lectura del
/// propietario.
#[derive(Debug, Serialize, Deserialize)]
struct PrivateKeyContainer {
    key_algorithm: String,
    private_key_hex: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PublicKeyContainer {
    key_algorithm: String,
    public_key_hex: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityManifest {
    device_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    key_algorithm: String,
    public_key_hex: String,
}

pub struct DeviceIdentity {
    signing_key: SigningKey,
    device_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl DeviceIdentity {
    /// `"btfi-" + hex(sha256(public_key_raw)[:8])` (spec.md §4.3, invariant 4).
    pub fn derive_device_id(public_key_raw: &[u8]) -> String {
        let digest = crate::canon::sha256_bytes(public_key_raw);
        format!("btfi-{}", hex::encode(&digest[..8]))
    }

    /// Carga la identidad persistida en `state_dir`, o genera una nueva si
    /// no existe material de clave. Falla con `IdentityUnavailable` si los
    /// ficheros existen pero están corruptos o ilegibles, y es fatal si el
    /// `device_id` persistido no coincide con la derivación (spec.md §4.3).
    #[instrument(skip_all, fields(state_dir = %state_dir.display()))]
    pub fn load_or_create(state_dir: &Path) -> Result<Self, CoreError> {
        let private_key_path = state_dir.join(PRIVATE_KEY_FILENAME);

        if private_key_path.exists() {
            return Self::load(state_dir);
        }

        fs::create_dir_all(state_dir)
            .map_err(|e| CoreError::IdentityUnavailable(format!("create state dir: {e}")))?;

        info!("🔑 [IDENTITY]: No key material found, generating a new Ed25519 keypair");
        let signing_key = SigningKey::generate(&mut OsRng);
        let device_id = Self::derive_device_id(signing_key.verifying_key().as_bytes());
        let created_at = chrono::Utc::now();

        Self::persist(state_dir, &signing_key, &device_id, created_at)?;

        Ok(Self {
            signing_key,
            device_id,
            created_at,
        })
    }

    fn load(state_dir: &Path) -> Result<Self, CoreError> {
        let private_key_path = state_dir.join(PRIVATE_KEY_FILENAME);
        let manifest_path = state_dir.join(IDENTITY_MANIFEST_FILENAME);

        let key_bytes = fs::read_to_string(&private_key_path)
            .map_err(|e| CoreError::IdentityUnavailable(format!("read private key: {e}")))?;
        let container: PrivateKeyContainer = serde_json::from_str(&key_bytes)
            .map_err(|e| CoreError::IdentityUnavailable(format!("malformed private key file: {e}")))?;
        let raw = hex::decode(&container.private_key_hex)
            .map_err(|e| CoreError::IdentityUnavailable(format!("malformed private key hex: {e}")))?;
        let raw: [u8; 32] = raw
            .try_into()
            .map_err(|_| CoreError::IdentityUnavailable("private key is not 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(&raw);

        let device_id = Self::derive_device_id(signing_key.verifying_key().as_bytes());

        let manifest_bytes = fs::read_to_string(&manifest_path)
            .map_err(|e| CoreError::IdentityUnavailable(format!("read identity manifest: {e}")))?;
        let manifest: IdentityManifest = serde_json::from_str(&manifest_bytes)
            .map_err(|e| CoreError::IdentityUnavailable(format!("malformed identity manifest: {e}")))?;

        if manifest.device_id != device_id {
            // Fatal per spec.md §4.3: a mismatch here means the on-disk
            // manifest and key material disagree about who this device is.
            return Err(CoreError::IdentityUnavailable(format!(
                "persisted device_id {} does not match derivation {device_id}",
                manifest.device_id
            )));
        }

        info!(%device_id, "🔓 [IDENTITY]: Loaded existing keypair from disk");

        Ok(Self {
            signing_key,
            device_id,
            created_at: manifest.created_at,
        })
    }

    fn persist(
        state_dir: &Path,
        signing_key: &SigningKey,
        device_id: &str,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), CoreError> {
        let private_key_path = state_dir.join(PRIVATE_KEY_FILENAME);
        let public_key_path = state_dir.join(PUBLIC_KEY_FILENAME);
        let manifest_path = state_dir.join(IDENTITY_MANIFEST_FILENAME);

        let private_container = PrivateKeyContainer {
            key_algorithm: "Ed25519".to_string(),
            private_key_hex: hex::encode(signing_key.to_bytes()),
        };
        let public_container = PublicKeyContainer {
            key_algorithm: "Ed25519".to_string(),
            public_key_hex: hex::encode(signing_key.verifying_key().as_bytes()),
        };
        let manifest = IdentityManifest {
            device_id: device_id.to_string(),
            created_at,
            key_algorithm: "Ed25519".to_string(),
            public_key_hex: hex::encode(signing_key.verifying_key().as_bytes()),
        };

        write_owner_only(&private_key_path, &private_container)?;
        write_world_readable(&public_key_path, &public_container)?;
        write_world_readable(&manifest_path, &manifest)?;

        info!(%device_id, "📝 [IDENTITY]: Persisted new key material and manifest");
        Ok(())
    }

    pub fn sign(&self, bytes: &[u8]) -> Signature {
        self.signing_key.sign(bytes)
    }

    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.signing_key.verifying_key().verify(bytes, signature).is_ok()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn public_key_raw(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Bloques de identidad/hardware/criptografía para un paquete de
    /// evidencia (spec.md §4.9), con el `created_at` leído del manifiesto
    /// en la primera generación/carga.
    pub fn identity_snapshot(
        &self,
        platform: impl Into<String>,
        simulation_mode: bool,
    ) -> btfi_models::identity::DeviceIdentitySnapshot {
        btfi_models::identity::DeviceIdentitySnapshot {
            hardware: btfi_models::identity::HardwareBlock {
                platform: platform.into(),
                simulation_mode,
            },
            cryptography: btfi_models::identity::CryptographyBlock {
                key_algorithm: "Ed25519".to_string(),
                public_key_hex: hex::encode(self.public_key_raw()),
            },
            registration: btfi_models::identity::RegistrationBlock {
                device_id: self.device_id.clone(),
                created_at: self.created_at,
            },
        }
    }
}

fn write_owner_only<T: Serialize>(path: &PathBuf, value: &T) -> Result<(), CoreError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::IdentityUnavailable(format!("serialize key container: {e}")))?;
    fs::write(path, bytes).map_err(|e| CoreError::IdentityUnavailable(format!("write key file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            warn!(error = %e, "⚠️ [IDENTITY]: Could not restrict private key file permissions");
        }
    }
    Ok(())
}

fn write_world_readable<T: Serialize>(path: &PathBuf, value: &T) -> Result<(), CoreError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::IdentityUnavailable(format!("serialize public document: {e}")))?;
    fs::write(path, bytes).map_err(|e| CoreError::IdentityUnavailable(format!("write public file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn device_id_is_deterministic_from_public_key() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let raw = signing_key.verifying_key().to_bytes();
        let id_a = DeviceIdentity::derive_device_id(&raw);
        let id_b = DeviceIdentity::derive_device_id(&raw);
        assert_eq!(id_a, id_b);
        assert!(id_a.starts_with("btfi-"));
        assert_eq!(id_a.len(), "btfi-".len() + 16);
    }

    #[test]
    fn load_or_create_round_trips_across_restarts() {
        let dir = tempdir().unwrap();
        let first = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let first_id = first.device_id().to_string();
        let first_pub = first.public_key_raw();

        let second = DeviceIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(second.device_id(), first_id);
        assert_eq!(second.public_key_raw(), first_pub);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let dir = tempdir().unwrap();
        let identity = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let message = b"evidence";
        let signature = identity.sign(message);
        assert!(identity.verify(message, &signature));
        assert!(!identity.verify(b"tampered", &signature));
    }
}
