// [libs/core/btfi-crypto/src/signer.rs]
/*!
 * =================================================================
 * APARATO: CANONICAL SIGNER (V1.0)
 * CLASIFICACIÓN: CORE CRYPTOGRAPHY (ESTRATO L1)
 * RESPONSABILIDAD: FIRMA Y VERIFICACIÓN DETACHED SOBRE DOCUMENTOS
 *
 * Firmar: se retira cualquier `signing` previo, se canonicaliza, se
 * calcula `h = sha256(bytes)`, se firman los bytes crudos de `h` y se
 * reinserta la envoltura. Verificar invierte el proceso (spec.md §4.4).
 * =================================================================
 */

use btfi_models::epoch::Epoch;
use btfi_models::error::CoreError;
use btfi_models::sample::{Sample, SigningEnvelope};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{de::DeserializeOwned, Serialize};

use crate::canon::{sha256_bytes, to_canonical_bytes};
use crate::identity::DeviceIdentity;

/// Implementado por los documentos de alto nivel (`Sample`, `Epoch`) que
/// llevan una envoltura de firma opcional.
pub trait Signable: Serialize + DeserializeOwned + Clone {
    fn signing(&self) -> &Option<SigningEnvelope>;
    fn with_signing(self, signing: Option<SigningEnvelope>) -> Self;
}

impl Signable for Sample {
    fn signing(&self) -> &Option<SigningEnvelope> {
        &self.signing
    }
    fn with_signing(mut self, signing: Option<SigningEnvelope>) -> Self {
        self.signing = signing;
        self
    }
}

impl Signable for Epoch {
    fn signing(&self) -> &Option<SigningEnvelope> {
        &self.signing
    }
    fn with_signing(mut self, signing: Option<SigningEnvelope>) -> Self {
        self.signing = signing;
        self
    }
}

pub fn sign<T: Signable>(document: &T, identity: &DeviceIdentity) -> Result<T, CoreError> {
    let stripped = document.clone().with_signing(None);
    let canonical_bytes = to_canonical_bytes(&stripped)?;
    let payload_hash = sha256_bytes(&canonical_bytes);

    let signature = identity.sign(&payload_hash);

    let envelope = SigningEnvelope {
        device_id: identity.device_id().to_string(),
        public_key: format!("ed25519:{}", hex::encode(identity.public_key_raw())),
        timestamp: chrono::Utc::now(),
        payload_hash: hex::encode(payload_hash),
        signature: format!("ed25519:{}", hex::encode(signature.to_bytes())),
    };

    Ok(stripped.with_signing(Some(envelope)))
}

pub fn verify<T: Signable>(document: &T) -> Result<(), CoreError> {
    let envelope = document.signing().as_ref().ok_or(CoreError::NoSignature)?;

    let stripped = document.clone().with_signing(None);
    let canonical_bytes = to_canonical_bytes(&stripped)?;
    let recomputed_hash = sha256_bytes(&canonical_bytes);

    if hex::encode(recomputed_hash) != envelope.payload_hash {
        return Err(CoreError::HashMismatch);
    }

    let public_key_hex = envelope
        .public_key
        .strip_prefix("ed25519:")
        .ok_or_else(|| CoreError::BadSignature)?;
    let signature_hex = envelope
        .signature
        .strip_prefix("ed25519:")
        .ok_or_else(|| CoreError::BadSignature)?;

    let public_key_bytes: [u8; 32] = hex::decode(public_key_hex)
        .map_err(|_| CoreError::BadSignature)?
        .try_into()
        .map_err(|_| CoreError::BadSignature)?;
    let signature_bytes: [u8; 64] = hex::decode(signature_hex)
        .map_err(|_| CoreError::BadSignature)?
        .try_into()
        .map_err(|_| CoreError::BadSignature)?;

    let verifying_key =
        VerifyingKey::from_bytes(&public_key_bytes).map_err(|_| CoreError::BadSignature)?;
    let signature = Signature::from_bytes(&signature_bytes);

    verifying_key
        .verify(&recomputed_hash, &signature)
        .map_err(|_| CoreError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use btfi_models::sample::{DerivedMetrics, EnvironmentReading, FanMetrics, StaleFlags};
    use tempfile::tempdir;

    fn fixture_sample(device_id: &str) -> Sample {
        Sample {
            timestamp: "2026-01-20T12:00:00Z".parse().unwrap(),
            monotonic_sequence: 1,
            device_id: device_id.to_string(),
            pwm_percent: 50,
            fan: FanMetrics {
                cfm: 250.0,
                rpm: 1500.0,
                power_w: 28.0,
                efficiency_cfm_w: 250.0 / 28.0,
            },
            environment: EnvironmentReading::default(),
            derived: DerivedMetrics::default(),
            anomalies: None,
            signing: None,
            stale: StaleFlags::default(),
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let dir = tempdir().unwrap();
        let identity = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let sample = fixture_sample(identity.device_id());

        let signed = sign(&sample, &identity).unwrap();
        assert!(verify(&signed).is_ok());
    }

    #[test]
    fn tampering_after_signing_fails_hash_check() {
        let dir = tempdir().unwrap();
        let identity = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let sample = fixture_sample(identity.device_id());

        let mut signed = sign(&sample, &identity).unwrap();
        signed.fan.cfm = 251.0;

        match verify(&signed) {
            Err(CoreError::HashMismatch) => {}
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn verify_without_signing_envelope_fails() {
        let sample = fixture_sample("btfi-test");
        match verify(&sample) {
            Err(CoreError::NoSignature) => {}
            other => panic!("expected NoSignature, got {other:?}"),
        }
    }
}
