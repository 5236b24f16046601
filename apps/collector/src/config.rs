// [apps/collector/src/config.rs]
/*!
 * =================================================================
 * APARATO: REMOTE CONFIG REGISTRY (V1.0)
 * CLASIFICACIÓN: APPLICATION LAYER (COLLECTOR PIPELINE)
 * RESPONSABILIDAD: ESQUEMA ESCRIBIBLE, VERIFICACIÓN DE FIRMA Y PERSISTENCIA
 *
 * El subconjunto escribible se enumera en tiempo de compilación.
 * Las actualizaciones remotas exigen una firma
 * Ed25519 sobre la serialización canónica del cuerpo (sin el campo de
 * firma) bajo una clave de operador confiable; sin clave confiable
 * configurada, actualizaciones no firmadas se aceptan igual.
 *
 * `team_token_emission_cap` es **[NEW]** governance-only: se rechaza
 * desde cualquier fuente remota/API aun con firma válida, porque
 * cambia política económica en vez de operación del dispositivo — ver
 * DESIGN.md para la resolución de esta Open Question.
 * =================================================================
 */

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use btfi_crypto::canon::{sha256_bytes, to_canonical_bytes};
use btfi_models::prelude::{ConfigHistoryRecord, ConfigKey, ConfigRejectReason, ConfigSource, ConfigValue};
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub enum RangeConstraint {
    None,
    Numeric { min: f64, max: f64 },
}

#[derive(Debug, Clone)]
pub struct OptionSchema {
    pub key: ConfigKey,
    pub default: ConfigValue,
    pub range: RangeConstraint,
    pub enumerated_set: Option<&'static [&'static str]>,
}

fn schema_registry() -> Vec<OptionSchema> {
    vec![
        OptionSchema {
            key: ConfigKey::SampleIntervalSeconds,
            default: ConfigValue::Int(12),
            range: RangeConstraint::Numeric { min: 5.0, max: 300.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::EpochDurationMinutes,
            default: ConfigValue::Int(60),
            range: RangeConstraint::Numeric { min: 15.0, max: 1440.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::VerifierUrl,
            default: ConfigValue::Str(String::new()),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::SyncIntervalSeconds,
            default: ConfigValue::Int(30),
            range: RangeConstraint::Numeric { min: 10.0, max: 600.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::EnableVerifierSync,
            default: ConfigValue::Bool(true),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::DefaultFanSpeed,
            default: ConfigValue::Int(50),
            range: RangeConstraint::Numeric { min: 0.0, max: 100.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::MaxFanSpeed,
            default: ConfigValue::Int(100),
            range: RangeConstraint::Numeric { min: 0.0, max: 100.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::SimulationMode,
            default: ConfigValue::Bool(true),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::VocAlertThresholdPpb,
            default: ConfigValue::Float(500.0),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::VocCriticalThresholdPpb,
            default: ConfigValue::Float(1000.0),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::AnomalySigmaThreshold,
            default: ConfigValue::Float(3.0),
            range: RangeConstraint::Numeric { min: 2.0, max: 5.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::EnableAnomalyDetection,
            default: ConfigValue::Bool(true),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::LogLevel,
            default: ConfigValue::Str("INFO".to_string()),
            range: RangeConstraint::None,
            enumerated_set: Some(&["DEBUG", "INFO", "WARNING", "ERROR"]),
        },
        OptionSchema {
            key: ConfigKey::ObjectStorageBucket,
            default: ConfigValue::Str(String::new()),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::EvidencePackRetainLocal,
            default: ConfigValue::Bool(false),
            range: RangeConstraint::None,
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::PressureImbalanceThresholdPa,
            default: ConfigValue::Float(-2.0),
            range: RangeConstraint::Numeric { min: -50.0, max: 0.0 },
            enumerated_set: None,
        },
        OptionSchema {
            key: ConfigKey::TeamTokenEmissionCap,
            default: ConfigValue::Float(f64::INFINITY),
            range: RangeConstraint::Numeric { min: 0.0, max: f64::INFINITY },
            enumerated_set: None,
        },
    ]
}

/// Cuerpo de una actualización entrante, antes de verificar la firma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUpdateBody {
    pub key: ConfigKey,
    pub value: ConfigValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedConfigUpdate {
    pub body: ConfigUpdateBody,
    /// `"ed25519:" + hex(signature)`, ausente para fuentes locales/API sin firma.
    pub signature: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigDocument {
    values: HashMap<String, ConfigValue>,
}

pub struct ConfigRegistry {
    schema: Vec<OptionSchema>,
    values: HashMap<ConfigKey, ConfigValue>,
    trusted_operator_key: Option<VerifyingKey>,
    state_dir: PathBuf,
}

impl ConfigRegistry {
    pub fn new(state_dir: PathBuf, trusted_operator_key: Option<VerifyingKey>) -> Self {
        let schema = schema_registry();
        let values = schema.iter().map(|s| (s.key, s.default.clone())).collect();

        let mut registry = Self {
            schema,
            values,
            trusted_operator_key,
            state_dir,
        };
        registry.load_persisted();
        registry
    }

    fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.json")
    }

    fn history_path(&self) -> PathBuf {
        self.state_dir.join("config_history.jsonl")
    }

    fn load_persisted(&mut self) {
        let path = self.config_path();
        if !path.exists() {
            return;
        }
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<ConfigDocument>(&contents) {
                Ok(document) => {
                    for schema in &self.schema {
                        if let Some(value) = document.values.get(schema.key.as_str()) {
                            self.values.insert(schema.key, value.clone());
                        }
                    }
                }
                Err(e) => warn!(error = %e, "⚠️ [CONFIG]: malformed config.json, keeping defaults"),
            },
            Err(e) => warn!(error = %e, "⚠️ [CONFIG]: could not read config.json, keeping defaults"),
        }
    }

    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        self.values[&key].clone()
    }

    fn schema_for(&self, key: ConfigKey) -> Option<&OptionSchema> {
        self.schema.iter().find(|s| s.key == key)
    }

    #[instrument(skip(self, update))]
    pub fn apply_update(
        &mut self,
        update: SignedConfigUpdate,
        source: ConfigSource,
    ) -> Result<ConfigHistoryRecord, ConfigRejectReason> {
        let schema = self.schema_for(update.body.key).ok_or(ConfigRejectReason::UnknownKey)?;

        if update.body.key.is_governance_only() && matches!(source, ConfigSource::Remote | ConfigSource::Api) {
            return Err(ConfigRejectReason::GovernanceOnly);
        }

        if matches!(source, ConfigSource::Remote | ConfigSource::Api) {
            self.verify_signature(&update)?;
        }

        if schema.default.type_name() != update.body.value.type_name() {
            return Err(ConfigRejectReason::TypeMismatch {
                expected: schema.default.type_name(),
                got: update.body.value.type_name(),
            });
        }

        validate_range_and_set(schema, &update.body.value)?;

        let old = self.values.get(&update.body.key).cloned();
        if old.as_ref() == Some(&update.body.value) {
            return Err(ConfigRejectReason::NoOp);
        }

        self.values.insert(update.body.key, update.body.value.clone());

        let record = ConfigHistoryRecord {
            key: update.body.key,
            old,
            new: update.body.value,
            source,
            changed_at: Utc::now(),
        };

        self.persist(&record);
        info!(key = update.body.key.as_str(), "⚙️ [CONFIG]: applied accepted mutation");
        Ok(record)
    }

    fn verify_signature(&self, update: &SignedConfigUpdate) -> Result<(), ConfigRejectReason> {
        let Some(trusted_key) = &self.trusted_operator_key else {
            return Ok(());
        };

        let signature_hex = update
            .signature
            .as_deref()
            .and_then(|s| s.strip_prefix("ed25519:"))
            .ok_or(ConfigRejectReason::UnsignedUpdateRejected)?;

        let signature_bytes: [u8; 64] = hex::decode(signature_hex)
            .map_err(|_| ConfigRejectReason::BadSignature)?
            .try_into()
            .map_err(|_| ConfigRejectReason::BadSignature)?;
        let signature = Signature::from_bytes(&signature_bytes);

        let canonical = to_canonical_bytes(&update.body).map_err(|_| ConfigRejectReason::BadSignature)?;
        let digest = sha256_bytes(&canonical);

        trusted_key
            .verify(&digest, &signature)
            .map_err(|_| ConfigRejectReason::BadSignature)
    }

    fn persist(&self, record: &ConfigHistoryRecord) {
        let document = ConfigDocument {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                .collect(),
        };

        if let Err(e) = atomic_write_json(&self.config_path(), &document) {
            warn!(error = %e, "⚠️ [CONFIG]: failed to persist config.json");
        }

        if let Ok(line) = serde_json::to_string(record) {
            if let Err(e) = append_line(&self.history_path(), &line) {
                warn!(error = %e, "⚠️ [CONFIG]: failed to append config_history.jsonl");
            }
        }
    }
}

fn validate_range_and_set(schema: &OptionSchema, value: &ConfigValue) -> Result<(), ConfigRejectReason> {
    if let RangeConstraint::Numeric { min, max } = schema.range {
        let numeric = match value {
            ConfigValue::Int(i) => *i as f64,
            ConfigValue::Float(f) => *f,
            _ => return Err(ConfigRejectReason::TypeMismatch { expected: "numeric", got: value.type_name() }),
        };
        if numeric < min || numeric > max {
            return Err(ConfigRejectReason::OutOfRange);
        }
    }

    if let Some(set) = schema.enumerated_set {
        if let ConfigValue::Str(s) = value {
            if !set.contains(&s.as_str()) {
                return Err(ConfigRejectReason::NotInEnumeratedSet);
            }
        }
    }

    Ok(())
}

/// `config.json.tmp` → fsync → rename sobre `config.json`, el mismo
/// patrón atómico de escritura-luego-rename de una bitácora de auditoría.
fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    let file = fs::File::create(&tmp_path)?;
    {
        use std::io::Write;
        let mut file = file;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unsigned_update_accepted_without_trusted_key() {
        let dir = tempdir().unwrap();
        let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), None);

        let update = SignedConfigUpdate {
            body: ConfigUpdateBody {
                key: ConfigKey::SampleIntervalSeconds,
                value: ConfigValue::Int(20),
            },
            signature: None,
        };

        let record = registry.apply_update(update, ConfigSource::Remote).unwrap();
        assert_eq!(record.new, ConfigValue::Int(20));
        assert_eq!(registry.get(ConfigKey::SampleIntervalSeconds), ConfigValue::Int(20));
    }

    #[test]
    fn unsigned_update_rejected_when_trusted_key_configured() {
        use ed25519_dalek::SigningKey;
        use rand::rngs::OsRng;

        let dir = tempdir().unwrap();
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), Some(signing_key.verifying_key()));

        let update = SignedConfigUpdate {
            body: ConfigUpdateBody {
                key: ConfigKey::SampleIntervalSeconds,
                value: ConfigValue::Int(20),
            },
            signature: None,
        };

        let result = registry.apply_update(update, ConfigSource::Remote);
        assert_eq!(result, Err(ConfigRejectReason::UnsignedUpdateRejected));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let dir = tempdir().unwrap();
        let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), None);

        let update = SignedConfigUpdate {
            body: ConfigUpdateBody {
                key: ConfigKey::SampleIntervalSeconds,
                value: ConfigValue::Int(1),
            },
            signature: None,
        };

        let result = registry.apply_update(update, ConfigSource::Remote);
        assert_eq!(result, Err(ConfigRejectReason::OutOfRange));
    }

    #[test]
    fn governance_only_key_rejected_from_remote_even_with_valid_signature() {
        use ed25519_dalek::Signer;
        use ed25519_dalek::SigningKey;
        use rand::rngs::OsRng;

        let dir = tempdir().unwrap();
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), Some(signing_key.verifying_key()));

        let body = ConfigUpdateBody {
            key: ConfigKey::TeamTokenEmissionCap,
            value: ConfigValue::Float(500.0),
        };
        let canonical = to_canonical_bytes(&body).unwrap();
        let digest = sha256_bytes(&canonical);
        let signature = signing_key.sign(&digest);

        let update = SignedConfigUpdate {
            body,
            signature: Some(format!("ed25519:{}", hex::encode(signature.to_bytes()))),
        };

        let result = registry.apply_update(update, ConfigSource::Remote);
        assert_eq!(result, Err(ConfigRejectReason::GovernanceOnly));
    }

    #[test]
    fn no_op_update_is_rejected_and_produces_no_history() {
        let dir = tempdir().unwrap();
        let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), None);

        let current = registry.get(ConfigKey::SampleIntervalSeconds);
        let update = SignedConfigUpdate {
            body: ConfigUpdateBody {
                key: ConfigKey::SampleIntervalSeconds,
                value: current,
            },
            signature: None,
        };

        let result = registry.apply_update(update, ConfigSource::Local);
        assert_eq!(result, Err(ConfigRejectReason::NoOp));
    }

    #[test]
    fn accepted_mutation_persists_across_registry_reload() {
        let dir = tempdir().unwrap();
        {
            let mut registry = ConfigRegistry::new(dir.path().to_path_buf(), None);
            let update = SignedConfigUpdate {
                body: ConfigUpdateBody {
                    key: ConfigKey::DefaultFanSpeed,
                    value: ConfigValue::Int(75),
                },
                signature: None,
            };
            registry.apply_update(update, ConfigSource::Local).unwrap();
        }

        let reloaded = ConfigRegistry::new(dir.path().to_path_buf(), None);
        assert_eq!(reloaded.get(ConfigKey::DefaultFanSpeed), ConfigValue::Int(75));
    }
}
