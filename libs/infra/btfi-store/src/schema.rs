// [libs/infra/btfi-store/src/schema.rs]
/*!
 * APARATO: STORE SCHEMA (V1.0)
 * RESPONSABILIDAD: TABLAS IDEMPOTENTES PARA MUESTRAS Y EPOCHS
 *
 * Dos tablas lógicas separadas: `samples` es append-only y acotada por
 * tamaño; `epochs` es upsert-by-`epoch_id`. Columnas escalares
 * extraídas junto al payload canónico completo para consulta sin
 * deserializar.
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

const TABLES: &[(&str, &str)] = &[
    ("TABLE_SAMPLES", r#"
        CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            pwm_percent INTEGER NOT NULL,
            cfm REAL NOT NULL,
            power_w REAL NOT NULL,
            tvoc_ppb REAL NOT NULL,
            payload_json TEXT NOT NULL,
            inserted_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_EPOCHS", r#"
        CREATE TABLE IF NOT EXISTS epochs (
            epoch_id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            start_time TEXT NOT NULL,
            sample_count INTEGER NOT NULL,
            payload_json TEXT NOT NULL,
            inserted_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PENDING_SAMPLES", r#"
        CREATE TABLE IF NOT EXISTS pending_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload_json TEXT NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT,
            inserted_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PENDING_EPOCHS", r#"
        CREATE TABLE IF NOT EXISTS pending_epochs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            epoch_id TEXT NOT NULL UNIQUE,
            payload_json TEXT NOT NULL,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            last_attempt TEXT,
            inserted_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("IDX_SAMPLES_ID", "CREATE INDEX IF NOT EXISTS idx_samples_id ON samples(id);"),
    ("IDX_EPOCHS_START", "CREATE INDEX IF NOT EXISTS idx_epochs_start ON epochs(start_time);"),
    ("IDX_PENDING_SAMPLES_ID", "CREATE INDEX IF NOT EXISTS idx_pending_samples_id ON pending_samples(id);"),
    ("IDX_PENDING_EPOCHS_ID", "CREATE INDEX IF NOT EXISTS idx_pending_epochs_id ON pending_epochs(id);"),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<()> {
    info!("🏗️ [STORE_SCHEMA]: Applying sample/epoch schema");
    for (name, sql) in TABLES {
        debug!(table = %name, "creating table");
        connection
            .execute(sql, ())
            .await
            .with_context(|| format!("failed to create table {name}"))?;
    }
    for (name, sql) in INDEXES {
        debug!(index = %name, "creating index");
        connection
            .execute(sql, ())
            .await
            .with_context(|| format!("failed to create index {name}"))?;
    }
    Ok(())
}
