// [libs/infra/btfi-store/src/client.rs]
/*!
 * APARATO: STORE CONNECTION CLIENT (V1.0)
 * RESPONSABILIDAD: ENLACE LOCAL/REMOTO Y BOOTSTRAP DE ESQUEMA
 *
 * Para URLs `:memory:` se ancla una conexión viva para que el esquema
 * sobreviva entre llamadas (libsql purga bases en RAM sin un handle
 * abierto), el mismo patrón que el cliente Turso de referencia.
 */

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::schema::apply_schema;

#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    #[instrument]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        if database_url.is_empty() {
            return Err(StoreError::Connection("database url is empty".into()));
        }

        let is_memory = database_url.contains(":memory:");
        let database = Builder::new_local(database_url)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("failed to open local database: {e}")))?;
        let database = Arc::new(database);

        let anchor = if is_memory {
            let conn = database
                .connect()
                .map_err(|e| StoreError::Connection(format!("memory anchor: {e}")))?;
            apply_schema(&conn)
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
            Some(Arc::new(conn))
        } else {
            let conn = database
                .connect()
                .map_err(|e| StoreError::Connection(format!("bootstrap connection: {e}")))?;
            apply_schema(&conn)
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
            None
        };

        info!(database_url, "📦 [STORE]: connected and schema applied");
        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}
