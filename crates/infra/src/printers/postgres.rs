//! Postgres-backed printer registry.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;

use printfarm_core::PrinterId;
use printfarm_printing::Printer;

use super::{PrinterRegistry, RegistryError};

#[derive(Debug, Clone)]
pub struct PostgresPrinterRegistry {
    pool: Arc<PgPool>,
}

impl PostgresPrinterRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl PrinterRegistry for PostgresPrinterRegistry {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Printer>, RegistryError> {
        let rows = sqlx::query(
            "SELECT printer_id, name, location, ip_addr, apikey FROM printer ORDER BY printer_id ASC",
        )
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| RegistryError::Storage(format!("find_all: {e}")))?;

        rows.iter().map(decode_printer).collect()
    }

    #[instrument(skip_all, fields(printer_id = %id))]
    async fn find_by_id(&self, id: PrinterId) -> Result<Option<Printer>, RegistryError> {
        let row = sqlx::query(
            "SELECT printer_id, name, location, ip_addr, apikey FROM printer WHERE printer_id = $1",
        )
        .bind(id.get())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| RegistryError::Storage(format!("find_by_id: {e}")))?;

        row.as_ref().map(decode_printer).transpose()
    }
}

fn decode_printer(row: &sqlx::postgres::PgRow) -> Result<Printer, RegistryError> {
    let decode = |e: sqlx::Error| RegistryError::Storage(format!("failed to decode printer row: {e}"));
    Ok(Printer {
        id: PrinterId::new(row.try_get("printer_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
        address: row.try_get("ip_addr").map_err(decode)?,
        api_key: row.try_get("apikey").map_err(decode)?,
    })
}
