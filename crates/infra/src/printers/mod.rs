//! Printer registry.
//!
//! The registry is read-only from the scheduler's point of view: printers are
//! added and edited by the CRUD layer. `find_all` order is the order in which
//! the dispatcher probes printers.

pub mod postgres;

use std::collections::BTreeMap;
use std::sync::RwLock;

use printfarm_core::PrinterId;
use printfarm_printing::Printer;

pub use postgres::PostgresPrinterRegistry;

/// Registry error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("registry storage error: {0}")]
    Storage(String),
}

#[async_trait::async_trait]
pub trait PrinterRegistry: Send + Sync {
    /// All registered printers in ascending id order.
    async fn find_all(&self) -> Result<Vec<Printer>, RegistryError>;

    async fn find_by_id(&self, id: PrinterId) -> Result<Option<Printer>, RegistryError>;
}

/// In-memory registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPrinterRegistry {
    printers: RwLock<BTreeMap<PrinterId, Printer>>,
}

impl InMemoryPrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_printers(printers: impl IntoIterator<Item = Printer>) -> Self {
        Self {
            printers: RwLock::new(printers.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Insert or replace a printer.
    pub fn upsert(&self, printer: Printer) -> Result<(), RegistryError> {
        self.printers
            .write()
            .map_err(|_| RegistryError::Storage("registry lock poisoned".to_string()))?
            .insert(printer.id, printer);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PrinterRegistry for InMemoryPrinterRegistry {
    async fn find_all(&self) -> Result<Vec<Printer>, RegistryError> {
        let printers = self
            .printers
            .read()
            .map_err(|_| RegistryError::Storage("registry lock poisoned".to_string()))?;
        Ok(printers.values().cloned().collect())
    }

    async fn find_by_id(&self, id: PrinterId) -> Result<Option<Printer>, RegistryError> {
        let printers = self
            .printers
            .read()
            .map_err(|_| RegistryError::Storage("registry lock poisoned".to_string()))?;
        Ok(printers.get(&id).cloned())
    }
}
