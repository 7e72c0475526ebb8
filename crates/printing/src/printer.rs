//! Printer registry record.

use serde::{Deserialize, Serialize};

use printfarm_core::PrinterId;

/// A registered physical device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    pub location: Option<String>,
    /// Host (and optional port) of the device's control API.
    pub address: Option<String>,
    /// Pre-shared API key for the control API.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Connection parameters of a reachable printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEndpoint<'a> {
    pub address: &'a str,
    pub api_key: &'a str,
}

impl Printer {
    /// Both address and key, when present and non-blank.
    ///
    /// A printer without an endpoint is never probed or dispatched to.
    pub fn endpoint(&self) -> Option<DeviceEndpoint<'_>> {
        let address = self.address.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let api_key = self.api_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(DeviceEndpoint { address, api_key })
    }
}

impl core::fmt::Debug for Printer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Printer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("location", &self.location)
            .field("address", &self.address)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
