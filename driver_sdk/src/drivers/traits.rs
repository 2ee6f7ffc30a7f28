use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;

/// Configuration for one device driver instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    pub id: String,   // Unique identifier for this device instance
    pub name: String, // User-friendly name
    #[serde(default = "default_poll_rate_ms")]
    pub poll_rate_ms: u64, // How often to poll the device's tags
}

fn default_poll_rate_ms() -> u64 {
    1000
}

/// Represents a request to read one tag from a device.
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub address: String, // Protocol-specific tag address
}

// Type alias for results from driver operations
pub type DriverResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Source of raw readings for the tags of one device.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Get the configuration of this driver instance.
    fn config(&self) -> &DriverConfig;

    /// Connect to the underlying device.
    async fn connect(&self) -> DriverResult<()>;

    /// Disconnect from the underlying device.
    async fn disconnect(&self) -> DriverResult<()>;

    /// Returns Ok(()) if connected, Err otherwise.
    async fn check_status(&self) -> DriverResult<()>;

    /// Read a batch of tags.
    /// Returns a map of address to the untyped raw reading; missing addresses had no sample.
    async fn read_tags(&self, tags: &[TagRequest]) -> DriverResult<HashMap<String, serde_json::Value>>;
}
