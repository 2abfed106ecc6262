use std::time::Duration;

/// Tunables for the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEngineConfig {
    /// Whether owners may keep editing title/description/location/price after publishing.
    pub allow_owner_edit_after_publish: bool,
    /// Upper bound for a single store round trip.
    pub store_timeout: Duration,
    /// Upper bound for a single media host call.
    pub media_timeout: Duration,
}

impl Default for ListingEngineConfig {
    fn default() -> Self {
        Self {
            allow_owner_edit_after_publish: false,
            store_timeout: Duration::from_secs(5),
            media_timeout: Duration::from_secs(30),
        }
    }
}
