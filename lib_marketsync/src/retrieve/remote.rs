use async_trait::async_trait;
use serde_json::Value;

use crate::errors::TransportError;

/// # Remote Fetch
///
/// Returns the raw JSON payload behind `endpoint`. Implementations own timeouts
/// and transport-level retries; callers only see the final outcome.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    /// Fetches `endpoint`, which is relative to whatever base the implementation holds.
    async fn fetch(&self, endpoint: &str) -> Result<Value, TransportError>;
}
