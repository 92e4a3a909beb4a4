//! JSON provider backed by `serde_json`

use super::negotiate::JSON_CONTENT_TYPE;
use super::provider::{DecodeVisitor, Provider, ProviderError};
use bytes::Bytes;

/// Reads and writes `application/json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProvider;

impl Provider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn produces(&self) -> &[&'static str] {
        &[JSON_CONTENT_TYPE]
    }

    fn consumes(&self) -> &[&'static str] {
        &[JSON_CONTENT_TYPE, "text/json"]
    }

    fn encode(&self, value: &dyn erased_serde::Serialize) -> Result<Bytes, ProviderError> {
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| ProviderError::Encode(e.to_string()))
    }

    fn decode(&self, body: &[u8], visit: DecodeVisitor<'_>) -> Result<(), ProviderError> {
        let mut de = serde_json::Deserializer::from_slice(body);
        visit(&mut <dyn erased_serde::Deserializer>::erase(&mut de))
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        de.end().map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
