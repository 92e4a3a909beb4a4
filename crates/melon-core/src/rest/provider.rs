//! Pluggable serializers and the registry that negotiates between them
//!
//! A [`Provider`] declares the media types it can produce and consume and
//! converts between bytes and values. Values cross the trait boundary type
//! erased through `erased-serde`, so one provider object serves every entity
//! type.
//!
//! The [`ProviderRegistry`] keeps providers in registration order. That order
//! is the only priority there is: on equal client preference the earlier
//! provider wins, and with no preference at all the first one is used.

use super::negotiate::{essence, AcceptHeader, NegotiationError};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::cmp::Reverse;
use std::sync::Arc;

/// Callback handed an erased deserializer positioned at the body
pub type DecodeVisitor<'a> =
    &'a mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), erased_serde::Error>;

/// Encoding or decoding failure inside a provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// A serializer bound to one or more media types
pub trait Provider: Send + Sync + 'static {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Media types this provider writes, most preferred first
    fn produces(&self) -> &[&'static str];

    /// Media types this provider reads
    fn consumes(&self) -> &[&'static str];

    /// Serialize a value into a response body
    fn encode(&self, value: &dyn erased_serde::Serialize) -> Result<Bytes, ProviderError>;

    /// Parse `body` and hand the deserializer to `visit`
    fn decode(&self, body: &[u8], visit: DecodeVisitor<'_>) -> Result<(), ProviderError>;
}

impl dyn Provider {
    /// Decode a body into a fresh `T`
    pub fn decode_as<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, ProviderError> {
        let mut out: Option<T> = None;
        self.decode(body, &mut |de| {
            out = Some(erased_serde::deserialize::<T>(de)?);
            Ok(())
        })?;
        out.ok_or_else(|| ProviderError::Decode("provider produced no value".to_string()))
    }
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("produces", &self.produces())
            .field("consumes", &self.consumes())
            .finish()
    }
}

/// Result of writer negotiation
#[derive(Clone)]
pub struct Selected {
    pub provider: Arc<dyn Provider>,
    /// The concrete media type to put in `Content-Type`
    pub media_type: &'static str,
}

impl std::fmt::Debug for Selected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selected")
            .field("provider", &self.provider.name())
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// Ordered list of providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registry holding the built-in JSON and XML providers, in that order
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::json::JsonProvider));
        registry.register(Arc::new(super::xml::XmlProvider));
        registry
    }

    /// Append a provider
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        tracing::debug!(provider = provider.name(), "Provider registered");
        self.providers.push(provider);
    }

    /// Append several providers, keeping their order
    pub fn register_all(&mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) {
        for provider in providers {
            self.register(provider);
        }
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Pick the provider and media type for a response
    ///
    /// Every produced type is weighed by the client's most specific matching
    /// range; types with no match or a zero quality are out. The highest
    /// quality wins, then the more specific range, then the range listed
    /// first, then registration order.
    pub fn select_writer(&self, accept: Option<&str>) -> Result<Selected, NegotiationError> {
        let first = self.providers.first().ok_or(NegotiationError::NoProviders)?;

        let header = accept.map(str::trim).filter(|a| !a.is_empty());
        let Some(raw) = header else {
            return default_selection(first);
        };
        let accept = AcceptHeader::parse(raw);
        if accept.is_empty() {
            return default_selection(first);
        }

        let mut best: Option<((f32, u8, Reverse<usize>), &Arc<dyn Provider>, &'static str)> = None;
        for provider in &self.providers {
            for &media_type in provider.produces() {
                let Some((index, range)) = accept.deciding_range(media_type) else {
                    continue;
                };
                if range.quality <= 0.0 {
                    continue;
                }
                let rank = (range.quality, range.specificity(), Reverse(index));
                if best.as_ref().map_or(true, |(top, ..)| rank > *top) {
                    best = Some((rank, provider, media_type));
                }
            }
        }

        match best {
            Some((_, provider, media_type)) => Ok(Selected {
                provider: provider.clone(),
                media_type,
            }),
            None => Err(NegotiationError::NotAcceptable(raw.to_string())),
        }
    }

    /// Pick the provider that reads a request body
    ///
    /// A missing `Content-Type` selects the first registered provider.
    pub fn select_reader(
        &self,
        content_type: Option<&str>,
    ) -> Result<Arc<dyn Provider>, NegotiationError> {
        let first = self.providers.first().ok_or(NegotiationError::NoProviders)?;

        let declared = content_type.map(essence).filter(|ct| !ct.is_empty());
        let Some(declared) = declared else {
            return Ok(first.clone());
        };

        self.providers
            .iter()
            .find(|p| p.consumes().iter().any(|c| c.eq_ignore_ascii_case(&declared)))
            .cloned()
            .ok_or(NegotiationError::UnsupportedMediaType(declared))
    }
}

fn default_selection(provider: &Arc<dyn Provider>) -> Result<Selected, NegotiationError> {
    let media_type = provider
        .produces()
        .first()
        .copied()
        .ok_or(NegotiationError::NoProviders)?;
    Ok(Selected {
        provider: provider.clone(),
        media_type,
    })
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::negotiate::{JSON_CONTENT_TYPE, XML_CONTENT_TYPE};
    use proptest::prelude::*;

    /// Writes plain text only
    struct TextProvider;

    impl Provider for TextProvider {
        fn name(&self) -> &str {
            "text"
        }
        fn produces(&self) -> &[&'static str] {
            &["text/plain"]
        }
        fn consumes(&self) -> &[&'static str] {
            &["text/plain"]
        }
        fn encode(&self, value: &dyn erased_serde::Serialize) -> Result<Bytes, ProviderError> {
            serde_json::to_vec(&value)
                .map(Bytes::from)
                .map_err(|e| ProviderError::Encode(e.to_string()))
        }
        fn decode(&self, _body: &[u8], _visit: DecodeVisitor<'_>) -> Result<(), ProviderError> {
            Err(ProviderError::Decode("write-only".to_string()))
        }
    }

    fn writer(registry: &ProviderRegistry, accept: Option<&str>) -> Result<&'static str, NegotiationError> {
        registry.select_writer(accept).map(|s| s.media_type)
    }

    #[test]
    fn accept_selects_matching_provider() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(writer(&registry, Some("application/xml")), Ok(XML_CONTENT_TYPE));
        assert_eq!(writer(&registry, Some("application/json")), Ok(JSON_CONTENT_TYPE));
        assert_eq!(writer(&registry, Some("text/xml")).map(|_| ()), Ok(()));
    }

    #[test]
    fn missing_or_wildcard_accept_selects_first() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(writer(&registry, None), Ok(JSON_CONTENT_TYPE));
        assert_eq!(writer(&registry, Some("")), Ok(JSON_CONTENT_TYPE));
        assert_eq!(writer(&registry, Some("*/*")), Ok(JSON_CONTENT_TYPE));
        assert_eq!(writer(&registry, Some("application/*")), Ok(JSON_CONTENT_TYPE));
    }

    #[test]
    fn unacceptable_accept_fails() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(
            writer(&registry, Some("application/pdf")),
            Err(NegotiationError::NotAcceptable("application/pdf".to_string()))
        );
    }

    #[test]
    fn higher_quality_wins_over_registration_order() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(
            writer(&registry, Some("application/json;q=0.4, application/xml;q=0.9")),
            Ok(XML_CONTENT_TYPE)
        );
    }

    #[test]
    fn specific_range_weight_beats_broader_range() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(
            writer(&registry, Some("*/*;q=0.8, application/json;q=0.1")),
            Ok(XML_CONTENT_TYPE)
        );
        assert_eq!(
            writer(&registry, Some("application/*;q=0.9, application/json;q=0.5")),
            Ok(XML_CONTENT_TYPE)
        );
        assert_eq!(
            writer(&registry, Some("application/*;q=0.5, application/json;q=0.9")),
            Ok(JSON_CONTENT_TYPE)
        );
    }

    #[test]
    fn zero_quality_excludes_a_type() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(
            writer(&registry, Some("*/*, application/json;q=0")),
            Ok(XML_CONTENT_TYPE)
        );
        assert!(writer(&registry, Some("application/json;q=0")).is_err());
    }

    #[test]
    fn reader_matches_content_type_essence() {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register(Arc::new(TextProvider));

        let reader = registry.select_reader(Some("application/xml; charset=utf-8")).unwrap();
        assert_eq!(reader.name(), "xml");
        let reader = registry.select_reader(Some("TEXT/PLAIN")).unwrap();
        assert_eq!(reader.name(), "text");
        let reader = registry.select_reader(None).unwrap();
        assert_eq!(reader.name(), "json");
        assert_eq!(
            registry.select_reader(Some("text/csv")).err(),
            Some(NegotiationError::UnsupportedMediaType("text/csv".to_string()))
        );
    }

    #[test]
    fn empty_registry_reports_no_providers() {
        let registry = ProviderRegistry::new();
        assert_eq!(writer(&registry, None), Err(NegotiationError::NoProviders));
        assert_eq!(
            registry.select_reader(None).err(),
            Some(NegotiationError::NoProviders)
        );
    }

    #[test]
    fn registration_order_breaks_ties() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(TextProvider));
        registry.register_all(ProviderRegistry::with_defaults().providers().to_vec());
        assert_eq!(writer(&registry, None), Ok("text/plain"));
        assert_eq!(
            writer(&registry, Some("application/json, text/plain")),
            Ok(JSON_CONTENT_TYPE)
        );
    }

    // **Feature: content-negotiation, Property 1: Selected type is acceptable**
    //
    // Whenever a writer is selected for an explicit Accept header, the chosen
    // media type is accepted by that header with a non-zero quality, and no
    // other producible type carries a higher quality.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_selected_writer_is_acceptable(
            ranges in prop::collection::vec(
                (
                    prop::sample::select(vec![
                        "application/json", "application/xml", "text/xml",
                        "application/*", "text/*", "*/*", "application/pdf",
                    ]),
                    0u8..=10u8,
                ),
                1..5,
            ),
        ) {
            let header = ranges
                .iter()
                .map(|(mt, q)| format!("{mt};q={}", f32::from(*q) / 10.0))
                .collect::<Vec<_>>()
                .join(", ");
            let accept = AcceptHeader::parse(&header);
            let registry = ProviderRegistry::with_defaults();

            match registry.select_writer(Some(&header)) {
                Ok(selected) => {
                    prop_assert!(accept.accepts(selected.media_type));
                    let chosen = accept.quality_of(selected.media_type).unwrap_or(0.0);
                    for provider in registry.providers() {
                        for mt in provider.produces() {
                            prop_assert!(accept.quality_of(mt).unwrap_or(0.0) <= chosen);
                        }
                    }
                }
                Err(NegotiationError::NotAcceptable(_)) => {
                    for provider in registry.providers() {
                        for mt in provider.produces() {
                            prop_assert!(!accept.accepts(mt));
                        }
                    }
                }
                Err(other) => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
