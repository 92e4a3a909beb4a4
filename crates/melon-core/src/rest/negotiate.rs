//! Media type parsing for content negotiation
//!
//! Parses `Accept` headers with quality values and reduces `Content-Type`
//! values to their essence (`type/subtype`, lowercase, no parameters).

use crate::error::ApiError;
use std::cmp::Ordering;

/// Media type of JSON bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Media type of XML bodies
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Content negotiation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// No provider consumes the request's content type
    #[error("no provider can read {0}")]
    UnsupportedMediaType(String),

    /// No provider produces a type the client accepts
    #[error("no provider can produce any of {0}")]
    NotAcceptable(String),

    /// The registry is empty
    #[error("no providers are registered")]
    NoProviders,
}

impl From<NegotiationError> for ApiError {
    fn from(err: NegotiationError) -> Self {
        match &err {
            NegotiationError::UnsupportedMediaType(ct) => {
                ApiError::unsupported_media_type(format!("Unsupported content type: {ct}"))
            }
            NegotiationError::NotAcceptable(accept) => {
                ApiError::not_acceptable(format!("Cannot produce a response matching: {accept}"))
            }
            NegotiationError::NoProviders => {
                ApiError::internal("Internal Server Error").with_internal(err.to_string())
            }
        }
    }
}

/// A single media range from an Accept header
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    /// Lowercase main type, `*` for any
    pub main: String,
    /// Lowercase subtype, `*` for any
    pub sub: String,
    /// Quality value (0.0 - 1.0), default is 1.0
    pub quality: f32,
}

impl MediaRange {
    /// Parse one comma-separated element of an Accept header
    pub fn parse(part: &str) -> Option<Self> {
        let mut params = part.split(';');
        let essence = params.next()?.trim().to_ascii_lowercase();
        let (main, sub) = essence.split_once('/')?;
        let (main, sub) = (main.trim(), sub.trim());
        if main.is_empty() || sub.is_empty() || (main == "*" && sub != "*") {
            return None;
        }

        let quality = params
            .filter_map(|p| p.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("q"))
            .map(|(_, v)| v.trim().parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0))
            .unwrap_or(1.0);

        Some(Self {
            main: main.to_string(),
            sub: sub.to_string(),
            quality,
        })
    }

    /// 0 for `*/*`, 1 for `type/*`, 2 for a concrete type
    pub fn specificity(&self) -> u8 {
        match (self.main.as_str(), self.sub.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    /// Whether `media_type` (an essence) falls within this range
    pub fn matches(&self, media_type: &str) -> bool {
        let Some((main, sub)) = media_type.split_once('/') else {
            return false;
        };
        (self.main == "*" || self.main.eq_ignore_ascii_case(main))
            && (self.sub == "*" || self.sub.eq_ignore_ascii_case(sub))
    }
}

/// Parsed Accept header with quality values
///
/// Ranges are sorted by quality (descending), then by specificity
/// (descending); equal entries keep header order.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptHeader {
    pub media_ranges: Vec<MediaRange>,
}

impl AcceptHeader {
    /// Parse an Accept header value; unparseable elements are skipped
    pub fn parse(header_value: &str) -> Self {
        let mut media_ranges: Vec<MediaRange> = header_value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(MediaRange::parse)
            .collect();

        media_ranges.sort_by(|a, b| {
            b.quality
                .partial_cmp(&a.quality)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.specificity().cmp(&a.specificity()))
        });

        Self { media_ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.media_ranges.is_empty()
    }

    /// Quality the client assigns to `media_type`.
    ///
    /// The most specific matching range decides; `None` when no range
    /// matches at all.
    pub fn quality_of(&self, media_type: &str) -> Option<f32> {
        self.deciding_range(media_type).map(|(_, r)| r.quality)
    }

    /// The range that decides the quality of `media_type`, with its position
    /// in [`media_ranges`](Self::media_ranges).
    ///
    /// Among matching ranges the most specific wins; ranges are already
    /// sorted by quality, so the first one at that specificity carries the
    /// highest quality.
    pub fn deciding_range(&self, media_type: &str) -> Option<(usize, &MediaRange)> {
        let mut best: Option<(usize, &MediaRange)> = None;
        for (index, range) in self.media_ranges.iter().enumerate() {
            if !range.matches(media_type) {
                continue;
            }
            if best.map_or(true, |(_, b)| range.specificity() > b.specificity()) {
                best = Some((index, range));
            }
        }
        best
    }

    /// Whether the client accepts `media_type` with a non-zero quality
    pub fn accepts(&self, media_type: &str) -> bool {
        self.quality_of(media_type).is_some_and(|q| q > 0.0)
    }
}

/// Reduce a Content-Type value to its lowercase `type/subtype`
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn parses_quality_and_sorts() {
        let accept = AcceptHeader::parse("text/html;q=0.5, application/xml, */*;q=0.1");
        let order: Vec<(String, f32)> = accept
            .media_ranges
            .iter()
            .map(|r| (format!("{}/{}", r.main, r.sub), r.quality))
            .collect();
        assert_eq!(
            order,
            vec![
                ("application/xml".to_string(), 1.0),
                ("text/html".to_string(), 0.5),
                ("*/*".to_string(), 0.1),
            ]
        );
    }

    #[test]
    fn equal_quality_prefers_specific_ranges() {
        let accept = AcceptHeader::parse("*/*, application/*, application/xml");
        let specificity: Vec<u8> = accept.media_ranges.iter().map(|r| r.specificity()).collect();
        assert_eq!(specificity, vec![2, 1, 0]);
    }

    #[test]
    fn other_parameters_are_ignored() {
        let accept = AcceptHeader::parse("application/json; charset=utf-8; q=0.7");
        assert_eq!(accept.media_ranges.len(), 1);
        assert_eq!(accept.media_ranges[0].quality, 0.7);
        assert!(accept.accepts("application/json"));
    }

    #[test]
    fn garbage_elements_are_skipped() {
        let accept = AcceptHeader::parse("nonsense, , */json, application/json");
        assert_eq!(accept.media_ranges.len(), 1);
        assert!(AcceptHeader::parse("").is_empty());
    }

    #[test]
    fn most_specific_range_decides_quality() {
        let accept = AcceptHeader::parse("*/*, application/json;q=0");
        assert_eq!(accept.quality_of("application/json"), Some(0.0));
        assert!(!accept.accepts("application/json"));
        assert!(accept.accepts("application/xml"));
        assert_eq!(AcceptHeader::parse("text/plain").quality_of("image/png"), None);
    }

    #[test]
    fn deciding_range_reports_its_position() {
        let accept = AcceptHeader::parse("*/*;q=0.8, application/json;q=0.1");
        let (index, range) = accept.deciding_range("application/json").unwrap();
        assert_eq!((index, range.quality), (1, 0.1));
        let (index, range) = accept.deciding_range("application/xml").unwrap();
        assert_eq!((index, range.quality), (0, 0.8));
    }

    #[test]
    fn essence_strips_parameters() {
        assert_eq!(essence("Application/JSON; charset=UTF-8"), "application/json");
        assert_eq!(essence("application/xml"), "application/xml");
    }

    #[test]
    fn negotiation_errors_map_to_statuses() {
        let unsupported: ApiError =
            NegotiationError::UnsupportedMediaType("text/csv".to_string()).into();
        assert_eq!(unsupported.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let not_acceptable: ApiError =
            NegotiationError::NotAcceptable("application/pdf".to_string()).into();
        assert_eq!(not_acceptable.status, StatusCode::NOT_ACCEPTABLE);

        let none: ApiError = NegotiationError::NoProviders.into();
        assert_eq!(none.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(none.internal_details().is_some());
    }
}
