//! XML provider backed by `quick-xml`'s serde support
//!
//! Structs are written with their type name as the root element. Values with
//! no name of their own (maps, sequences, primitives) are wrapped in
//! [`XML_ROOT`].
//!
//! The reader trims whitespace around text, so whitespace at the edges of a
//! text node is written as character references and `\r` always is.

use super::negotiate::XML_CONTENT_TYPE;
use super::provider::{DecodeVisitor, Provider, ProviderError};
use bytes::Bytes;
use std::fmt::Write as _;

/// Root element for values that carry no type name
pub const XML_ROOT: &str = "response";

/// Reads and writes `application/xml` and `text/xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlProvider;

impl Provider for XmlProvider {
    fn name(&self) -> &str {
        "xml"
    }

    fn produces(&self) -> &[&'static str] {
        &[XML_CONTENT_TYPE, "text/xml"]
    }

    fn consumes(&self) -> &[&'static str] {
        &[XML_CONTENT_TYPE, "text/xml"]
    }

    fn encode(&self, value: &dyn erased_serde::Serialize) -> Result<Bytes, ProviderError> {
        quick_xml::se::to_string(&value)
            .or_else(|_| quick_xml::se::to_string_with_root(XML_ROOT, &value))
            .map(|xml| Bytes::from(protect_edge_whitespace(&xml)))
            .map_err(|e| ProviderError::Encode(e.to_string()))
    }

    fn decode(&self, body: &[u8], visit: DecodeVisitor<'_>) -> Result<(), ProviderError> {
        let text = std::str::from_utf8(body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        let mut de = quick_xml::de::Deserializer::from_str(text);
        visit(&mut <dyn erased_serde::Deserializer>::erase(&mut de))
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

fn is_xml_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

/// Rewrite the text between tags so none of its whitespace is lost on read
///
/// The serializer escapes `<` and `>` everywhere outside markup, so every
/// raw `<` opens a tag and the next raw `>` closes it.
fn protect_edge_whitespace(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        push_text(&mut out, &rest[..open]);
        let close = rest[open..].find('>').map_or(rest.len(), |i| open + i + 1);
        out.push_str(&rest[open..close]);
        rest = &rest[close..];
    }
    push_text(&mut out, rest);
    out
}

fn push_text(out: &mut String, text: &str) {
    let lead = text.len() - text.trim_start_matches(is_xml_space).len();
    let tail = text.trim_end_matches(is_xml_space).len();
    for (i, ch) in text.char_indices() {
        match ch {
            '\r' => out.push_str("&#13;"),
            ' ' | '\t' | '\n' if i < lead || i >= tail => {
                let _ = write!(out, "&#{};", u32::from(ch));
            }
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        count: u32,
    }

    #[test]
    fn struct_name_becomes_the_root() {
        let item = Item {
            id: "42".to_string(),
            count: 3,
        };
        let body = XmlProvider.encode(&item).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "<Item><id>42</id><count>3</count></Item>"
        );
    }

    #[test]
    fn edge_whitespace_survives_a_round_trip() {
        let provider: &dyn Provider = &XmlProvider;
        for id in [" padded ", "\tlead", "trail\n", "   ", "in side", "cr\r\nlf"] {
            let item = Item {
                id: id.to_string(),
                count: 1,
            };
            let body = provider.encode(&item).unwrap();
            let decoded: Item = provider.decode_as(&body).unwrap();
            assert_eq!(decoded, item, "body was {:?}", std::str::from_utf8(&body));
        }
    }

    #[test]
    fn only_text_edges_are_rewritten() {
        assert_eq!(
            protect_edge_whitespace("<Item><id> a b </id><note>x\r</note></Item>"),
            "<Item><id>&#32;a b&#32;</id><note>x&#13;</note></Item>"
        );
    }

    #[test]
    fn maps_use_the_fallback_root() {
        let mut map = BTreeMap::new();
        map.insert("id", "42");
        let body = XmlProvider.encode(&map).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "<response><id>42</id></response>"
        );
    }

    #[test]
    fn decodes_into_a_concrete_type() {
        let provider: &dyn Provider = &XmlProvider;
        let item: Item = provider
            .decode_as(b"<Item><id>7</id><count>9</count></Item>")
            .unwrap();
        assert_eq!(
            item,
            Item {
                id: "7".to_string(),
                count: 9
            }
        );
        assert!(provider.decode_as::<Item>(b"<Item><id>7</id>").is_err());
    }
}
