//! Response body formatting.
//!
//! Endpoint responses are flat name-to-scalar mappings and can be rendered
//! as JSON, XML, or form-urlencoded. The wire format is chosen by the
//! `format` request parameter when present (an unknown value is rejected as
//! `invalid_request`, never silently defaulted), otherwise by the endpoint's
//! configured default, otherwise JSON.
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// The closed set of response body formats.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Format {
    /// `application/json`.
    #[default]
    Json,

    /// `application/xml`, a flat `<response>` element.
    Xml,

    /// `application/x-www-form-urlencoded`.
    FormUrlencoded,
}

impl Format {
    /// Resolve a `format` request parameter. Unknown values are `None`.
    pub fn from_param(value: &str) -> Option<Format> {
        match value {
            "json" => Some(Format::Json),
            "xml" => Some(Format::Xml),
            "form_urlencoded" => Some(Format::FormUrlencoded),
            _ => None,
        }
    }

    /// The `Content-Type` announced for bodies in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Xml => "application/xml",
            Format::FormUrlencoded => "application/x-www-form-urlencoded",
        }
    }
}

/// Failure to render a value in the requested format.
///
/// Rendering failures are server bugs, not client mistakes; endpoints
/// surface them as `server_error`.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The value is not a flat mapping of names to scalars.
    #[error("value does not flatten to name/scalar pairs")]
    NotFlat,

    /// The underlying serializer failed.
    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Render a flat serializable value as a body in the given format.
pub fn render<T: Serialize>(value: &T, format: Format) -> Result<String, FormatError> {
    match format {
        Format::Json => {
            serde_json::to_string(value).map_err(|err| FormatError::Serialize(err.to_string()))
        }
        Format::FormUrlencoded => {
            let pairs = flatten(value)?;
            serde_urlencoded::to_string(&pairs)
                .map_err(|err| FormatError::Serialize(err.to_string()))
        }
        Format::Xml => {
            let pairs = flatten(value)?;
            let mut writer = Writer::new(Vec::new());
            writer
                .write_event(Event::Start(BytesStart::new("response")))
                .map_err(|err| FormatError::Serialize(err.to_string()))?;
            for (key, value) in &pairs {
                writer
                    .write_event(Event::Start(BytesStart::new(key.as_str())))
                    .map_err(|err| FormatError::Serialize(err.to_string()))?;
                writer
                    .write_event(Event::Text(BytesText::new(value)))
                    .map_err(|err| FormatError::Serialize(err.to_string()))?;
                writer
                    .write_event(Event::End(BytesEnd::new(key.as_str())))
                    .map_err(|err| FormatError::Serialize(err.to_string()))?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("response")))
                .map_err(|err| FormatError::Serialize(err.to_string()))?;
            String::from_utf8(writer.into_inner())
                .map_err(|err| FormatError::Serialize(err.to_string()))
        }
    }
}

/// Reduce a serializable value to name/scalar pairs, skipping nulls.
fn flatten<T: Serialize>(value: &T) -> Result<Vec<(String, String)>, FormatError> {
    let value =
        serde_json::to_value(value).map_err(|err| FormatError::Serialize(err.to_string()))?;
    let map = match value {
        Value::Object(map) => map,
        _ => return Err(FormatError::NotFlat),
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let rendered = match value {
            Value::Null => continue,
            Value::Bool(value) => value.to_string(),
            Value::Number(value) => value.to_string(),
            Value::String(value) => value,
            Value::Array(_) | Value::Object(_) => return Err(FormatError::NotFlat),
        };
        pairs.push((key, rendered));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::error::{ErrorBody, ErrorCode, FlowError};
    use crate::grant::TokenResponse;

    use std::collections::HashMap;
    use std::str;

    use quick_xml::Reader;

    fn sample() -> TokenResponse {
        TokenResponse {
            token_type: "Bearer".into(),
            access_token: "AT1".into(),
            expires_in: 3600,
            refresh_token: Some("RT1".into()),
            scope: Some("read write".into()),
        }
    }

    fn parse_flat_xml(xml: &str) -> HashMap<String, String> {
        let mut reader = Reader::from_str(xml);
        let mut map = HashMap::new();
        let mut current: Option<String> = None;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(element) => {
                    let name = str::from_utf8(element.name().as_ref()).unwrap().to_string();
                    if name != "response" {
                        current = Some(name);
                    }
                }
                Event::Text(text) => {
                    if let Some(key) = current.clone() {
                        map.insert(key, text.unescape().unwrap().into_owned());
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }
        map
    }

    #[test]
    fn format_parameter_is_closed() {
        assert_eq!(Format::from_param("json"), Some(Format::Json));
        assert_eq!(Format::from_param("xml"), Some(Format::Xml));
        assert_eq!(
            Format::from_param("form_urlencoded"),
            Some(Format::FormUrlencoded)
        );
        assert_eq!(Format::from_param("yaml"), None);
        assert_eq!(Format::from_param("JSON"), None);
    }

    #[test]
    fn json_roundtrip() {
        let body = render(&sample(), Format::Json).unwrap();
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn form_roundtrip() {
        let body = render(&sample(), Format::FormUrlencoded).unwrap();
        let parsed: HashMap<String, String> = serde_urlencoded::from_str(&body).unwrap();
        assert_eq!(parsed["token_type"], "Bearer");
        assert_eq!(parsed["access_token"], "AT1");
        assert_eq!(parsed["expires_in"], "3600");
        assert_eq!(parsed["refresh_token"], "RT1");
        assert_eq!(parsed["scope"], "read write");
    }

    #[test]
    fn xml_roundtrip() {
        let body = render(&sample(), Format::Xml).unwrap();
        let parsed = parse_flat_xml(&body);
        assert_eq!(parsed["token_type"], "Bearer");
        assert_eq!(parsed["access_token"], "AT1");
        assert_eq!(parsed["expires_in"], "3600");
        assert_eq!(parsed["refresh_token"], "RT1");
        assert_eq!(parsed["scope"], "read write");
    }

    #[test]
    fn xml_escapes_content() {
        let error = FlowError::with_description(ErrorCode::InvalidRequest, "a < b & c");
        let body = render(&error.body(), Format::Xml).unwrap();
        assert!(body.contains("a &lt; b &amp; c"));
        let parsed = parse_flat_xml(&body);
        assert_eq!(parsed["error_description"], "a < b & c");
    }

    #[test]
    fn optional_fields_omitted() {
        let error = FlowError::new(ErrorCode::InvalidGrant);
        for format in [Format::Json, Format::Xml, Format::FormUrlencoded] {
            let body = render(&error.body(), format).unwrap();
            assert!(!body.contains("error_description"));
        }
        let parsed: ErrorBody =
            serde_json::from_str(&render(&error.body(), Format::Json).unwrap()).unwrap();
        assert_eq!(parsed.error, ErrorCode::InvalidGrant);
    }

    #[test]
    fn nested_values_are_refused() {
        let nested = serde_json::json!({"outer": {"inner": 1}});
        assert!(matches!(
            render(&nested, Format::Xml),
            Err(FormatError::NotFlat)
        ));
        assert!(matches!(
            render(&nested, Format::FormUrlencoded),
            Err(FormatError::NotFlat)
        ));
    }
}
