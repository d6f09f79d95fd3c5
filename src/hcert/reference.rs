// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SMART Health Link reference discovery.
//!
//! Entry `5` of a health-certificate container points at a SHLink manifest
//! in one of three encodings, tried in order:
//!
//! 1. `shlink://<base64url JSON>` carrying `url`, `key`, `flag`, `exp`
//! 2. a bare base64url blob that decodes to an `http…` URL
//! 3. a plain `http…` URL
//!
//! Anything else is kept verbatim as the URL.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::cbor::{get_claim, CborValue};
use super::claims::{hcert_container, HCERT_SHLINK};
use super::json_safe::b64url_decode;

/// URI scheme prefix of a SMART Health Link.
pub const SHLINK_PREFIX: &str = "shlink://";

/// Normalized SHLink reference.
#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShlinkReference {
    /// Whether the container carried a usable entry 5.
    pub has_reference: bool,
    /// Manifest URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Decryption key from the `shlink://` payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// SHLink flags (e.g. `P` for passcode, `L` for long-term).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    /// Expiry as carried by the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Parsed `shlink://` JSON, or the entry value as found.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub raw: Option<Value>,
    /// Why a `shlink://` payload could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShlinkReference {
    pub fn none() -> Self {
        Self::default()
    }

    fn with_url(url: String, raw: &str) -> Self {
        Self {
            has_reference: true,
            url: Some(url),
            raw: Some(Value::String(raw.to_string())),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("shlink payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("shlink payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shlink payload is not a JSON object")]
    NotAnObject,
}

/// One encoding recognizer. `None` means "not mine, try the next one".
type Matcher = fn(&str) -> Option<Result<ShlinkReference, ReferenceError>>;

const MATCHERS: [(&str, Matcher); 3] = [
    ("shlink_uri", match_shlink_uri),
    ("encoded_url", match_encoded_url),
    ("plain_url", match_plain_url),
];

fn match_shlink_uri(reference: &str) -> Option<Result<ShlinkReference, ReferenceError>> {
    let encoded = reference.strip_prefix(SHLINK_PREFIX)?;
    Some(parse_shlink_payload(encoded))
}

fn parse_shlink_payload(encoded: &str) -> Result<ShlinkReference, ReferenceError> {
    let decoded = b64url_decode(encoded)?;
    let payload: Value = serde_json::from_slice(&decoded)?;
    let fields = payload.as_object().ok_or(ReferenceError::NotAnObject)?;

    let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);
    let exp = fields.get("exp").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    });

    Ok(ShlinkReference {
        has_reference: true,
        url: text("url"),
        key: text("key"),
        flags: text("flag").or_else(|| text("flags")),
        exp,
        raw: Some(payload),
        error: None,
    })
}

fn match_encoded_url(reference: &str) -> Option<Result<ShlinkReference, ReferenceError>> {
    if reference.starts_with("http") {
        return None;
    }
    let url = b64url_decode(reference)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|decoded| decoded.starts_with("http"))?;
    Some(Ok(ShlinkReference::with_url(url, reference)))
}

fn match_plain_url(reference: &str) -> Option<Result<ShlinkReference, ReferenceError>> {
    reference
        .starts_with("http")
        .then(|| Ok(ShlinkReference::with_url(reference.to_string(), reference)))
}

/// Turn an entry-5 value into the string to classify.
///
/// Accepts text, UTF-8 bytes, and arrays of pointer objects
/// (`[{"u": "shlink://…"}]`) whose first element carries `u` or `url`.
fn working_string(entry: &CborValue) -> Option<String> {
    match entry {
        CborValue::Text(text) => Some(text.clone()),
        CborValue::Bytes(bytes) => String::from_utf8(bytes.clone()).ok(),
        CborValue::Array(items) => match items.first()? {
            pointer @ CborValue::Map(_) => pointer
                .get_text("u")
                .or_else(|| pointer.get_text("url"))
                .and_then(working_string),
            first @ (CborValue::Text(_) | CborValue::Bytes(_)) => working_string(first),
            _ => None,
        },
        CborValue::Tag(_, inner) => working_string(inner),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

/// Resolve entry `5` of `container` into a normalized reference.
pub fn resolve_reference(container: &CborValue) -> ShlinkReference {
    let Some(entry) = get_claim(container, HCERT_SHLINK, &HCERT_SHLINK.to_string()) else {
        return ShlinkReference::none();
    };
    let Some(reference) = working_string(entry) else {
        tracing::debug!(kind = entry.kind(), "entry 5 present but not a usable string");
        return ShlinkReference::none();
    };

    for (name, matcher) in MATCHERS {
        let Some(outcome) = matcher(&reference) else {
            continue;
        };
        tracing::debug!(encoding = name, "classified SHLink reference");
        return match outcome {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(encoding = name, error = %err, "failed to decode SHLink reference");
                ShlinkReference {
                    has_reference: true,
                    raw: Some(Value::String(reference.clone())),
                    error: Some(err.to_string()),
                    ..ShlinkReference::default()
                }
            }
        };
    }

    // Neither base64 nor a URL: kept verbatim so lenient encoders still
    // surface something the caller can inspect.
    tracing::debug!("unrecognized SHLink reference kept as literal url");
    ShlinkReference::with_url(reference.clone(), &reference)
}

/// Resolve a reference with certificate-claim precedence.
///
/// The certificate claim (`hcert[5]`) wins; the payload container
/// (`payload[-260][5]`) is consulted only when the claim yields nothing.
pub fn resolve_from_claims(
    hcert: Option<&CborValue>,
    payload: Option<&CborValue>,
) -> Option<ShlinkReference> {
    if let Some(claim) = hcert.filter(|h| h.as_map().is_some()) {
        let resolved = resolve_reference(claim);
        if resolved.has_reference {
            return Some(resolved);
        }
    }

    let container = payload.and_then(hcert_container)?;
    let resolved = resolve_reference(container);
    resolved.has_reference.then_some(resolved)
}
