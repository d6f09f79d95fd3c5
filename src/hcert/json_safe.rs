// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-safe projection of CBOR values.
//!
//! Byte strings cannot cross a JSON boundary, so they travel as
//! `{"_b64": "<base64url, unpadded>"}` envelopes. [`unproject`] reverses the
//! envelope so values posted back by clients decode to the same bytes.

use base64::{
    alphabet,
    engine::{general_purpose::URL_SAFE_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde_json::{Map, Number, Value};

use super::cbor::CborValue;

/// Envelope key marking a base64url-encoded byte string.
pub const B64_ENVELOPE_KEY: &str = "_b64";

/// base64url decoder that tolerates missing or present padding and
/// non-canonical trailing bits.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode bytes as unpadded base64url.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, padding the input with `=` to a multiple of 4 first.
pub fn b64url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = input.trim_end_matches('=');
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    LENIENT_URL_SAFE.decode(padded)
}

/// Recursively convert a CBOR value into JSON, wrapping byte strings.
pub fn project(value: &CborValue) -> Value {
    match value {
        CborValue::Int(i) => int_to_json(*i),
        CborValue::Bytes(bytes) => bytes_envelope(bytes),
        CborValue::Text(s) => Value::String(s.clone()),
        CborValue::Array(items) => Value::Array(items.iter().map(project).collect()),
        CborValue::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, item) in entries {
                object.insert(key_to_string(key), project(item));
            }
            Value::Object(object)
        }
        CborValue::Tag(_, inner) => project(inner),
        CborValue::Bool(b) => Value::Bool(*b),
        CborValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        CborValue::Simple(n) => Value::Number(Number::from(*n)),
        CborValue::Null | CborValue::Undefined => Value::Null,
    }
}

/// Reverse [`project`]: envelopes become bytes, objects become text-keyed maps.
pub fn unproject(value: &Value) -> CborValue {
    match value {
        Value::Null => CborValue::Null,
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CborValue::Int(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                CborValue::Int(i128::from(u))
            } else {
                CborValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => CborValue::Text(s.clone()),
        Value::Array(items) => CborValue::Array(items.iter().map(unproject).collect()),
        Value::Object(object) => {
            if let Some(bytes) = envelope_bytes(object) {
                return CborValue::Bytes(bytes);
            }
            CborValue::Map(
                object
                    .iter()
                    .map(|(k, v)| (CborValue::Text(k.clone()), unproject(v)))
                    .collect(),
            )
        }
    }
}

fn bytes_envelope(bytes: &[u8]) -> Value {
    let mut object = Map::with_capacity(1);
    object.insert(
        B64_ENVELOPE_KEY.to_string(),
        Value::String(b64url_encode(bytes)),
    );
    Value::Object(object)
}

fn envelope_bytes(object: &Map<String, Value>) -> Option<Vec<u8>> {
    if object.len() != 1 {
        return None;
    }
    let encoded = object.get(B64_ENVELOPE_KEY)?.as_str()?;
    b64url_decode(encoded).ok()
}

fn int_to_json(i: i128) -> Value {
    if let Ok(small) = i64::try_from(i) {
        Value::Number(Number::from(small))
    } else if let Ok(unsigned) = u64::try_from(i) {
        Value::Number(Number::from(unsigned))
    } else {
        Value::String(i.to_string())
    }
}

fn key_to_string(key: &CborValue) -> String {
    match key {
        CborValue::Text(s) => s.clone(),
        CborValue::Int(i) => i.to_string(),
        CborValue::Bytes(b) => b64url_encode(b),
        CborValue::Tag(_, inner) => key_to_string(inner),
        other => project(other).to_string(),
    }
}
