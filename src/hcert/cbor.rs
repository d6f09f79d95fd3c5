// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic CBOR value tree and its decoder.
//!
//! Maps keep their wire order and accept any key type, because CWT claim
//! maps mix integer labels with text labels (and text spellings of integer
//! labels once a value has crossed a JSON boundary).

use minicbor::data::Type;
use minicbor::Decoder;

/// Maximum nesting of arrays, maps and tags accepted by the decoder.
pub const MAX_DEPTH: usize = 128;

/// A decoded CBOR data item.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    /// Major types 0 and 1. Covers the full `-2^64 ..= 2^64-1` range.
    Int(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    Map(Vec<(CborValue, CborValue)>),
    Tag(u64, Box<CborValue>),
    Bool(bool),
    Float(f64),
    Simple(u8),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CborError {
    #[error("no CBOR data")]
    Empty,

    #[error("CBOR decode failed at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("CBOR nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
}

impl CborValue {
    /// Decode the first CBOR data item in `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CborError> {
        if bytes.is_empty() {
            return Err(CborError::Empty);
        }
        let mut dec = Decoder::new(bytes);
        let value = decode_value(&mut dec, 0)?;
        if dec.position() != bytes.len() {
            tracing::debug!(
                trailing = bytes.len() - dec.position(),
                "ignoring trailing bytes after CBOR item"
            );
        }
        Ok(value)
    }

    /// Short human-readable name of the variant, used in error details.
    pub fn kind(&self) -> &'static str {
        match self {
            CborValue::Int(_) => "integer",
            CborValue::Bytes(_) => "byte string",
            CborValue::Text(_) => "text string",
            CborValue::Array(_) => "array",
            CborValue::Map(_) => "map",
            CborValue::Tag(..) => "tag",
            CborValue::Bool(_) => "boolean",
            CborValue::Float(_) => "float",
            CborValue::Simple(_) => "simple value",
            CborValue::Null => "null",
            CborValue::Undefined => "undefined",
        }
    }

    pub fn empty_map() -> Self {
        CborValue::Map(Vec::new())
    }

    pub fn as_map(&self) -> Option<&[(CborValue, CborValue)]> {
        match self {
            CborValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CborValue::Int(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Look up an integer-labelled entry.
    pub fn get_int(&self, key: i64) -> Option<&CborValue> {
        let key = i128::from(key);
        self.as_map()?
            .iter()
            .find(|(k, _)| matches!(k, CborValue::Int(i) if *i == key))
            .map(|(_, v)| v)
    }

    /// Look up a text-labelled entry.
    pub fn get_text(&self, key: &str) -> Option<&CborValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| matches!(k, CborValue::Text(s) if s == key))
            .map(|(_, v)| v)
    }

    /// Strip any number of semantic tags, returning the innermost value and
    /// the tag numbers from outermost to innermost.
    pub fn untagged(&self) -> (&CborValue, Vec<u64>) {
        let mut tags = Vec::new();
        let mut current = self;
        while let CborValue::Tag(tag, inner) = current {
            tracing::debug!(tag = *tag, "unwrapping CBOR tag");
            tags.push(*tag);
            current = inner;
        }
        (current, tags)
    }
}

/// Look up a claim that may be labelled by an integer or by its text form.
///
/// The integer label is checked first. Returns `None` when `map` is not a map.
pub fn get_claim<'a>(map: &'a CborValue, int_key: i64, str_key: &str) -> Option<&'a CborValue> {
    map.get_int(int_key).or_else(|| map.get_text(str_key))
}

fn malformed(dec: &Decoder<'_>, err: impl std::fmt::Display) -> CborError {
    CborError::Malformed {
        position: dec.position(),
        message: err.to_string(),
    }
}

fn at_break(dec: &mut Decoder<'_>) -> Result<bool, CborError> {
    let datatype = dec.datatype().map_err(|e| malformed(dec, e))?;
    Ok(matches!(datatype, Type::Break))
}

fn skip_break(dec: &mut Decoder<'_>) {
    dec.set_position(dec.position() + 1);
}

fn decode_value(dec: &mut Decoder<'_>, depth: usize) -> Result<CborValue, CborError> {
    if depth > MAX_DEPTH {
        return Err(CborError::TooDeep);
    }

    let datatype = dec.datatype().map_err(|e| malformed(dec, e))?;
    match datatype {
        Type::Bool => dec
            .bool()
            .map(CborValue::Bool)
            .map_err(|e| malformed(dec, e)),
        Type::Null => {
            dec.null().map_err(|e| malformed(dec, e))?;
            Ok(CborValue::Null)
        }
        Type::Undefined => {
            dec.undefined().map_err(|e| malformed(dec, e))?;
            Ok(CborValue::Undefined)
        }
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => {
            let int = dec.int().map_err(|e| malformed(dec, e))?;
            Ok(CborValue::Int(i128::from(int)))
        }
        Type::F16 => dec
            .f16()
            .map(|f| CborValue::Float(f64::from(f)))
            .map_err(|e| malformed(dec, e)),
        Type::F32 => dec
            .f32()
            .map(|f| CborValue::Float(f64::from(f)))
            .map_err(|e| malformed(dec, e)),
        Type::F64 => dec
            .f64()
            .map(CborValue::Float)
            .map_err(|e| malformed(dec, e)),
        Type::Simple => dec
            .simple()
            .map(CborValue::Simple)
            .map_err(|e| malformed(dec, e)),
        Type::Bytes | Type::BytesIndef => {
            let mut out = Vec::new();
            let position = dec.position();
            let chunks = dec.bytes_iter().map_err(|e| CborError::Malformed {
                position,
                message: e.to_string(),
            })?;
            for chunk in chunks {
                let chunk = chunk.map_err(|e| CborError::Malformed {
                    position,
                    message: e.to_string(),
                })?;
                out.extend_from_slice(chunk);
            }
            Ok(CborValue::Bytes(out))
        }
        Type::String | Type::StringIndef => {
            let mut out = String::new();
            let position = dec.position();
            let chunks = dec.str_iter().map_err(|e| CborError::Malformed {
                position,
                message: e.to_string(),
            })?;
            for chunk in chunks {
                let chunk = chunk.map_err(|e| CborError::Malformed {
                    position,
                    message: e.to_string(),
                })?;
                out.push_str(chunk);
            }
            Ok(CborValue::Text(out))
        }
        Type::Array | Type::ArrayIndef => {
            let mut items = Vec::new();
            match dec.array().map_err(|e| malformed(dec, e))? {
                Some(len) => {
                    for _ in 0..len {
                        items.push(decode_value(dec, depth + 1)?);
                    }
                }
                None => {
                    while !at_break(dec)? {
                        items.push(decode_value(dec, depth + 1)?);
                    }
                    skip_break(dec);
                }
            }
            Ok(CborValue::Array(items))
        }
        Type::Map | Type::MapIndef => {
            let mut entries = Vec::new();
            match dec.map().map_err(|e| malformed(dec, e))? {
                Some(len) => {
                    for _ in 0..len {
                        let key = decode_value(dec, depth + 1)?;
                        let value = decode_value(dec, depth + 1)?;
                        entries.push((key, value));
                    }
                }
                None => {
                    while !at_break(dec)? {
                        let key = decode_value(dec, depth + 1)?;
                        let value = decode_value(dec, depth + 1)?;
                        entries.push((key, value));
                    }
                    skip_break(dec);
                }
            }
            Ok(CborValue::Map(entries))
        }
        Type::Tag => {
            let tag = dec.tag().map_err(|e| malformed(dec, e))?;
            let inner = decode_value(dec, depth + 1)?;
            Ok(CborValue::Tag(tag.as_u64(), Box::new(inner)))
        }
        other => Err(malformed(dec, format!("unexpected CBOR item {other:?}"))),
    }
}
