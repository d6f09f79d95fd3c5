// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! COSE_Sign1 destructuring.
//!
//! ```text
//! COSE_Sign1 = [ protected : bstr .cbor header_map,
//!                unprotected : header_map,
//!                payload : bstr .cbor CWT claims,
//!                signature : bstr ]
//! ```
//!
//! The signature is exposed, never verified.

use super::cbor::{CborError, CborValue};
use super::json_safe::b64url_encode;

/// CBOR tag number of COSE_Sign1.
pub const COSE_SIGN1_TAG: u64 = 18;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoseError {
    #[error(transparent)]
    Cbor(#[from] CborError),

    #[error("invalid COSE_Sign1 structure: expected 4-element array, got {0}")]
    InvalidStructure(String),

    #[error("invalid COSE_Sign1 {field}: {reason}")]
    InvalidElement { field: &'static str, reason: String },
}

/// A decoded COSE_Sign1 message.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1 {
    /// Tags that wrapped the array, outermost first.
    pub tags: Vec<u64>,
    /// Protected header map, decoded from its byte-string wrapper.
    pub protected: CborValue,
    /// Unprotected header map, as carried inline.
    pub unprotected: CborValue,
    /// CWT claims map, decoded from its byte-string wrapper.
    pub payload: CborValue,
    /// Unpadded base64url of the signature; `None` when empty.
    pub signature: Option<String>,
}

/// Decode CBOR bytes as a (possibly tagged) COSE_Sign1 message.
pub fn decode_cose_sign1(bytes: &[u8]) -> Result<CoseSign1, CoseError> {
    let value = CborValue::from_slice(bytes)?;
    let (inner, tags) = value.untagged();

    if let Some(tag) = tags.iter().find(|t| **t != COSE_SIGN1_TAG) {
        tracing::debug!(tag, "COSE_Sign1 wrapped in a non-Sign1 tag");
    }

    let elements = match inner {
        CborValue::Array(items) if items.len() == 4 => items,
        CborValue::Array(items) => {
            return Err(CoseError::InvalidStructure(format!(
                "array with {} elements",
                items.len()
            )))
        }
        other => {
            return Err(CoseError::InvalidStructure(format!(
                "{} (not an array)",
                other.kind()
            )))
        }
    };

    let protected = decode_wrapped("protected header", &elements[0])?;
    let unprotected = match &elements[1] {
        CborValue::Null | CborValue::Undefined => CborValue::empty_map(),
        other => other.clone(),
    };
    let payload = decode_wrapped("payload", &elements[2])?;
    let signature = match &elements[3] {
        CborValue::Bytes(sig) if !sig.is_empty() => Some(b64url_encode(sig)),
        _ => None,
    };

    Ok(CoseSign1 {
        tags,
        protected,
        unprotected,
        payload,
        signature,
    })
}

/// Decode a `bstr .cbor` element. Empty or absent bytes decode to an empty map.
fn decode_wrapped(field: &'static str, element: &CborValue) -> Result<CborValue, CoseError> {
    match element {
        CborValue::Bytes(bytes) if bytes.is_empty() => Ok(CborValue::empty_map()),
        CborValue::Bytes(bytes) => {
            CborValue::from_slice(bytes).map_err(|e| CoseError::InvalidElement {
                field,
                reason: e.to_string(),
            })
        }
        CborValue::Null | CborValue::Undefined => Ok(CborValue::empty_map()),
        other => Err(CoseError::InvalidElement {
            field,
            reason: format!("expected byte string, got {}", other.kind()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hcert::cbor::tests::encode;
    use minicbor::data::Tag;

    fn protected_bytes() -> Vec<u8> {
        encode(|e| {
            e.map(2).unwrap();
            e.u8(1).unwrap().i8(-7).unwrap();
            e.u8(4).unwrap().bytes(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        })
    }

    fn payload_bytes() -> Vec<u8> {
        encode(|e| {
            e.map(1).unwrap();
            e.u8(1).unwrap().str("XJ").unwrap();
        })
    }

    fn sign1(tags: &[u64], protected: &[u8], payload: &[u8], signature: &[u8]) -> Vec<u8> {
        encode(|e| {
            for tag in tags {
                e.tag(Tag::new(*tag)).unwrap();
            }
            e.array(4).unwrap();
            e.bytes(protected).unwrap();
            e.map(0).unwrap();
            e.bytes(payload).unwrap();
            e.bytes(signature).unwrap();
        })
    }

    #[test]
    fn decodes_tagged_message() {
        let bytes = sign1(&[18], &protected_bytes(), &payload_bytes(), &[1, 2, 3]);
        let cose = decode_cose_sign1(&bytes).unwrap();

        assert_eq!(cose.tags, vec![18]);
        assert_eq!(cose.protected.get_int(1), Some(&CborValue::Int(-7)));
        assert_eq!(cose.unprotected, CborValue::empty_map());
        assert_eq!(
            cose.payload.get_int(1).and_then(CborValue::as_text),
            Some("XJ")
        );
        assert_eq!(cose.signature.as_deref(), Some("AQID"));
    }

    #[test]
    fn unwraps_any_tag_depth() {
        let untagged = sign1(&[], &protected_bytes(), &payload_bytes(), &[9]);
        let deep = sign1(&[55799, 61, 18], &protected_bytes(), &payload_bytes(), &[9]);

        let plain = decode_cose_sign1(&untagged).unwrap();
        let nested = decode_cose_sign1(&deep).unwrap();
        assert_eq!(nested.tags, vec![55799, 61, 18]);
        assert_eq!(plain.payload, nested.payload);
        assert_eq!(plain.protected, nested.protected);
    }

    #[test]
    fn rejects_wrong_array_lengths() {
        for len in [0u64, 1, 3, 5] {
            let bytes = encode(|e| {
                e.tag(Tag::new(18)).unwrap();
                e.array(len).unwrap();
                for _ in 0..len {
                    e.bytes(&[]).unwrap();
                }
            });
            match decode_cose_sign1(&bytes) {
                Err(CoseError::InvalidStructure(detail)) => {
                    assert_eq!(detail, format!("array with {len} elements"));
                }
                other => panic!("length {len}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_non_array() {
        let bytes = encode(|e| {
            e.map(0).unwrap();
        });
        assert_eq!(
            decode_cose_sign1(&bytes),
            Err(CoseError::InvalidStructure("map (not an array)".into()))
        );
    }

    #[test]
    fn empty_protected_and_payload_decode_to_empty_maps() {
        let bytes = sign1(&[18], &[], &[], &[]);
        let cose = decode_cose_sign1(&bytes).unwrap();
        assert_eq!(cose.protected, CborValue::empty_map());
        assert_eq!(cose.payload, CborValue::empty_map());
        assert_eq!(cose.signature, None);
    }

    #[test]
    fn malformed_payload_is_reported_by_field() {
        let bytes = sign1(&[18], &protected_bytes(), &[0x84], &[1]);
        assert!(matches!(
            decode_cose_sign1(&bytes),
            Err(CoseError::InvalidElement {
                field: "payload",
                ..
            })
        ));
    }

    #[test]
    fn garbage_is_a_cbor_error() {
        assert!(matches!(
            decode_cose_sign1(&[0x1c]),
            Err(CoseError::Cbor(_))
        ));
    }
}
