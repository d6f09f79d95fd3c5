// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CWT claim and COSE header extraction.
//!
//! All lookups go through [`get_claim`] so integer labels always win over
//! their text spellings.

use super::cbor::{get_claim, CborValue};
use super::json_safe::{b64url_encode, B64_ENVELOPE_KEY};

/// COSE header label of the key identifier.
pub const HEADER_KID: i64 = 4;
/// CWT `iss` claim label.
pub const CLAIM_ISS: i64 = 1;
/// CWT `exp` claim label.
pub const CLAIM_EXP: i64 = 4;
/// CWT `iat` claim label.
pub const CLAIM_IAT: i64 = 6;
/// CWT health-certificate container label.
pub const CLAIM_HCERT: i64 = -260;
/// Entry of the container holding the EU DCC claim.
pub const HCERT_EU_DCC: i64 = 1;
/// Entry holding a SMART Health Link reference.
pub const HCERT_SHLINK: i64 = 5;

fn claim(map: &CborValue, label: i64) -> Option<&CborValue> {
    get_claim(map, label, &label.to_string())
}

/// Key identifier from the protected bucket, falling back to unprotected.
///
/// Byte strings are exposed as unpadded base64url, `{_b64}` envelopes pass
/// their encoded value through, text is returned verbatim.
pub fn extract_kid(protected: &CborValue, unprotected: &CborValue) -> Option<String> {
    let kid = claim(protected, HEADER_KID).or_else(|| claim(unprotected, HEADER_KID))?;
    match kid {
        CborValue::Bytes(bytes) => Some(b64url_encode(bytes)),
        CborValue::Text(text) => Some(text.clone()),
        CborValue::Map(_) => kid
            .get_text(B64_ENVELOPE_KEY)
            .and_then(CborValue::as_text)
            .map(str::to_string),
        _ => None,
    }
}

/// Issuer from `iss`, then label `1`, then `"1"`. Only text qualifies.
pub fn extract_issuer(payload: &CborValue) -> Option<String> {
    payload
        .get_text("iss")
        .or_else(|| claim(payload, CLAIM_ISS))
        .and_then(CborValue::as_text)
        .map(str::to_string)
}

/// `iat` (claim 6) as epoch seconds.
pub fn extract_issued_at(payload: &CborValue) -> Option<i64> {
    claim(payload, CLAIM_IAT).and_then(integer_claim)
}

/// `exp` (claim 4) as epoch seconds.
pub fn extract_expires_at(payload: &CborValue) -> Option<i64> {
    claim(payload, CLAIM_EXP).and_then(integer_claim)
}

fn integer_claim(value: &CborValue) -> Option<i64> {
    match value {
        CborValue::Tag(_, inner) => integer_claim(inner),
        other => other.as_i64(),
    }
}

/// The `-260` health-certificate container, when it is a map.
pub fn hcert_container(payload: &CborValue) -> Option<&CborValue> {
    claim(payload, CLAIM_HCERT).filter(|c| c.as_map().is_some())
}

/// The disease-specific certificate claim at `-260 / 1`.
///
/// Absence is not an error: pointer-only certificates carry no claim.
pub fn extract_hcert(payload: &CborValue) -> Option<&CborValue> {
    hcert_container(payload).and_then(|container| claim(container, HCERT_EU_DCC))
}
