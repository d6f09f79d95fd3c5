// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Decoded CBOR crosses this
//! boundary in its JSON-safe form (byte strings as `{"_b64": "..."}`), so
//! those fields are plain [`serde_json::Value`]s documented as objects.
//!
//! ## Model Categories
//!
//! - **Decode**: HC1 decoding diagnostics and COSE parts
//! - **Extract**: metadata and SHLink reference lookups over decoded parts
//! - **SHLink**: manifest authorization and FHIR retrieval

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::hcert::RemovedChar;

// =============================================================================
// Service status
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub ready: bool,
    /// `<os>-<arch>` of the running binary.
    pub platform: String,
    /// Codec and transport libraries in use, by name.
    pub libraries: BTreeMap<String, String>,
}

// =============================================================================
// Decode
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DecodeHcertRequest {
    /// Raw scanned text, expected to start with `HC1:`.
    #[schema(example = "HC1:6BFOXN...")]
    pub qr_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DecodeDiagnostics {
    pub base45_decoded_len: usize,
    pub zlib_decompressed_len: usize,
    /// Hidden characters stripped before decoding.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_hidden_chars: Vec<RemovedChar>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CoseView {
    #[schema(value_type = Object)]
    pub protected: Value,
    #[schema(value_type = Object)]
    pub unprotected: Value,
    /// Key identifier; base64url when it was carried as bytes.
    pub kid_b64: Option<String>,
    /// Unpadded base64url signature. Never verified.
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DecodeHcertResponse {
    pub diagnostics: DecodeDiagnostics,
    pub cose: CoseView,
    /// CWT claims.
    #[schema(value_type = Object)]
    pub payload: Value,
    /// The `-260 / 1` certificate claim, or `null`.
    #[schema(value_type = Option<Object>)]
    pub hcert: Value,
}

// =============================================================================
// Extract
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExtractMetadataRequest {
    /// `{protected, unprotected}`; `protected` may be a `{_b64}` envelope
    /// of the CBOR-encoded header bucket.
    #[schema(value_type = Option<Object>)]
    pub cose: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct ExtractMetadataResponse {
    pub kid: Option<String>,
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExtractReferenceRequest {
    /// Certificate claim; its entry `5` takes precedence.
    #[schema(value_type = Option<Object>)]
    pub hcert: Option<Value>,
    /// CWT claims; `-260 / 5` is the fallback.
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

// =============================================================================
// SHLink
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    pub url: Option<String>,
    /// Passcode; numbers are accepted and sent as text.
    #[schema(value_type = Option<String>)]
    pub pin: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum AuthorizeResponse {
    Manifest {
        #[schema(value_type = Object)]
        manifest: Value,
    },
    Raw {
        raw: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FetchFhirRequest {
    #[schema(value_type = Option<Object>)]
    pub manifest: Option<Value>,
}
