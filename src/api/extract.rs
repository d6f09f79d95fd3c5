// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::rejection::JsonRejection, Json};
use serde_json::Value;

use crate::{
    error::ApiError,
    hcert::{
        claims,
        json_safe::{b64url_decode, unproject, B64_ENVELOPE_KEY},
        resolve_from_claims, CborValue, ShlinkReference,
    },
    models::{ExtractMetadataRequest, ExtractMetadataResponse, ExtractReferenceRequest},
};

/// Decode the protected bucket when it arrives as a `{_b64}` envelope of
/// its CBOR encoding; otherwise take it as an already-decoded map.
fn protected_headers(protected: Option<&Value>) -> Result<CborValue, ApiError> {
    let Some(protected) = protected else {
        return Ok(CborValue::empty_map());
    };

    let Some(encoded) = protected.get(B64_ENVELOPE_KEY) else {
        return Ok(unproject(protected));
    };
    let cbor_failure =
        |details: String| ApiError::bad_request("cbor_decode_failed", details);

    let encoded = encoded
        .as_str()
        .ok_or_else(|| cbor_failure("protected _b64 must be a string".to_string()))?;
    let bytes = b64url_decode(encoded)
        .map_err(|e| cbor_failure(format!("protected header is not valid base64url: {e}")))?;
    if bytes.is_empty() {
        return Ok(CborValue::empty_map());
    }
    CborValue::from_slice(&bytes).map_err(|e| cbor_failure(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/extract/metadata",
    request_body = ExtractMetadataRequest,
    tag = "Extract",
    responses(
        (status = 200, body = ExtractMetadataResponse),
        (status = 400, description = "Missing body or undecodable protected header")
    )
)]
pub async fn extract_metadata(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExtractMetadataResponse>, ApiError> {
    let missing = || ApiError::bad_request("missing_data", "JSON body required");

    let Ok(Json(body)) = body else {
        return Err(missing());
    };
    if !matches!(body.as_object(), Some(obj) if !obj.is_empty()) {
        return Err(missing());
    }
    let request: ExtractMetadataRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request("missing_data", e.to_string()))?;

    let cose = request.cose.unwrap_or(Value::Null);
    let protected = protected_headers(cose.get("protected"))?;
    let unprotected = cose
        .get("unprotected")
        .map(unproject)
        .unwrap_or_else(CborValue::empty_map);
    let payload = request
        .payload
        .as_ref()
        .map(unproject)
        .unwrap_or_else(CborValue::empty_map);

    Ok(Json(ExtractMetadataResponse {
        kid: claims::extract_kid(&protected, &unprotected),
        issuer: claims::extract_issuer(&payload),
        issued_at: claims::extract_issued_at(&payload),
        expires_at: claims::extract_expires_at(&payload),
    }))
}

#[utoipa::path(
    post,
    path = "/extract/reference",
    request_body = ExtractReferenceRequest,
    tag = "Extract",
    responses(
        (status = 200, body = ShlinkReference),
        (status = 404, description = "Neither hcert[5] nor payload[-260][5] holds a reference")
    )
)]
pub async fn extract_reference(
    body: Result<Json<ExtractReferenceRequest>, JsonRejection>,
) -> Result<Json<ShlinkReference>, ApiError> {
    // An absent or unreadable body simply has no reference.
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let hcert = request.hcert.as_ref().map(unproject);
    let payload = request.payload.as_ref().map(unproject);

    resolve_from_claims(hcert.as_ref(), payload.as_ref())
        .map(Json)
        .ok_or_else(|| {
            tracing::info!("no SHLink reference in hcert or payload");
            ApiError::not_found(
                "no_reference_found",
                "No SHLink reference in hcert[5] or payload[-260][5]",
            )
            .with("hasReference", false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    const SHLINK: &str =
        "shlink://eyJ1cmwiOiJodHRwOi8vZXgub3JnIiwia2V5IjoiYWJjIiwiZmxhZyI6IlAiLCJleHAiOjF9";

    async fn metadata(body: Value) -> Result<ExtractMetadataResponse, ApiError> {
        extract_metadata(Ok(Json(body))).await.map(|Json(r)| r)
    }

    async fn reference(body: Value) -> Result<ShlinkReference, ApiError> {
        let request = serde_json::from_value(body).unwrap();
        extract_reference(Ok(Json(request))).await.map(|Json(r)| r)
    }

    #[tokio::test]
    async fn metadata_from_decoded_parts() {
        let out = metadata(json!({
            "cose": {
                "protected": { "1": -7, "4": "I1BAX8FATLs=" },
                "unprotected": {}
            },
            "payload": { "1": "XJ", "4": 1745589915, "6": 1755625612038u64 }
        }))
        .await
        .unwrap();

        assert_eq!(
            out,
            ExtractMetadataResponse {
                kid: Some("I1BAX8FATLs=".into()),
                issuer: Some("XJ".into()),
                issued_at: Some(1_755_625_612_038),
                expires_at: Some(1_745_589_915),
            }
        );
    }

    #[tokio::test]
    async fn metadata_decodes_enveloped_protected_bucket() {
        // CBOR {4: h'235040'}
        let protected = crate::hcert::json_safe::b64url_encode(&[0xa1, 0x04, 0x43, 0x23, 0x50, 0x40]);
        let out = metadata(json!({
            "cose": { "protected": { "_b64": protected } },
            "payload": { "iss": "issuer-name" }
        }))
        .await
        .unwrap();
        assert_eq!(out.kid.as_deref(), Some("I1BA"));
        assert_eq!(out.issuer.as_deref(), Some("issuer-name"));
    }

    #[tokio::test]
    async fn metadata_kid_from_unprotected_envelope() {
        let out = metadata(json!({
            "cose": { "protected": {}, "unprotected": { "4": { "_b64": "I1BA" } } }
        }))
        .await
        .unwrap();
        assert_eq!(out.kid.as_deref(), Some("I1BA"));
        assert_eq!(out.issuer, None);
    }

    #[tokio::test]
    async fn metadata_rejects_bad_envelope_and_empty_body() {
        let err = metadata(json!({ "cose": { "protected": { "_b64": "%%%" } } }))
            .await
            .unwrap_err();
        assert_eq!(err.code, "cbor_decode_failed");

        // 0x84 opens an array that never arrives
        let err = metadata(json!({ "cose": { "protected": { "_b64": "hA" } } }))
            .await
            .unwrap_err();
        assert_eq!(err.code, "cbor_decode_failed");

        let err = metadata(json!({})).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "missing_data");
    }

    #[tokio::test]
    async fn reference_prefers_hcert_claim() {
        let out = reference(json!({
            "hcert": { "5": "http://from-hcert" },
            "payload": { "-260": { "5": SHLINK } }
        }))
        .await
        .unwrap();
        assert_eq!(out.url.as_deref(), Some("http://from-hcert"));
    }

    #[tokio::test]
    async fn reference_falls_back_to_payload_pointer_array() {
        let out = reference(json!({
            "hcert": null,
            "payload": { "-260": { "5": [{ "u": SHLINK }] } }
        }))
        .await
        .unwrap();
        assert!(out.has_reference);
        assert_eq!(out.url.as_deref(), Some("http://ex.org"));
        assert_eq!(out.key.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn reference_accepts_enveloped_bytes() {
        let encoded = crate::hcert::json_safe::b64url_encode(b"https://ex.org/bytes");
        let out = reference(json!({ "hcert": { "5": { "_b64": encoded } } }))
            .await
            .unwrap();
        assert_eq!(out.url.as_deref(), Some("https://ex.org/bytes"));
    }

    #[tokio::test]
    async fn missing_reference_is_not_found() {
        let err = reference(json!({ "hcert": {}, "payload": { "1": "XJ" } }))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "no_reference_found");
        assert_eq!(err.extra["hasReference"], false);
    }
}
