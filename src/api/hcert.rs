// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::ApiError,
    hcert::{self, json_safe::project, DecodeError},
    models::{CoseView, DecodeDiagnostics, DecodeHcertRequest, DecodeHcertResponse},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/decode/hcert",
    request_body = DecodeHcertRequest,
    tag = "Decode",
    responses(
        (status = 200, body = DecodeHcertResponse),
        (status = 400, description = "Missing input or a pipeline stage failed")
    )
)]
pub async fn decode_hcert(
    State(state): State<AppState>,
    body: Result<Json<DecodeHcertRequest>, JsonRejection>,
) -> Result<Json<DecodeHcertResponse>, ApiError> {
    let qr_data = body
        .ok()
        .and_then(|Json(request)| request.qr_data)
        .ok_or(DecodeError::MissingInput)?;

    let decoded = hcert::decode_hc1(&qr_data, &state.config.decode_options())?;

    Ok(Json(DecodeHcertResponse {
        diagnostics: DecodeDiagnostics {
            base45_decoded_len: decoded.base45_decoded_len,
            zlib_decompressed_len: decoded.zlib_decompressed_len,
            removed_hidden_chars: decoded.removed,
        },
        cose: CoseView {
            protected: project(&decoded.cose.protected),
            unprotected: project(&decoded.cose.unprotected),
            kid_b64: decoded.kid,
            signature: decoded.cose.signature,
        },
        payload: project(&decoded.cose.payload),
        hcert: decoded.hcert.as_ref().map(project).unwrap_or(Value::Null),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::hcert::tests::SAMPLE_HC1;
    use axum::http::StatusCode;
    use serde_json::json;

    fn state() -> AppState {
        AppState::new(AppConfig::default()).unwrap()
    }

    fn request(qr_data: Option<&str>) -> Result<Json<DecodeHcertRequest>, JsonRejection> {
        Ok(Json(DecodeHcertRequest {
            qr_data: qr_data.map(str::to_string),
        }))
    }

    #[tokio::test]
    async fn decodes_sample_into_json_safe_parts() {
        let Json(body) = decode_hcert(State(state()), request(Some(SAMPLE_HC1)))
            .await
            .expect("sample decodes");

        assert_eq!(body.diagnostics.base45_decoded_len, 409);
        assert_eq!(body.diagnostics.zlib_decompressed_len, 406);
        assert_eq!(body.cose.kid_b64.as_deref(), Some("I1BAX8FATLs="));
        assert_eq!(body.cose.protected, json!({ "1": -7, "4": "I1BAX8FATLs=" }));
        assert_eq!(body.cose.unprotected, json!({}));
        assert_eq!(body.payload["1"], "XJ");
        assert!(body.payload["-260"]["5"][0]["u"]
            .as_str()
            .unwrap()
            .starts_with("shlink://"));
        assert_eq!(body.hcert, Value::Null);

        let serialized = serde_json::to_value(&body).unwrap();
        assert!(serialized["diagnostics"].get("removed_hidden_chars").is_none());
    }

    #[tokio::test]
    async fn missing_qr_data_is_rejected() {
        let err = decode_hcert(State(state()), request(None)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "missing_qr_data");
    }

    #[tokio::test]
    async fn stage_failures_surface_their_code() {
        let err = decode_hcert(State(state()), request(Some("NOPE:123")))
            .await
            .unwrap_err();
        assert_eq!(err.code, "invalid_format");
        assert_eq!(err.extra["received_prefix"], "NOPE:123");
    }
}
