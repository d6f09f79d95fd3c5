// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::hcert::DecodeError;
use crate::providers::shlink::ShlinkError;

/// Hint returned alongside `html_received_instead_of_hc1`.
const HTML_HINT: &str = "Ensure the frontend is posting to this API, not a static web server.";

/// Every HTTP error leaves the service as `{error, details, ...extra}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub details: String,
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, details: impl Into<String>) -> Self {
        Self {
            status,
            code,
            details: details.into(),
            extra: Map::new(),
        }
    }

    pub fn bad_request(code: &'static str, details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, details)
    }

    pub fn not_found(code: &'static str, details: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, details)
    }

    /// Attach an extra top-level field to the error body.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        let base = ApiError::bad_request(err.code(), err.to_string());
        match err {
            DecodeError::HtmlDocument => base.with("hint", HTML_HINT),
            DecodeError::InvalidPrefix { received_prefix } => {
                base.with("received_prefix", received_prefix)
            }
            DecodeError::Base45 { invalid_chars, .. } if !invalid_chars.is_empty() => base.with(
                "invalid_chars",
                serde_json::to_value(invalid_chars).unwrap_or(Value::Null),
            ),
            DecodeError::Cbor { preview_hex, .. } | DecodeError::Cose { preview_hex, .. } => {
                base.with("preview_hex", preview_hex)
            }
            _ => base,
        }
    }
}

impl From<ShlinkError> for ApiError {
    fn from(err: ShlinkError) -> Self {
        let details = err.to_string();
        match err {
            ShlinkError::InvalidUrl(_) => ApiError::bad_request("invalid_url", details),
            ShlinkError::Rejected { statuses } => {
                ApiError::bad_request("authorization_failed", details).with("statuses", statuses)
            }
            ShlinkError::Unreachable(reason) => {
                ApiError::bad_request("authorization_failed", details).with("reason", reason)
            }
            ShlinkError::Client(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", details)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.code,
            details: self.details,
            extra: self.extra,
        });
        (self.status, body).into_response()
    }
}
