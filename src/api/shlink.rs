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
    models::{AuthorizeRequest, AuthorizeResponse, FetchFhirRequest},
    providers::shlink::{AuthorizeOutcome, FetchFhirReport},
    state::AppState,
};

/// Passcodes arrive as text or as bare JSON numbers.
fn passcode(pin: Option<Value>) -> Option<String> {
    match pin? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[utoipa::path(
    post,
    path = "/shlink/authorize",
    request_body = AuthorizeRequest,
    tag = "SHLink",
    responses(
        (status = 200, body = AuthorizeResponse),
        (status = 400, description = "Missing fields, bad URL, or no method was accepted")
    )
)]
pub async fn authorize(
    State(state): State<AppState>,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let missing = || ApiError::bad_request("missing_fields", "url and pin fields required");

    let Json(request) = body.map_err(|_| missing())?;
    let url = request.url.filter(|u| !u.is_empty()).ok_or_else(missing)?;
    let pin = passcode(request.pin).ok_or_else(missing)?;

    let response = match state.shlink.authorize(&url, &pin).await? {
        AuthorizeOutcome::Manifest(manifest) => AuthorizeResponse::Manifest { manifest },
        AuthorizeOutcome::Raw { raw, content_type } => AuthorizeResponse::Raw { raw, content_type },
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/shlink/fetch-fhir",
    request_body = FetchFhirRequest,
    tag = "SHLink",
    responses(
        (status = 200, body = FetchFhirReport),
        (status = 400, description = "Missing or non-object manifest")
    )
)]
pub async fn fetch_fhir(
    State(state): State<AppState>,
    body: Result<Json<FetchFhirRequest>, JsonRejection>,
) -> Result<Json<FetchFhirReport>, ApiError> {
    let manifest = body
        .ok()
        .and_then(|Json(request)| request.manifest)
        .and_then(|manifest| match manifest {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .ok_or_else(|| ApiError::bad_request("missing_manifest", "manifest field required"))?;

    Ok(Json(state.shlink.fetch_fhir(&manifest).await))
}
