// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    hcert::{RemovedChar, ShlinkReference},
    models::{
        AuthorizeRequest, AuthorizeResponse, CoseView, DecodeDiagnostics, DecodeHcertRequest,
        DecodeHcertResponse, ExtractMetadataRequest, ExtractMetadataResponse,
        ExtractReferenceRequest, FetchFhirRequest, StatusResponse,
    },
    providers::shlink::{FetchFhirReport, FhirItem},
    state::AppState,
};

pub mod extract;
pub mod hcert;
pub mod health;
pub mod shlink;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/status", get(health::status))
        .route("/health", get(health::health))
        .route("/decode/hcert", post(hcert::decode_hcert))
        .route("/extract/metadata", post(extract::extract_metadata))
        .route("/extract/reference", post(extract::extract_reference))
        .route("/shlink/authorize", post(shlink::authorize))
        .route("/shlink/fetch-fhir", post(shlink::fetch_fhir))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found() -> ApiError {
    ApiError::not_found("not_found", "Endpoint not found")
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HCERT & SHLink Validator",
        description = "Decode EU DCC HC1 strings (Base45, zlib, CBOR, COSE), extract metadata, \
                       discover SHLink references, authorize with a passcode and fetch FHIR resources."
    ),
    paths(
        health::status,
        health::health,
        hcert::decode_hcert,
        extract::extract_metadata,
        extract::extract_reference,
        shlink::authorize,
        shlink::fetch_fhir
    ),
    components(
        schemas(
            StatusResponse,
            DecodeHcertRequest,
            DecodeHcertResponse,
            DecodeDiagnostics,
            CoseView,
            RemovedChar,
            ExtractMetadataRequest,
            ExtractMetadataResponse,
            ExtractReferenceRequest,
            ShlinkReference,
            AuthorizeRequest,
            AuthorizeResponse,
            FetchFhirRequest,
            FetchFhirReport,
            FhirItem
        )
    ),
    tags(
        (name = "Health", description = "Service status"),
        (name = "Decode", description = "HC1 decoding"),
        (name = "Extract", description = "Metadata and SHLink reference extraction"),
        (name = "SHLink", description = "Manifest authorization and FHIR retrieval")
    )
)]
struct ApiDoc;
