// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SMART Health Link manifest authorization and FHIR retrieval.

use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;
use utoipa::ToSchema;

/// Content negotiation for FHIR resource fetches.
const FHIR_ACCEPT: &str = "application/fhir+json, application/json";
/// Characters kept from a non-JSON resource body.
const TEXT_PREVIEW_CHARS: usize = 500;
/// Manifest keys that may carry a resource inline, in lookup order.
const EMBEDDED_KEYS: [&str; 4] = ["fhirBundle", "healthCertificate", "certificate", "data"];
/// Pseudo-URL reported for an inline resource.
pub const EMBEDDED_URL: &str = "embedded";

#[derive(Debug, thiserror::Error)]
pub enum ShlinkError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid SHLink URL: {0}")]
    InvalidUrl(String),

    #[error("Could not authorize with provided PIN")]
    Rejected { statuses: Vec<u16> },

    #[error("Could not reach SHLink server: {0}")]
    Unreachable(String),
}

/// How the passcode is presented to the manifest server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasscodeMethod {
    JsonBody,
    FormBody,
    QueryParam,
}

impl PasscodeMethod {
    /// Tried in this order; the first 200 answer wins.
    const ORDER: [PasscodeMethod; 3] = [
        PasscodeMethod::JsonBody,
        PasscodeMethod::FormBody,
        PasscodeMethod::QueryParam,
    ];

    fn as_str(self) -> &'static str {
        match self {
            PasscodeMethod::JsonBody => "json_post",
            PasscodeMethod::FormBody => "form_post",
            PasscodeMethod::QueryParam => "query_get",
        }
    }
}

/// A successful authorization answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizeOutcome {
    /// The server answered with JSON.
    Manifest(Value),
    /// The server answered 200 with something that is not JSON.
    Raw { raw: String, content_type: String },
}

/// One resource found through a manifest.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct FhirItem {
    /// Source URL, or `embedded` for an inline resource.
    pub url: String,
    /// JSON that looks like FHIR (`resourceType` or `entry`).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub resource: Option<Value>,
    /// Any other JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    /// Start of a non-JSON body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
}

impl FhirItem {
    fn from_json(url: String, body: Value) -> Self {
        let (resource, data) = if looks_like_fhir(&body) {
            (Some(body), None)
        } else {
            (None, Some(body))
        };
        Self {
            url,
            resource,
            data,
            text_preview: None,
        }
    }

    fn from_text(url: String, body: &str) -> Self {
        Self {
            url,
            resource: None,
            data: None,
            text_preview: Some(body.chars().take(TEXT_PREVIEW_CHARS).collect()),
        }
    }
}

/// Outcome of walking a manifest.
#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq)]
pub struct FetchFhirReport {
    pub found: bool,
    pub fhir: Vec<FhirItem>,
    /// Per-URL failures; they never abort the walk.
    pub errors: Vec<String>,
}

fn looks_like_fhir(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("resourceType") || obj.contains_key("entry"))
}

/// Candidate resource URLs from `entries[].url`, `files[].location|url`
/// and `links[].href`, in that order.
pub fn collect_resource_urls(manifest: &Map<String, Value>) -> Vec<String> {
    fn objects<'a>(
        manifest: &'a Map<String, Value>,
        key: &str,
    ) -> impl Iterator<Item = &'a Map<String, Value>> {
        manifest
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }
    fn text<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
        obj.get(key).and_then(Value::as_str)
    }

    let entries = objects(manifest, "entries").filter_map(|e| text(e, "url"));
    let files =
        objects(manifest, "files").filter_map(|f| text(f, "location").or_else(|| text(f, "url")));
    let links = objects(manifest, "links").filter_map(|l| text(l, "href"));

    entries.chain(files).chain(links).map(str::to_string).collect()
}

/// The inline resource under the first present embedding key, when it
/// looks like FHIR.
pub fn embedded_resource(manifest: &Map<String, Value>) -> Option<&Value> {
    EMBEDDED_KEYS
        .iter()
        .find_map(|key| manifest.get(*key))
        .filter(|value| looks_like_fhir(value))
}

/// HTTP client for SHLink manifest servers.
#[derive(Debug, Clone)]
pub struct ShlinkClient {
    http: Client,
}

impl ShlinkClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ShlinkError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ShlinkError::Client)?;
        Ok(Self { http })
    }

    /// Present `pin` to the manifest server, trying JSON, form, then query.
    pub async fn authorize(&self, url: &str, pin: &str) -> Result<AuthorizeOutcome, ShlinkError> {
        let target = Url::parse(url).map_err(|e| ShlinkError::InvalidUrl(e.to_string()))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ShlinkError::InvalidUrl(format!(
                "unsupported scheme {}",
                target.scheme()
            )));
        }

        let mut statuses = Vec::new();
        let mut last_transport_error = None;

        for method in PasscodeMethod::ORDER {
            let request = match method {
                PasscodeMethod::JsonBody => self
                    .http
                    .post(target.clone())
                    .json(&json!({ "passcode": pin })),
                PasscodeMethod::FormBody => self.http.post(target.clone()).form(&[("passcode", pin)]),
                PasscodeMethod::QueryParam => {
                    let mut with_query = target.clone();
                    with_query.query_pairs_mut().append_pair("passcode", pin);
                    self.http.get(with_query)
                }
            };

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(method = method.as_str(), error = %e, "SHLink authorization attempt failed");
                    last_transport_error = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status != StatusCode::OK {
                debug!(method = method.as_str(), %status, "SHLink authorization rejected");
                statuses.push(status.as_u16());
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("text/plain")
                .to_string();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(method = method.as_str(), error = %e, "failed to read SHLink response body");
                    last_transport_error = Some(e.to_string());
                    continue;
                }
            };

            info!(method = method.as_str(), "SHLink authorized");
            return Ok(match serde_json::from_str::<Value>(&body) {
                Ok(manifest) => AuthorizeOutcome::Manifest(manifest),
                Err(_) => AuthorizeOutcome::Raw {
                    raw: body,
                    content_type,
                },
            });
        }

        if statuses.is_empty() {
            let reason = last_transport_error.unwrap_or_else(|| "no response".to_string());
            warn!(error = %reason, "SHLink server unreachable");
            Err(ShlinkError::Unreachable(reason))
        } else {
            warn!(statuses = ?statuses, "SHLink authorization failed with every method");
            Err(ShlinkError::Rejected { statuses })
        }
    }

    /// Collect the manifest's embedded resource and fetch every listed URL.
    pub async fn fetch_fhir(&self, manifest: &Map<String, Value>) -> FetchFhirReport {
        let mut report = FetchFhirReport::default();

        if let Some(resource) = embedded_resource(manifest) {
            report
                .fhir
                .push(FhirItem::from_json(EMBEDDED_URL.to_string(), resource.clone()));
        }

        for url in collect_resource_urls(manifest) {
            match self.fetch_one(&url).await {
                Ok(item) => report.fhir.push(item),
                Err(message) => {
                    warn!(%url, error = %message, "FHIR fetch failed");
                    report.errors.push(message);
                }
            }
        }

        report.found = !report.fhir.is_empty();
        info!(
            resources = report.fhir.len(),
            errors = report.errors.len(),
            "manifest walk complete"
        );
        report
    }

    async fn fetch_one(&self, url: &str) -> Result<FhirItem, String> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, FHIR_ACCEPT)
            .send()
            .await
            .map_err(|e| format!("Error fetching {url}: {e}"))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("Failed to fetch {url}: HTTP {}", status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("Error fetching {url}: {e}"))?;

        Ok(match serde_json::from_str::<Value>(&body) {
            Ok(json) => FhirItem::from_json(url.to_string(), json),
            Err(_) => FhirItem::from_text(url.to_string(), &body),
        })
    }
}
