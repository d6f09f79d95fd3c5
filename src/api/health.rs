// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{extract::State, Json};

use crate::config::SERVICE_NAME;
use crate::models::StatusResponse;
use crate::state::AppState;

/// Libraries behind the decode pipeline and the SHLink client.
const LIBRARIES: [(&str, &str); 6] = [
    ("axum", "0.8"),
    ("base64", "0.22"),
    ("flate2", "1.1"),
    ("minicbor", "0.25"),
    ("reqwest", "0.12"),
    ("unicode-normalization", "0.1"),
];

fn status_response(state: &AppState) -> StatusResponse {
    StatusResponse {
        service: SERVICE_NAME.to_string(),
        version: state.config.service_version.clone(),
        ready: true,
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        libraries: LIBRARIES
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Service status.
#[utoipa::path(
    get,
    path = "/status",
    tag = "Health",
    responses((status = 200, description = "Service is ready", body = StatusResponse))
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status_response(&state))
}

/// Alias of `/status` for probes.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is ready", body = StatusResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status_response(&state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn reports_configured_version() {
        let config = AppConfig {
            service_version: "9.9.9".to_string(),
            ..AppConfig::default()
        };
        let state = AppState::new(config).unwrap();

        let Json(body) = status(State(state.clone())).await;
        assert_eq!(body.service, SERVICE_NAME);
        assert_eq!(body.version, "9.9.9");
        assert!(body.ready);
        assert!(body.libraries.contains_key("minicbor"));

        let Json(alias) = health(State(state)).await;
        assert_eq!(alias.platform, body.platform);
    }
}
