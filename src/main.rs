// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use hcert_shlink_validator::{
    api::router,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    state::AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    let addr = config.bind_address();
    let state = AppState::new(config).expect("Failed to build SHLink HTTP client");
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(%addr, "HCERT & SHLink Validator listening (docs at /docs)");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}
