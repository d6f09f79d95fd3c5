// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::AppConfig;
use crate::providers::shlink::{ShlinkClient, ShlinkError};

/// Shared, read-only state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub shlink: ShlinkClient,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ShlinkError> {
        let shlink = ShlinkClient::new(config.shlink_timeout)?;
        Ok(Self {
            config: Arc::new(config),
            shlink,
        })
    }
}
