// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HCERT & SHLink Validator
//!
//! Decodes EU Digital COVID Certificate `HC1:` payloads down to their CWT
//! claims and resolves the SMART Health Links they point to.
//!
//! ## Modules
//!
//! - `hcert` - HC1 decoding pipeline and SHLink reference resolution
//! - `providers` - SHLink manifest authorization and FHIR retrieval
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod config;
pub mod error;
pub mod hcert;
pub mod models;
pub mod providers;
pub mod state;
