// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Text canonicalization for scanned or pasted QR payloads.
//!
//! Scanners and clipboards routinely smuggle invisible format characters
//! into otherwise valid `HC1:` strings. Normalization runs before any prefix
//! check so a zero-width space can never hide the prefix.

use serde::Serialize;
use unicode_normalization::{is_nfkc, UnicodeNormalization};
use utoipa::ToSchema;

/// Hidden/format code points stripped from input, with their Unicode names.
const HIDDEN_CHARS: [(char, &str); 6] = [
    ('\u{00A0}', "NO-BREAK SPACE"),
    ('\u{200B}', "ZERO WIDTH SPACE"),
    ('\u{200C}', "ZERO WIDTH NON-JOINER"),
    ('\u{200D}', "ZERO WIDTH JOINER"),
    ('\u{FEFF}', "ZERO WIDTH NO-BREAK SPACE"),
    ('\u{2060}', "WORD JOINER"),
];

/// One hidden character removed during normalization.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct RemovedChar {
    /// Code point in `U+XXXX` form.
    #[serde(rename = "char")]
    pub character: String,
    /// Unicode character name.
    pub name: String,
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub removed: Vec<RemovedChar>,
}

fn hidden_name(c: char) -> Option<&'static str> {
    HIDDEN_CHARS
        .iter()
        .find(|(hidden, _)| *hidden == c)
        .map(|(_, name)| *name)
}

/// Canonicalize raw text: NFKC, drop hidden format characters, drop CR/LF/TAB.
///
/// Never fails. The removal list has one entry per distinct hidden code
/// point, in order of first encounter.
pub fn normalize(input: &str) -> NormalizedText {
    let composed: String = if is_nfkc(input) {
        input.to_string()
    } else {
        input.nfkc().collect()
    };

    let mut removed: Vec<RemovedChar> = Vec::new();
    let mut text = String::with_capacity(composed.len());

    for c in composed.chars() {
        if let Some(name) = hidden_name(c) {
            let code = format!("U+{:04X}", c as u32);
            if !removed.iter().any(|r| r.character == code) {
                removed.push(RemovedChar {
                    character: code,
                    name: name.to_string(),
                });
            }
            continue;
        }
        if matches!(c, '\r' | '\n' | '\t') {
            continue;
        }
        text.push(c);
    }

    // Any removal can leave a base + combining mark pair behind.
    if !is_nfkc(&text) {
        text = text.nfkc().collect();
    }

    NormalizedText { text, removed }
}
