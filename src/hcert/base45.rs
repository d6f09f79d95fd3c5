// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Base45 (RFC 9285) decoding.
//!
//! Every 3 symbols encode 2 bytes as `c + d*45 + e*45^2`; a trailing pair of
//! symbols encodes a single byte. A trailing single symbol is never valid.

use serde::Serialize;
use utoipa::ToSchema;

/// The 45-symbol alphabet used by HC1 payloads (QR alphanumeric mode).
pub const BASE45_ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base45Error {
    #[error("invalid Base45 character {character:?} at index {index}")]
    InvalidCharacter { index: usize, character: char },

    #[error("invalid Base45 length {0}: a trailing single symbol cannot encode a byte")]
    InvalidLength(usize),

    #[error("Base45 group at index {index} decodes to {value}, which exceeds {max}")]
    GroupOverflow { index: usize, value: u32, max: u32 },
}

/// An out-of-alphabet character found by [`sanitize`].
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct InvalidChar {
    /// Character position (in chars) within the Base45 payload.
    pub index: usize,
    /// The offending character.
    #[serde(rename = "char")]
    pub character: String,
    /// Code point in `U+XXXX` form.
    pub unicode: String,
}

fn symbol_value(c: char) -> Option<u32> {
    BASE45_ALPHABET.find(c).map(|pos| pos as u32)
}

/// Decode a Base45 string into bytes.
///
/// The input is decoded as given; out-of-alphabet characters are an error,
/// never silently skipped.
pub fn decode(input: &str) -> Result<Vec<u8>, Base45Error> {
    let mut values = Vec::with_capacity(input.len());
    for (index, character) in input.chars().enumerate() {
        let value =
            symbol_value(character).ok_or(Base45Error::InvalidCharacter { index, character })?;
        values.push(value);
    }

    if values.len() % 3 == 1 {
        return Err(Base45Error::InvalidLength(values.len()));
    }

    let mut out = Vec::with_capacity(values.len() / 3 * 2 + 1);
    for (group, chunk) in values.chunks(3).enumerate() {
        let index = group * 3;
        match *chunk {
            [c, d, e] => {
                let value = c + d * 45 + e * 45 * 45;
                if value > 0xFFFF {
                    return Err(Base45Error::GroupOverflow {
                        index,
                        value,
                        max: 0xFFFF,
                    });
                }
                out.push((value >> 8) as u8);
                out.push((value & 0xFF) as u8);
            }
            [c, d] => {
                let value = c + d * 45;
                if value > 0xFF {
                    return Err(Base45Error::GroupOverflow {
                        index,
                        value,
                        max: 0xFF,
                    });
                }
                out.push(value as u8);
            }
            _ => return Err(Base45Error::InvalidLength(values.len())),
        }
    }

    Ok(out)
}

/// Split `input` into its in-alphabet characters and a report of the rest.
///
/// Diagnostics only: the decode path never feeds the filtered string back
/// into [`decode`].
pub fn sanitize(input: &str) -> (String, Vec<InvalidChar>) {
    let mut filtered = String::with_capacity(input.len());
    let mut invalid = Vec::new();

    for (index, c) in input.chars().enumerate() {
        if symbol_value(c).is_some() {
            filtered.push(c);
        } else {
            invalid.push(InvalidChar {
                index,
                character: c.to_string(),
                unicode: format!("U+{:04X}", c as u32),
            });
        }
    }

    (filtered, invalid)
}
