// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! zlib inflation of the Base45-decoded byte stream.

use flate2::{Decompress, FlushDecompress, Status};

/// Output growth step when the inflater runs out of room.
const CHUNK: usize = 4 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InflateError {
    #[error("no compressed data to inflate")]
    EmptyInput,

    #[error("corrupt zlib stream: {0}")]
    Corrupt(String),

    #[error("zlib stream truncated after {consumed} of {total} input bytes")]
    Truncated { consumed: usize, total: usize },

    #[error("inflated output exceeds the configured limit of {limit} bytes")]
    TooLarge { limit: usize },
}

/// Inflate a zlib (RFC 1950) stream.
///
/// Header, deflate data and the Adler-32 trailer are all checked; the
/// stream must reach its end marker. `limit` caps the output size when set.
pub fn inflate(input: &[u8], limit: Option<usize>) -> Result<Vec<u8>, InflateError> {
    if input.is_empty() {
        return Err(InflateError::EmptyInput);
    }

    let mut inflater = Decompress::new(true);
    let mut out: Vec<u8> = Vec::with_capacity(input.len().saturating_mul(2).max(CHUNK));

    loop {
        if out.len() == out.capacity() {
            out.reserve(CHUNK);
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();

        let status = inflater
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| InflateError::Corrupt(e.to_string()))?;

        if let Some(limit) = limit {
            if out.len() > limit {
                return Err(InflateError::TooLarge { limit });
            }
        }

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let progressed = inflater.total_in() as usize != consumed
                    || inflater.total_out() != produced;
                if !progressed {
                    return Err(InflateError::Truncated {
                        consumed: inflater.total_in() as usize,
                        total: input.len(),
                    });
                }
            }
        }
    }
}
