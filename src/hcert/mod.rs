// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HC1 health-certificate decoding.
//!
//! ```text
//! raw text ─ normalize ─ "HC1:" ─ Base45 ─ zlib ─ CBOR ─ COSE_Sign1
//!                                                          │
//!                                     kid / iss / -260 ◄───┘
//! ```
//!
//! Every stage is pure and fails fast: a later stage never runs on the
//! output of a failed one.

pub mod base45;
pub mod cbor;
pub mod claims;
pub mod cose;
pub mod inflate;
pub mod json_safe;
pub mod normalize;
pub mod reference;

pub use base45::{Base45Error, InvalidChar};
pub use cbor::{get_claim, CborError, CborValue};
pub use cose::{CoseError, CoseSign1};
pub use inflate::InflateError;
pub use normalize::{normalize, NormalizedText, RemovedChar};
pub use reference::{resolve_from_claims, resolve_reference, ShlinkReference};

/// Prefix identifying an HC1 payload.
pub const HC1_PREFIX: &str = "HC1:";

/// Characters of the input echoed back in `invalid_format` errors.
const RECEIVED_PREFIX_CHARS: usize = 10;

/// Bytes of decompressed CBOR echoed back as hex when COSE decoding fails.
const PREVIEW_BYTES: usize = 100;

/// Tunables for [`decode_hc1`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Cap on the zlib output; `None` leaves it unbounded.
    pub max_inflated_bytes: Option<usize>,
}

/// A successfully decoded HC1 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedHcert {
    /// Hidden characters stripped by normalization.
    pub removed: Vec<RemovedChar>,
    pub base45_decoded_len: usize,
    pub zlib_decompressed_len: usize,
    pub cose: CoseSign1,
    /// Key identifier, base64url when it was carried as bytes.
    pub kid: Option<String>,
    /// The `-260 / 1` certificate claim, absent for pointer-only certificates.
    pub hcert: Option<CborValue>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("qr_data field required")]
    MissingInput,

    #[error("Server received HTML, not an HC1 string. Check API_BASE/port or proxy.")]
    HtmlDocument,

    #[error("Data must start with HC1:")]
    InvalidPrefix { received_prefix: String },

    #[error("{source}")]
    Base45 {
        source: Base45Error,
        invalid_chars: Vec<InvalidChar>,
    },

    #[error("{0}")]
    Inflate(#[from] InflateError),

    #[error("{source}")]
    Cbor {
        source: CborError,
        preview_hex: String,
    },

    #[error("{source}")]
    Cose {
        source: CoseError,
        preview_hex: String,
    },
}

impl DecodeError {
    /// Stable machine-readable code for the failing stage.
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::MissingInput => "missing_qr_data",
            DecodeError::HtmlDocument => "html_received_instead_of_hc1",
            DecodeError::InvalidPrefix { .. } => "invalid_format",
            DecodeError::Base45 { .. } => "base45_decode_failed",
            DecodeError::Inflate(_) => "zlib_decompress_failed",
            DecodeError::Cbor { .. } => "cbor_decode_failed",
            DecodeError::Cose { .. } => "cose_decode_failed",
        }
    }

    /// Pipeline stage name used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            DecodeError::MissingInput | DecodeError::HtmlDocument | DecodeError::InvalidPrefix { .. } => {
                "input"
            }
            DecodeError::Base45 { .. } => "base45",
            DecodeError::Inflate(_) => "zlib",
            DecodeError::Cbor { .. } => "cbor",
            DecodeError::Cose { .. } => "cose",
        }
    }

    fn from_cose(err: CoseError, cbor: &[u8]) -> Self {
        let preview_hex = hex_preview(cbor);
        match err {
            CoseError::Cbor(source) => DecodeError::Cbor {
                source,
                preview_hex,
            },
            source => DecodeError::Cose {
                source,
                preview_hex,
            },
        }
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(PREVIEW_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start();
    let lowered: String = head.chars().take(16).collect::<String>().to_ascii_lowercase();
    lowered.starts_with("<!doctype html") || lowered.starts_with("<html")
}

/// Run the full HC1 pipeline over raw scanned or pasted text.
pub fn decode_hc1(raw: &str, options: &DecodeOptions) -> Result<DecodedHcert, DecodeError> {
    tracing::info!(raw_len = raw.len(), "decoding HC1 payload");

    let NormalizedText { text, removed } = normalize(raw);
    if !removed.is_empty() {
        tracing::info!(removed = ?removed, "stripped hidden characters");
    }

    if text.is_empty() {
        return Err(DecodeError::MissingInput);
    }
    if looks_like_html(&text) {
        tracing::warn!(stage = "input", "HTML document received instead of HC1");
        return Err(DecodeError::HtmlDocument);
    }
    let Some(body) = text.strip_prefix(HC1_PREFIX) else {
        let received_prefix: String = text.chars().take(RECEIVED_PREFIX_CHARS).collect();
        tracing::warn!(stage = "input", %received_prefix, "missing HC1 prefix");
        return Err(DecodeError::InvalidPrefix { received_prefix });
    };

    let compressed = base45::decode(body).map_err(|source| {
        let (_, invalid_chars) = base45::sanitize(body);
        tracing::warn!(stage = "base45", error = %source, invalid_chars = ?invalid_chars, "Base45 decode failed");
        DecodeError::Base45 {
            source,
            invalid_chars,
        }
    })?;
    tracing::info!(bytes = compressed.len(), "Base45 decoded");

    let cbor = inflate::inflate(&compressed, options.max_inflated_bytes).map_err(|err| {
        tracing::warn!(stage = "zlib", error = %err, "zlib decompress failed");
        DecodeError::Inflate(err)
    })?;
    tracing::info!(bytes = cbor.len(), "zlib decompressed");

    let cose = cose::decode_cose_sign1(&cbor).map_err(|err| {
        let err = DecodeError::from_cose(err, &cbor);
        tracing::warn!(stage = err.stage(), error = %err, "COSE_Sign1 decode failed");
        err
    })?;
    tracing::info!(tags = ?cose.tags, "COSE_Sign1 decoded");

    let kid = claims::extract_kid(&cose.protected, &cose.unprotected);
    if let Some(kid) = &kid {
        tracing::info!(kid = %kid, "key identifier found");
    }

    let hcert = claims::extract_hcert(&cose.payload).cloned();
    if hcert.is_some() {
        tracing::info!("extracted -260/1 certificate claim");
    }

    Ok(DecodedHcert {
        removed,
        base45_decoded_len: compressed.len(),
        zlib_decompressed_len: cbor.len(),
        cose,
        kid,
        hcert,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    /// Canonical pointer-only certificate: `-260 / 5` holds a SHLink pointer array.
    pub(crate) const SAMPLE_HC1: &str = "HC1:6BFOXNMG2N9HZBPYHQ3D69SO5D6%9L60JO DJS4L:P:R8LCDO%0AA3BI16TMVMJ3$C*2AL+J7AJENS:NK7VCECM:MQ0FE%JC5Y479D/*8G.CV3NV3OVLD86J:KE2HF86GX2BTLHA9A86GNY8XOIROBZQMQOB9MEBED:KE87B MH:8DZYK%KNU9O%UL75E2*KH42$T8CRJ.V89:GF-K8JVT$8LQN YVKY8$IV7/05T8::S%MV6J3$IV747ZIV7WN3$V8U8 IVNVG/U85VCEWVLTVUPVFCN.9FS0JE/8L-AXS8LMFLIF%57LSV$TFVZK%57NTV1IN1$VNVGHVVFWC9UVGYG8UVFGV%TFI3J5XK L0A/S3VGKJN5QN8$SAC71EN/6JU%8.YI3T8O8FPVNRT2OMNR3BBSNTGVCRNY83%%GEO0/933OJOLN4RVQJ0.H9PBL7EPYDK3I6.ROIAW231W/PUA16UEZ3IK6MABH53FW5909VRR91%MS*H9DMNCTNX7P0VYJH5 H7+SR/PTT89E7:TF3.EN$UF$B42SK72/QHR11U0VAY3C9JTB4MVVIB45TJ1XPU0U%*SBMRUS4*C5V.O+HEYBS930.80T5";

    pub(crate) const SAMPLE_MANIFEST_URL: &str =
        "http://lacpass.create.cl:8182/v2/manifests/ba07611d-b9c8-4104-a086-554d8b6cc014";

    /// Base45-encode bytes; test-only inverse of [`base45::decode`].
    fn base45_encode(bytes: &[u8]) -> String {
        let alphabet: Vec<char> = base45::BASE45_ALPHABET.chars().collect();
        let mut out = String::new();
        for chunk in bytes.chunks(2) {
            let mut n = chunk[0] as usize;
            let digits = if chunk.len() == 2 {
                n = n * 256 + chunk[1] as usize;
                3
            } else {
                2
            };
            for _ in 0..digits {
                out.push(alphabet[n % 45]);
                n /= 45;
            }
        }
        out
    }

    fn hc1_from_cbor(cbor: &[u8]) -> String {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(cbor).unwrap();
        format!("{HC1_PREFIX}{}", base45_encode(&encoder.finish().unwrap()))
    }

    #[test]
    fn decodes_canonical_sample() {
        let decoded = decode_hc1(SAMPLE_HC1, &DecodeOptions::default()).unwrap();

        assert_eq!(decoded.base45_decoded_len, 409);
        assert_eq!(decoded.zlib_decompressed_len, 406);
        assert_eq!(decoded.cose.tags, vec![18]);
        assert_eq!(decoded.kid.as_deref(), Some("I1BAX8FATLs="));
        assert_eq!(
            decoded.cose.signature.as_deref(),
            Some("OK5Ba5glwnQjmHVj0YOsFPpB3uNG2GnZ3TS7K1hUorASAo56x95jSBCrwMIi2WanxrmBDemDxF6CUURDIbH9sQ")
        );
        assert_eq!(
            claims::extract_issuer(&decoded.cose.payload).as_deref(),
            Some("XJ")
        );
        assert_eq!(claims::extract_expires_at(&decoded.cose.payload), Some(1_745_589_915));
        assert_eq!(decoded.hcert, None);
        assert!(decoded.removed.is_empty());

        let reference = resolve_from_claims(None, Some(&decoded.cose.payload)).unwrap();
        assert_eq!(reference.url.as_deref(), Some(SAMPLE_MANIFEST_URL));
        assert_eq!(reference.flags.as_deref(), Some("P"));
        assert_eq!(reference.exp, Some(1_745_589_915_953));
        assert_eq!(
            reference.key.as_deref(),
            Some("zTDODNtALI-QznMxJpbjDZ3xIKhAve8Pgr9T1L81LuU=")
        );
    }

    #[test]
    fn hidden_characters_do_not_mask_the_prefix() {
        let noisy = format!("\u{FEFF}HC1:\u{200B}{}\r\n", &SAMPLE_HC1[4..]);
        let decoded = decode_hc1(&noisy, &DecodeOptions::default()).unwrap();
        assert_eq!(decoded.base45_decoded_len, 409);
        let names: Vec<_> = decoded.removed.iter().map(|r| r.character.as_str()).collect();
        assert_eq!(names, vec!["U+FEFF", "U+200B"]);
    }

    #[test]
    fn input_errors() {
        let opts = DecodeOptions::default();
        assert_eq!(decode_hc1("", &opts), Err(DecodeError::MissingInput));
        assert_eq!(decode_hc1("\r\n\t", &opts), Err(DecodeError::MissingInput));

        let err = decode_hc1("<!DOCTYPE html><html></html>", &opts).unwrap_err();
        assert_eq!(err.code(), "html_received_instead_of_hc1");
        assert_eq!(decode_hc1("<html>", &opts).unwrap_err().code(), "html_received_instead_of_hc1");

        assert_eq!(
            decode_hc1("shlink://abcdefghijkl", &opts),
            Err(DecodeError::InvalidPrefix {
                received_prefix: "shlink://a".into()
            })
        );
        assert_eq!(
            decode_hc1("hc1:", &opts),
            Err(DecodeError::InvalidPrefix {
                received_prefix: "hc1:".into()
            })
        );
    }

    #[test]
    fn base45_failure_reports_invalid_chars() {
        let err = decode_hc1("HC1:AB#C", &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "base45_decode_failed");
        match err {
            DecodeError::Base45 { invalid_chars, .. } => {
                assert_eq!(invalid_chars.len(), 1);
                assert_eq!(invalid_chars[0].index, 2);
                assert_eq!(invalid_chars[0].unicode, "U+0023");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zlib_failure_is_reported() {
        // "BB8" decodes to b"AB", which is not a zlib stream
        let err = decode_hc1("HC1:BB8", &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "zlib_decompress_failed");
    }

    #[test]
    fn inflate_limit_is_honoured() {
        let opts = DecodeOptions {
            max_inflated_bytes: Some(64),
        };
        let err = decode_hc1(SAMPLE_HC1, &opts).unwrap_err();
        assert_eq!(err, DecodeError::Inflate(InflateError::TooLarge { limit: 64 }));
    }

    #[test]
    fn cose_shape_failure_carries_preview() {
        // CBOR array of three empty byte strings
        let hc1 = hc1_from_cbor(&[0x83, 0x40, 0x40, 0x40]);
        let err = decode_hc1(&hc1, &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "cose_decode_failed");
        match err {
            DecodeError::Cose { preview_hex, .. } => assert_eq!(preview_hex, "83404040"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cbor_failure_is_distinct_from_cose_shape() {
        // truncated array header
        let hc1 = hc1_from_cbor(&[0x84]);
        let err = decode_hc1(&hc1, &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.code(), "cbor_decode_failed");
    }
}
