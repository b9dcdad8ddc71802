//! Encoding Detection
//!
//! Uploaded CSVs arrive as raw bytes with no declared encoding. Korean business
//! exports are frequently CP949 or EUC-KR rather than UTF-8, so decoding tries a
//! fixed candidate list in order and accepts the first candidate that decodes
//! cleanly and yields plausible text.

use crate::error::{Result, StoryError};
use encoding_rs::{EUC_KR, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

/// Ratio of control characters (excluding tab/CR/LF) above which a decode is
/// rejected as implausible even when the decoder reported no errors.
const MAX_CONTROL_RATIO: f64 = 0.05;

/// Delimiter bytes considered during sniffing, in preference order.
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedEncoding {
    Utf8,
    Cp949,
    EucKr,
    Other,
}

impl DetectedEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            DetectedEncoding::Utf8 => "utf-8",
            DetectedEncoding::Cp949 => "cp949",
            DetectedEncoding::EucKr => "euc-kr",
            DetectedEncoding::Other => "windows-1252",
        }
    }
}

/// Text decoded from an uploaded byte stream, tagged with the accepted encoding.
#[derive(Clone, Debug)]
pub struct DecodedText {
    pub text: String,
    pub encoding: DetectedEncoding,
}

/// Decode raw bytes by trying UTF-8, then windows-949 (CP949/EUC-KR), then a
/// windows-1252 byte-level fallback. Pure: the same bytes always produce the
/// same result.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedText> {
    let mut attempted = Vec::new();

    attempted.push("utf-8".to_string());
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors && is_plausible_text(&text) {
        return Ok(DecodedText {
            text: text.into_owned(),
            encoding: DetectedEncoding::Utf8,
        });
    }

    attempted.push("cp949".to_string());
    attempted.push("euc-kr".to_string());
    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if !had_errors && is_plausible_text(&text) {
        // encoding_rs's EUC-KR decoder is the windows-949 superset; report the
        // narrower label when every multi-byte sequence stays in strict EUC-KR
        // ranges.
        let encoding = if uses_cp949_extensions(bytes) {
            DetectedEncoding::Cp949
        } else {
            DetectedEncoding::EucKr
        };
        return Ok(DecodedText {
            text: text.into_owned(),
            encoding,
        });
    }

    attempted.push("windows-1252".to_string());
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if !had_errors && is_plausible_text(&text) {
        return Ok(DecodedText {
            text: text.into_owned(),
            encoding: DetectedEncoding::Other,
        });
    }

    Err(StoryError::EncodingDetection { attempted })
}

/// Reject decodes whose output is dominated by control characters. A wrong
/// single-byte decode of a binary payload decodes "successfully" but fails here.
fn is_plausible_text(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let total = text.chars().count();
    let control = text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\t' | '\r' | '\n'))
        .count();
    (control as f64) / (total as f64) <= MAX_CONTROL_RATIO
}

/// Strict EUC-KR double-byte sequences use lead 0xA1-0xFE and trail 0xA1-0xFE.
/// CP949 extends the lead range down to 0x81 and widens the trail range; any
/// sequence outside the strict ranges means the file needed the extension.
fn uses_cp949_extensions(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            i += 1;
            continue;
        }
        if (0x81..=0xA0).contains(&b) {
            return true;
        }
        if let Some(&trail) = bytes.get(i + 1) {
            if !(0xA1..=0xFE).contains(&trail) {
                return true;
            }
        }
        i += 2;
    }
    false
}

/// Sniff the field delimiter from the header line: the candidate occurring most
/// often wins, with the candidate order breaking ties. Defaults to comma for a
/// single-column file.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let mut best = b',';
    let mut best_count = 0usize;
    for candidate in DELIMITER_CANDIDATES {
        let count = header.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}
