//! RFC 2047 encoded-word decoding.
//!
//! The Q and B payload decoders never fail; anything odd about the payload
//! is reported as a [`Defect`]. Only [`decode`] can return an error, and only
//! when the `=?charset?cte?payload?=` envelope itself is malformed, which
//! callers rule out first with [`is_encoded_word`].

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::charset;
use crate::defect::{Defect, DefectKind};
use crate::error::{Error, Result};

/// Alphabet-only, canonically padded base64 that tolerates non-zero
/// trailing bits.
const STRICT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

fn padding_defect() -> Defect {
    Defect::new(
        DefectKind::InvalidBase64Padding,
        "base64 encoded word has incorrect padding",
    )
}

/// Decodes the payload of a Q encoded word.
///
/// `_` becomes a space and `=XX` becomes the byte `0xXX`; malformed escapes
/// are kept verbatim.
#[must_use]
pub fn decode_q(encoded: &[u8]) -> (Vec<u8>, Vec<Defect>) {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        match encoded[i] {
            b'_' => decoded.push(b' '),
            b'=' => match encoded
                .get(i + 1..i + 3)
                .and_then(|pair| hex_pair(pair[0], pair[1]))
            {
                Some(byte) => {
                    decoded.push(byte);
                    i += 2;
                }
                None => decoded.push(b'='),
            },
            byte => decoded.push(byte),
        }
        i += 1;
    }
    (decoded, Vec::new())
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let high = char::from(high).to_digit(16)?;
    let low = char::from(low).to_digit(16)?;
    u8::try_from(high * 16 + low).ok()
}

/// Decodes the payload of a B encoded word.
///
/// A payload whose length is not a multiple of four gets one padding
/// defect and is padded. If strict decoding still fails, non-alphabet bytes
/// are dropped and up to three extra `=` are tried; the decodable prefix is
/// returned if nothing works.
#[must_use]
pub fn decode_b(encoded: &[u8]) -> (Vec<u8>, Vec<Defect>) {
    let mut defects = Vec::new();
    let pad_err = encoded.len() % 4;
    let mut padded = encoded.to_vec();
    if pad_err != 0 {
        defects.push(padding_defect());
        padded.extend_from_slice(&b"==="[..4 - pad_err]);
    }
    if let Ok(decoded) = STRICT_BASE64.decode(&padded) {
        return (decoded, defects);
    }

    let mut defects = vec![Defect::new(
        DefectKind::InvalidBase64Characters,
        "base64 encoded word contains characters outside the alphabet",
    )];
    let mut best = Vec::new();
    for extra in 0..4 {
        let mut attempt = encoded.to_vec();
        attempt.resize(encoded.len() + extra, b'=');
        let (decoded, complete) = decode_lenient(&attempt);
        if complete {
            return (decoded, defects);
        }
        if extra == 0 {
            defects.push(padding_defect());
        }
        best = decoded;
    }
    tracing::trace!(len = encoded.len(), "base64 payload truncated to decodable prefix");
    (best, defects)
}

fn sextet(byte: u8) -> Option<u8> {
    match byte {
        b'A'..=b'Z' => Some(byte - b'A'),
        b'a'..=b'z' => Some(byte - b'a' + 26),
        b'0'..=b'9' => Some(byte - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Base64 decoding that skips bytes outside the alphabet and stops at the
/// first padding that closes a quantum. Returns the bytes decoded so far and
/// whether the input ended on a quantum boundary.
fn decode_lenient(data: &[u8]) -> (Vec<u8>, bool) {
    let mut decoded = Vec::with_capacity(data.len() / 4 * 3);
    let mut quad_pos = 0_u8;
    let mut acc = 0_u32;
    let mut bits = 0_u32;

    for (i, &byte) in data.iter().enumerate() {
        if byte == b'=' {
            let next_valid = data[i + 1..]
                .iter()
                .copied()
                .find(|&b| b == b'=' || sextet(b).is_some());
            if quad_pos >= 3 || (quad_pos == 2 && next_valid == Some(b'=')) {
                return (decoded, true);
            }
            continue;
        }
        let Some(value) = sextet(byte) else {
            continue;
        };
        quad_pos = (quad_pos + 1) & 3;
        acc = (acc << 6) | u32::from(value);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            decoded.push(u8::try_from((acc >> bits) & 0xff).unwrap_or_default());
            acc &= (1 << bits) - 1;
        }
    }
    (decoded, bits == 0)
}

/// Returns true if `token` has the full `=?charset?q|b?payload?=` shape
/// that [`decode`] accepts.
#[must_use]
pub fn is_encoded_word(token: &str) -> bool {
    if !(token.len() >= 4 && token.starts_with("=?") && token.ends_with("?=")) {
        return false;
    }
    let fields: Vec<&str> = token.split('?').collect();
    fields.len() == 5 && matches!(fields[2], "q" | "Q" | "b" | "B")
}

/// Decodes a complete encoded word into text.
///
/// Undecodable bytes are replaced with U+FFFD and reported as defects.
///
/// # Errors
///
/// Returns [`Error::EncodedWordFormat`] if `word` does not split into the
/// five `?`-separated fields, and [`Error::UnknownEncoding`] if the
/// transfer encoding is neither `q` nor `b`.
pub fn decode(word: &str) -> Result<(String, Vec<Defect>)> {
    let fields: Vec<&str> = word.split('?').collect();
    let [_, charset, cte, payload, _] = fields.as_slice() else {
        return Err(Error::EncodedWordFormat(word.to_string()));
    };
    // RFC 2231 language suffix
    let charset = charset.split_once('*').map_or(*charset, |(name, _)| name);

    let (bytes, mut defects) = match cte.to_ascii_lowercase().as_str() {
        "q" => decode_q(payload.as_bytes()),
        "b" => decode_b(payload.as_bytes()),
        _ => return Err(Error::UnknownEncoding((*cte).to_string())),
    };
    let (text, charset_defects) = charset::decode_bytes(&bytes, charset);
    defects.extend(charset_defects);
    Ok((text, defects))
}
