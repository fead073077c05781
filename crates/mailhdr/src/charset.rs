//! Charsets for RFC 2047 header encoding and decoding.
//!
//! A [`Charset`] knows which transfer encoding its encoded words use and
//! which charset the encoded bytes are emitted in. Conversion between text
//! and bytes goes through `encoding_rs`.

use std::fmt;
use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{Encoding, UTF_8};

use crate::defect::{Defect, DefectKind};
use crate::error::{Error, Result};

/// Length of the `=??x??=` framing of an encoded word, excluding the charset.
pub const RFC2047_CHROME_LEN: usize = 7;

/// Transfer encoding used for encoded words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderEncoding {
    /// RFC 2047 "Q" encoding.
    QuotedPrintable,
    /// RFC 2047 "B" encoding.
    Base64,
    /// Whichever of Q and B is shorter for the text at hand.
    Shortest,
}

/// (input, header encoding, output conversion)
const CHARSETS: &[(&str, Option<HeaderEncoding>, Option<&str>)] = &[
    ("iso-8859-1", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-2", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-3", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-4", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-9", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-10", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-13", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-14", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-15", Some(HeaderEncoding::QuotedPrintable), None),
    ("iso-8859-16", Some(HeaderEncoding::QuotedPrintable), None),
    ("windows-1252", Some(HeaderEncoding::QuotedPrintable), None),
    ("viscii", Some(HeaderEncoding::QuotedPrintable), None),
    ("us-ascii", None, None),
    ("big5", Some(HeaderEncoding::Base64), None),
    ("gb2312", Some(HeaderEncoding::Base64), None),
    ("euc-jp", Some(HeaderEncoding::Base64), Some("iso-2022-jp")),
    ("shift_jis", Some(HeaderEncoding::Base64), Some("iso-2022-jp")),
    ("iso-2022-jp", Some(HeaderEncoding::Base64), None),
    ("koi8-r", Some(HeaderEncoding::Base64), None),
    ("utf-8", Some(HeaderEncoding::Shortest), None),
];

const ALIASES: &[(&str, &str)] = &[
    ("latin_1", "iso-8859-1"),
    ("latin-1", "iso-8859-1"),
    ("latin_2", "iso-8859-2"),
    ("latin-2", "iso-8859-2"),
    ("latin_3", "iso-8859-3"),
    ("latin-3", "iso-8859-3"),
    ("latin_4", "iso-8859-4"),
    ("latin-4", "iso-8859-4"),
    ("latin_5", "iso-8859-9"),
    ("latin-5", "iso-8859-9"),
    ("latin_6", "iso-8859-10"),
    ("latin-6", "iso-8859-10"),
    ("latin_7", "iso-8859-13"),
    ("latin-7", "iso-8859-13"),
    ("latin_8", "iso-8859-14"),
    ("latin-8", "iso-8859-14"),
    ("latin_9", "iso-8859-15"),
    ("latin-9", "iso-8859-15"),
    ("latin_10", "iso-8859-16"),
    ("latin-10", "iso-8859-16"),
    ("cp949", "ks_c_5601-1987"),
    ("euc_jp", "euc-jp"),
    ("euc_kr", "euc-kr"),
    ("ascii", "us-ascii"),
    ("utf8", "utf-8"),
];

fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower, |(_, canonical)| (*canonical).to_string())
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label,
        "us-ascii" | "ascii" | "us" | "646" | "ansi_x3.4-1968" | "iso646-us"
    )
}

/// Charset of a header chunk.
#[derive(Debug, Clone)]
pub struct Charset {
    input: String,
    output: String,
    header_encoding: Option<HeaderEncoding>,
}

impl Charset {
    /// Looks up `name`, resolving aliases. Unknown charsets encode with
    /// the shorter of Q and B.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let input = canonical_name(name);
        let (header_encoding, output) = CHARSETS
            .iter()
            .find(|(known, _, _)| *known == input)
            .map_or((Some(HeaderEncoding::Shortest), None), |(_, enc, conv)| {
                (*enc, *conv)
            });
        Self {
            output: output.map_or_else(|| input.clone(), ToString::to_string),
            input,
            header_encoding,
        }
    }

    /// The 7-bit charset.
    #[must_use]
    pub fn us_ascii() -> Self {
        Self::new("us-ascii")
    }

    /// UTF-8.
    #[must_use]
    pub fn utf8() -> Self {
        Self::new("utf-8")
    }

    /// Returns `us-ascii` for pure ASCII text and `utf-8` otherwise.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        if text.is_ascii() {
            Self::us_ascii()
        } else {
            Self::utf8()
        }
    }

    /// Returns the canonical input charset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.input
    }

    /// Returns the charset encoded words are emitted in.
    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output
    }

    /// Returns the transfer encoding, or `None` when no encoding is needed.
    #[must_use]
    pub const fn header_encoding(&self) -> Option<HeaderEncoding> {
        self.header_encoding
    }

    /// Encodes `text` into bytes of the output charset.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset is unknown or cannot represent `text`.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>> {
        if is_ascii_label(&self.output) {
            return if text.is_ascii() {
                Ok(text.as_bytes().to_vec())
            } else {
                Err(Error::Unencodable {
                    charset: self.output.clone(),
                    text: text.to_string(),
                })
            };
        }
        let encoding = Encoding::for_label(self.output.as_bytes())
            .ok_or_else(|| Error::UnknownCharset(self.output.clone()))?;
        let (bytes, _, had_errors) = encoding.encode(text);
        if had_errors {
            return Err(Error::Unencodable {
                charset: self.output.clone(),
                text: text.to_string(),
            });
        }
        Ok(bytes.into_owned())
    }

    fn encoder_for(&self, bytes: &[u8]) -> HeaderEncoding {
        match self.header_encoding {
            Some(HeaderEncoding::Shortest) | None => {
                if b_length(bytes) < q_length(bytes) {
                    HeaderEncoding::Base64
                } else {
                    HeaderEncoding::QuotedPrintable
                }
            }
            Some(encoding) => encoding,
        }
    }

    /// Encodes `text` as a single encoded word, or returns it unchanged if
    /// this charset needs no encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` cannot be represented in this charset.
    pub fn header_encode(&self, text: &str) -> Result<String> {
        let bytes = self.encode_text(text)?;
        if self.header_encoding.is_none() {
            return Ok(text.to_string());
        }
        Ok(encode_word(&self.output, self.encoder_for(&bytes), &bytes))
    }

    /// Splits `text` into encoded words whose lengths fit the successive
    /// values of `maxlengths`.
    ///
    /// The first entry is `None` when not even one character fits in the
    /// first length. Multibyte sequences are never split.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` cannot be represented in this charset.
    pub fn header_encode_lines(
        &self,
        text: &str,
        maxlengths: impl Iterator<Item = isize>,
    ) -> Result<Vec<Option<String>>> {
        let encoder = self.encoder_for(&self.encode_text(text)?);
        let extra = signed(self.output.len() + RFC2047_CHROME_LEN);
        let maxlengths = maxlengths.map(|maxlen| maxlen - extra);
        let additive = Encoding::for_label(self.output.as_bytes())
            .is_none_or(|encoding| encoding == UTF_8 || encoding.is_single_byte());
        if additive {
            self.encode_lines_by_char(text, encoder, maxlengths)
        } else {
            self.encode_lines_by_prefix(text, encoder, maxlengths)
        }
    }

    /// Line splitting for charsets where the bytes of a string are the
    /// concatenated bytes of its characters, so the encoded length can be
    /// kept as a running total.
    fn encode_lines_by_char(
        &self,
        text: &str,
        encoder: HeaderEncoding,
        mut maxlengths: impl Iterator<Item = isize>,
    ) -> Result<Vec<Option<String>>> {
        let mut lines: Vec<Option<String>> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        let mut q_len = 0;
        let mut maxlen = maxlengths.next().unwrap_or(isize::MAX);
        let mut buf = [0; 4];

        for ch in text.chars() {
            let bytes = self.encode_text(ch.encode_utf8(&mut buf))?;
            let length = match encoder {
                HeaderEncoding::Base64 => (current.len() + bytes.len()).div_ceil(3) * 4,
                HeaderEncoding::QuotedPrintable | HeaderEncoding::Shortest => {
                    q_len + q_length(&bytes)
                }
            };
            if signed(length) > maxlen {
                if lines.is_empty() && current.is_empty() {
                    lines.push(None);
                } else {
                    lines.push(Some(encode_word(&self.output, encoder, &current)));
                }
                current.clear();
                q_len = 0;
                maxlen = maxlengths.next().unwrap_or(isize::MAX);
            }
            q_len += q_length(&bytes);
            current.extend_from_slice(&bytes);
        }
        lines.push(Some(encode_word(&self.output, encoder, &current)));
        Ok(lines)
    }

    /// Line splitting for stateful charsets such as iso-2022-jp, whose
    /// escape sequences depend on the whole string. Each line is found by
    /// bisecting over prefixes no longer than the line allows.
    fn encode_lines_by_prefix(
        &self,
        text: &str,
        encoder: HeaderEncoding,
        mut maxlengths: impl Iterator<Item = isize>,
    ) -> Result<Vec<Option<String>>> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let count = boundaries.len() - 1;
        let slice = |from: usize, to: usize| &text[boundaries[from]..boundaries[to]];

        let mut lines: Vec<Option<String>> = Vec::new();
        let mut start: usize = 0;
        let mut forced = false;
        let mut maxlen = maxlengths.next().unwrap_or(isize::MAX);
        loop {
            // every character takes at least one encoded byte
            let room = usize::try_from(maxlen).unwrap_or(0);
            let (mut lo, mut hi) = (start, count.min(start.saturating_add(room)));
            while lo < hi {
                let mid = (lo + hi).div_ceil(2);
                let bytes = self.encode_text(slice(start, mid))?;
                if signed(encoded_length(encoder, &bytes)) <= maxlen {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            let end = if forced { lo.max(start + 1).min(count) } else { lo };

            if end == count {
                let bytes = self.encode_text(slice(start, end))?;
                lines.push(Some(encode_word(&self.output, encoder, &bytes)));
                return Ok(lines);
            }
            if end == start && lines.is_empty() {
                lines.push(None);
            } else {
                let bytes = self.encode_text(slice(start, end))?;
                lines.push(Some(encode_word(&self.output, encoder, &bytes)));
            }
            start = end;
            forced = true;
            maxlen = maxlengths.next().unwrap_or(isize::MAX);
        }
    }

    /// Decodes `bytes` from the input charset, failing on anything the
    /// charset cannot represent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCharset`] for a label `encoding_rs` does not
    /// know and [`Error::Undecodable`] for malformed input.
    pub fn decode_strict(&self, bytes: &[u8]) -> Result<String> {
        let undecodable = || Error::Undecodable(self.input.clone());
        if is_ascii_label(&self.input) {
            return if bytes.is_ascii() {
                String::from_utf8(bytes.to_vec()).map_err(|_| undecodable())
            } else {
                Err(undecodable())
            };
        }
        let encoding = Encoding::for_label(self.input.as_bytes())
            .ok_or_else(|| Error::UnknownCharset(self.input.clone()))?;
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(std::borrow::Cow::into_owned)
            .ok_or_else(undecodable)
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.input == other.input
    }
}

impl Eq for Charset {}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.input)
    }
}

const fn is_q_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'!' | b'*' | b'+' | b'/')
}

/// Length of the Q encoding of `bytes`.
#[must_use]
pub fn q_length(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .map(|&b| if is_q_safe(b) || b == b' ' { 1 } else { 3 })
        .sum()
}

fn signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

/// Length of the B encoding of `bytes`.
#[must_use]
pub const fn b_length(bytes: &[u8]) -> usize {
    bytes.len().div_ceil(3) * 4
}

fn encoded_length(encoding: HeaderEncoding, bytes: &[u8]) -> usize {
    match encoding {
        HeaderEncoding::Base64 => b_length(bytes),
        HeaderEncoding::QuotedPrintable | HeaderEncoding::Shortest => q_length(bytes),
    }
}

/// Q-encodes `bytes` without the encoded-word framing.
#[must_use]
pub fn q_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len());
    for &byte in bytes {
        if is_q_safe(byte) {
            encoded.push(char::from(byte));
        } else if byte == b' ' {
            encoded.push('_');
        } else {
            let _ = write!(encoded, "={byte:02X}");
        }
    }
    encoded
}

/// Frames `bytes` as one encoded word; empty input yields an empty string.
fn encode_word(charset: &str, encoding: HeaderEncoding, bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    match encoding {
        HeaderEncoding::Base64 => format!("=?{charset}?b?{}?=", STANDARD.encode(bytes)),
        HeaderEncoding::QuotedPrintable | HeaderEncoding::Shortest => {
            format!("=?{charset}?q?{}?=", q_encode(bytes))
        }
    }
}

/// Decodes `bytes` declared to be in charset `label`.
///
/// Never fails: undecodable bytes are replaced with U+FFFD and reported as
/// an [`DefectKind::UndecodableBytes`] defect, an unknown label is reported
/// as [`DefectKind::CharsetError`] and the bytes are read as ASCII.
#[must_use]
pub fn decode_bytes(bytes: &[u8], label: &str) -> (String, Vec<Defect>) {
    let label = canonical_name(label);
    let mut defects = Vec::new();

    if is_ascii_label(&label) {
        if !bytes.is_ascii() {
            defects.push(Defect::new(
                DefectKind::UndecodableBytes,
                "non-ASCII bytes in us-ascii text",
            ));
        }
        return (ascii_lossy(bytes), defects);
    }

    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        tracing::debug!(charset = %label, "unknown charset");
        defects.push(Defect::new(
            DefectKind::CharsetError,
            format!("unknown charset {label:?}"),
        ));
        return (ascii_lossy(bytes), defects);
    };

    if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        return (text.into_owned(), defects);
    }
    defects.push(Defect::new(
        DefectKind::UndecodableBytes,
        format!("bytes not valid in {}", encoding.name()),
    ));
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    (text.into_owned(), defects)
}

fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
        .collect()
}
