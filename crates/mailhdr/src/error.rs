//! Error types for header parsing and generation.

use crate::defect::Defect;

/// Result type alias for header operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Header error types.
///
/// Most anomalies in header values are reported as [`Defect`]s and never
/// surface here. An error is returned only when an input cannot be handled
/// at all, or when a strict [`Policy`](crate::Policy) turns a defect into a
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural failure that reached a public entry point.
    #[error("Header parse error: {0}")]
    HeaderParse(String),

    /// Malformed `=?charset?cte?payload?=` envelope.
    #[error("Invalid encoded word: {0}")]
    EncodedWordFormat(String),

    /// Encoded word with a transfer encoding other than `q` or `b`.
    #[error("Unknown encoded word encoding: {0}")]
    UnknownEncoding(String),

    /// A defect raised under a strict policy.
    #[error("Header defect: {0}")]
    Defect(Defect),

    /// Charset label not known to the encoder.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// Text cannot be represented in the requested charset.
    #[error("Text {text:?} cannot be encoded as {charset}")]
    Unencodable {
        /// Output charset name.
        charset: String,
        /// The offending text.
        text: String,
    },

    /// Bytes that are not valid in their declared charset.
    #[error("Bytes cannot be decoded as {0}")]
    Undecodable(String),

    /// Folded output contains something that looks like another header.
    #[error("Header value appears to contain an embedded header: {0:?}")]
    EmbeddedHeader(String),

    /// A single-address accessor was used on a header without exactly one address.
    #[error("Header {name} has {count} addresses, expected exactly one")]
    NotSingleAddress {
        /// Header name.
        name: String,
        /// Number of addresses actually present.
        count: usize,
    },

    /// GMT formatting was requested for a timestamp that is not UTC.
    #[error("usegmt formatting requires a UTC timestamp")]
    NotUtc,

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl From<Defect> for Error {
    fn from(defect: Defect) -> Self {
        Self::Defect(defect)
    }
}
