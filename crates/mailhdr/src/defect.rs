//! Non-fatal anomalies found while parsing or decoding header values.
//!
//! A [`Defect`] is recorded on the token where it was detected and later
//! collected by the header that owns the tree. Under the default policy
//! defects are only reported; a strict policy raises the first one.

use std::fmt;

/// Category of a [`Defect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DefectKind {
    /// Syntax that violates the grammar and required recovery.
    InvalidHeader,
    /// Obsolete syntax that is still accepted.
    ObsoleteHeader,
    /// Control characters in text that should be printable.
    NonPrintable,
    /// Base64 payload with missing or excess padding.
    InvalidBase64Padding,
    /// Base64 payload containing characters outside the alphabet.
    InvalidBase64Characters,
    /// Bytes that the declared charset cannot decode.
    UndecodableBytes,
    /// Charset label that is not recognised.
    CharsetError,
    /// A header that requires a value was empty.
    HeaderMissingRequiredValue,
    /// A date header whose value could not be parsed.
    InvalidDateTime,
    /// A header that may appear only once was repeated.
    DuplicateHeader,
}

impl DefectKind {
    /// Returns true for kinds that make the surrounding mailbox unusable.
    #[must_use]
    pub const fn is_invalid_header(self) -> bool {
        matches!(self, Self::InvalidHeader)
    }

    /// Returns the kind name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidHeader => "InvalidHeaderDefect",
            Self::ObsoleteHeader => "ObsoleteHeaderDefect",
            Self::NonPrintable => "NonPrintableDefect",
            Self::InvalidBase64Padding => "InvalidBase64PaddingDefect",
            Self::InvalidBase64Characters => "InvalidBase64CharactersDefect",
            Self::UndecodableBytes => "UndecodableBytesDefect",
            Self::CharsetError => "CharsetError",
            Self::HeaderMissingRequiredValue => "HeaderMissingRequiredValue",
            Self::InvalidDateTime => "InvalidDateDefect",
            Self::DuplicateHeader => "DuplicateHeaderDefect",
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded anomaly: a kind plus a human readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Defect {
    kind: DefectKind,
    detail: String,
}

impl Defect {
    /// Creates a defect.
    #[must_use]
    pub fn new(kind: DefectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Grammar violation.
    #[must_use]
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(DefectKind::InvalidHeader, detail)
    }

    /// Accepted obsolete syntax.
    #[must_use]
    pub fn obsolete(detail: impl Into<String>) -> Self {
        Self::new(DefectKind::ObsoleteHeader, detail)
    }

    /// Repeated occurrence of a header limited to one instance.
    #[must_use]
    pub fn duplicate_header(name: &str) -> Self {
        Self::new(
            DefectKind::DuplicateHeader,
            format!("header {name:?} may appear at most once"),
        )
    }

    /// Returns the defect kind.
    #[must_use]
    pub const fn kind(&self) -> DefectKind {
        self.kind
    }

    /// Returns the detail message.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Shorthand for `self.kind().is_invalid_header()`.
    #[must_use]
    pub const fn is_invalid_header(&self) -> bool {
        self.kind.is_invalid_header()
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.detail)
        }
    }
}
