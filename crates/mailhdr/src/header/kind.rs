//! Per-header parsing strategies.
//!
//! A [`HeaderKind`] decides how a header value is parsed and what extra
//! data the resulting [`Header`](super::Header) carries. The
//! [`HeaderFactory`](super::HeaderFactory) picks one by header name.

use std::fmt;
use std::mem;

use super::address::Group;
use super::date::{HeaderDateTime, format_datetime, parse_date};
use crate::defect::{Defect, DefectKind};
use crate::parser::Parser;

/// Kind-specific data attached to a header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderData {
    /// Nothing beyond the decoded value.
    #[default]
    None,
    /// Parsed timestamp, `None` when the value could not be parsed.
    Date(Option<HeaderDateTime>),
    /// Address groups in header order.
    Address(Vec<Group>),
}

/// Output of [`HeaderKind::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedValue {
    /// Canonical decoded value.
    pub decoded: String,
    /// Defects found while parsing, in order.
    pub defects: Vec<Defect>,
    /// Extra fields consumed by [`HeaderKind::init`].
    pub data: HeaderData,
}

/// Parsing strategy for one family of headers.
pub trait HeaderKind: fmt::Debug + Send + Sync {
    /// Short name of the kind, e.g. `unique-address`.
    fn name(&self) -> &'static str;

    /// `Some(1)` if the header may appear only once in a message.
    fn max_count(&self) -> Option<usize>;

    /// Parses an unfolded value. Never fails; problems become defects.
    fn parse(&self, value: &str, parser: &Parser) -> ParsedValue;

    /// Takes the extra fields produced by [`parse`](Self::parse).
    fn init(&self, parsed: &mut ParsedValue) -> HeaderData {
        mem::take(&mut parsed.data)
    }

    /// True for kinds whose value is exactly one address.
    fn is_single_address(&self) -> bool {
        false
    }
}

const fn unique_count(unique: bool) -> Option<usize> {
    if unique { Some(1) } else { None }
}

/// Free text with encoded words decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unstructured {
    unique: bool,
}

impl Unstructured {
    /// A header that may repeat.
    #[must_use]
    pub const fn repeatable() -> Self {
        Self { unique: false }
    }

    /// A header that may appear once.
    #[must_use]
    pub const fn unique() -> Self {
        Self { unique: true }
    }
}

impl HeaderKind for Unstructured {
    fn name(&self) -> &'static str {
        if self.unique {
            "unique-unstructured"
        } else {
            "unstructured"
        }
    }

    fn max_count(&self) -> Option<usize> {
        unique_count(self.unique)
    }

    fn parse(&self, value: &str, parser: &Parser) -> ParsedValue {
        let tree = parser.get_unstructured(value);
        ParsedValue {
            decoded: tree.to_string(),
            defects: tree.all_defects().into_iter().cloned().collect(),
            data: HeaderData::None,
        }
    }
}

/// A single timestamp, normalised on output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateKind {
    unique: bool,
}

impl DateKind {
    /// A header that may repeat (`Resent-Date`).
    #[must_use]
    pub const fn repeatable() -> Self {
        Self { unique: false }
    }

    /// A header that may appear once (`Date`).
    #[must_use]
    pub const fn unique() -> Self {
        Self { unique: true }
    }
}

impl HeaderKind for DateKind {
    fn name(&self) -> &'static str {
        if self.unique { "unique-date" } else { "date" }
    }

    fn max_count(&self) -> Option<usize> {
        unique_count(self.unique)
    }

    fn parse(&self, value: &str, _parser: &Parser) -> ParsedValue {
        if value.trim().is_empty() {
            return ParsedValue {
                decoded: String::new(),
                defects: vec![Defect::new(
                    DefectKind::HeaderMissingRequiredValue,
                    "date header has no value",
                )],
                data: HeaderData::Date(None),
            };
        }
        match parse_date(value) {
            Some(dt) => ParsedValue {
                decoded: format_datetime(&dt, false).unwrap_or_else(|_| dt.to_string()),
                defects: Vec::new(),
                data: HeaderData::Date(Some(dt)),
            },
            None => {
                tracing::debug!(value, "unparsable date");
                ParsedValue {
                    decoded: value.to_string(),
                    defects: vec![Defect::new(
                        DefectKind::InvalidDateTime,
                        format!("cannot parse date {value:?}"),
                    )],
                    data: HeaderData::Date(None),
                }
            }
        }
    }
}

/// A list of addresses and groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressKind {
    unique: bool,
    single: bool,
}

impl AddressKind {
    /// Creates an address kind.
    ///
    /// `single` kinds expose [`Header::address`](super::Header::address).
    #[must_use]
    pub const fn new(unique: bool, single: bool) -> Self {
        Self { unique, single }
    }
}

impl HeaderKind for AddressKind {
    fn name(&self) -> &'static str {
        match (self.unique, self.single) {
            (false, false) => "address",
            (true, false) => "unique-address",
            (false, true) => "single-address",
            (true, true) => "unique-single-address",
        }
    }

    fn max_count(&self) -> Option<usize> {
        unique_count(self.unique)
    }

    fn parse(&self, value: &str, parser: &Parser) -> ParsedValue {
        let (list, rest) = parser.get_address_list(value);
        if !rest.is_empty() {
            tracing::warn!(rest, "address list left input unparsed");
        }
        let groups: Vec<Group> = list.addresses().into_iter().map(Group::from_address).collect();
        ParsedValue {
            decoded: groups
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            defects: list.all_defects().into_iter().cloned().collect(),
            data: HeaderData::Address(groups),
        }
    }

    fn is_single_address(&self) -> bool {
        self.single
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_counts() {
        assert_eq!(Unstructured::unique().max_count(), Some(1));
        assert_eq!(Unstructured::repeatable().max_count(), None);
        assert_eq!(DateKind::unique().name(), "unique-date");
        assert_eq!(AddressKind::new(true, true).name(), "unique-single-address");
        assert!(AddressKind::new(false, true).is_single_address());
        assert!(!AddressKind::new(true, false).is_single_address());
    }

    #[test]
    fn test_unstructured_parse() {
        let parsed = Unstructured::unique().parse("=?utf-8?q?caf=C3=A9?= time", &Parser::default());
        assert_eq!(parsed.decoded, "café time");
        assert!(parsed.defects.is_empty());
        assert_eq!(parsed.data, HeaderData::None);
    }

    #[test]
    fn test_date_parse() {
        let kind = DateKind::unique();
        let parsed = kind.parse("15 Nov 1994 08:12:31 -0800", &Parser::default());
        assert_eq!(parsed.decoded, "Tue, 15 Nov 1994 08:12:31 -0800");
        assert!(matches!(parsed.data, HeaderData::Date(Some(_))));

        let parsed = kind.parse("", &Parser::default());
        assert_eq!(parsed.defects[0].kind(), DefectKind::HeaderMissingRequiredValue);
        assert_eq!(parsed.decoded, "");

        let parsed = kind.parse("yesterday", &Parser::default());
        assert_eq!(parsed.defects[0].kind(), DefectKind::InvalidDateTime);
        assert_eq!(parsed.decoded, "yesterday");
        assert_eq!(parsed.data, HeaderData::Date(None));
    }

    #[test]
    fn test_init_takes_data() {
        let kind = AddressKind::new(false, false);
        let mut parsed = kind.parse("a@example.com, b@example.com", &Parser::default());
        assert_eq!(parsed.decoded, "a@example.com, b@example.com");
        let HeaderData::Address(groups) = kind.init(&mut parsed) else {
            panic!("expected address data");
        };
        assert_eq!(groups.len(), 2);
        assert_eq!(parsed.data, HeaderData::None);
    }
}
