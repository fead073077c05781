//! Typed header objects.
//!
//! A [`Header`] holds a header name, its source and decoded values, the
//! defects found while parsing, and whatever extra data its
//! [`HeaderKind`] extracts (a timestamp for dates, groups for address
//! lists). Headers are built through [`Policy::make_header`], which asks the
//! policy's [`HeaderFactory`] for the kind registered under the name.

mod address;
mod date;
mod factory;
mod kind;

use std::fmt;
use std::sync::Arc;

pub use address::{Address, Group};
pub use date::{HeaderDateTime, format_datetime, parse_date};
pub use factory::HeaderFactory;
pub use kind::{AddressKind, DateKind, HeaderData, HeaderKind, ParsedValue, Unstructured};

use crate::charset::Charset;
use crate::defect::Defect;
use crate::error::{Error, Result};
use crate::folding::{DEFAULT_SPLITCHARS, EncodedHeader, has_encoded_word, split_lines};
use crate::parser::{is_special, quote_string};
use crate::policy::Policy;

/// A parsed header.
#[derive(Debug, Clone)]
pub struct Header {
    name: String,
    source: Option<String>,
    text: String,
    value: String,
    defects: Vec<Defect>,
    kind: Arc<dyn HeaderKind>,
    data: HeaderData,
}

impl Header {
    pub(crate) fn build(
        name: &str,
        raw: &str,
        unfolded: Option<&str>,
        use_decoded: bool,
        kind: Arc<dyn HeaderKind>,
        policy: &Policy,
    ) -> Result<Self> {
        let (source, unfolded) = match unfolded {
            Some(unfolded) => (Some(raw.to_string()), unfolded.to_string()),
            None => {
                let lines = split_lines(raw);
                if lines.len() > 1 || has_encoded_word(raw)? {
                    tracing::warn!(
                        name,
                        "header value with line breaks or encoded words given without an unfolded form"
                    );
                    (None, lines.concat())
                } else {
                    (None, raw.to_string())
                }
            }
        };
        tracing::trace!(name, kind = kind.name(), "creating header");

        let mut parsed = kind.parse(&unfolded, &policy.parser());
        let mut defects = Vec::with_capacity(parsed.defects.len());
        for defect in std::mem::take(&mut parsed.defects) {
            policy.handle_defect(&mut defects, defect)?;
        }
        let data = kind.init(&mut parsed);
        Ok(Self {
            name: name.to_string(),
            source,
            text: if use_decoded {
                parsed.decoded.clone()
            } else {
                raw.to_string()
            },
            value: parsed.decoded,
            defects,
            kind,
            data,
        })
    }

    /// Builds a date header directly from a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp cannot be formatted.
    pub fn from_datetime(name: &str, datetime: HeaderDateTime, policy: &Policy) -> Result<Self> {
        let value = format_datetime(&datetime, false)?;
        Ok(Self {
            name: name.to_string(),
            source: None,
            text: value.clone(),
            value,
            defects: Vec::new(),
            kind: policy.header_factory().kind_for(name),
            data: HeaderData::Date(Some(datetime)),
        })
    }

    /// Header name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value, when the header came from parsed source text.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Canonical decoded value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// String form of the header: the decoded value or the raw value,
    /// depending on how it was created.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Defects found while parsing the value.
    #[must_use]
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// Kind chosen for this header.
    #[must_use]
    pub fn kind(&self) -> &dyn HeaderKind {
        self.kind.as_ref()
    }

    /// `Some(1)` if the header may appear only once.
    #[must_use]
    pub fn max_count(&self) -> Option<usize> {
        self.kind.max_count()
    }

    /// Kind-specific data.
    #[must_use]
    pub const fn data(&self) -> &HeaderData {
        &self.data
    }

    /// Timestamp of a date header.
    #[must_use]
    pub const fn datetime(&self) -> Option<&HeaderDateTime> {
        match &self.data {
            HeaderData::Date(datetime) => datetime.as_ref(),
            _ => None,
        }
    }

    /// Groups of an address header; a bare mailbox is a group with no name.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        match &self.data {
            HeaderData::Address(groups) => groups,
            _ => &[],
        }
    }

    /// Every address, flattened through groups.
    #[must_use]
    pub fn addresses(&self) -> Vec<&Address> {
        self.groups().iter().flat_map(Group::addresses).collect()
    }

    /// The address of a single-address header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSingleAddress`] unless the header's kind holds a
    /// single address and exactly one is present.
    pub fn address(&self) -> Result<&Address> {
        let addresses = self.addresses();
        match addresses.as_slice() {
            [address] if self.kind.is_single_address() => Ok(*address),
            _ => Err(Error::NotSingleAddress {
                name: self.name.clone(),
                count: addresses.len(),
            }),
        }
    }

    /// Folds the decoded value for output, without the `Name: ` prefix.
    ///
    /// Non-ASCII text is written as RFC 2047 encoded words. In address
    /// headers only non-ASCII display names are encoded; addr-specs, group
    /// syntax and separators stay plain. A `max_line_length` of 0 disables
    /// wrapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the folded value would contain an embedded
    /// header, or if an addr-spec is not ASCII.
    pub fn encode(&self, splitchars: &str, max_line_length: usize, linesep: &str) -> Result<String> {
        let mut encoded = EncodedHeader::new()
            .with_name(&self.name)
            .with_max_line_length(max_line_length);
        match &self.data {
            HeaderData::Address(groups) if !self.value.is_ascii() => {
                append_groups(&mut encoded, groups)?;
            }
            _ => encoded.append(&self.value, None)?,
        }
        encoded.encode(splitchars, None, linesep)
    }

    /// Renders the complete header line, `Name: value` plus the policy's
    /// line separator, folded to the policy's line length.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be folded, or if the policy
    /// requires 7-bit output and the header name is not ASCII.
    pub fn fold(&self, policy: &Policy) -> Result<String> {
        let value = self.encode(
            DEFAULT_SPLITCHARS,
            policy.max_line_length().unwrap_or(0),
            policy.linesep(),
        )?;
        let folded = format!("{}: {value}{}", self.name, policy.linesep());
        if policy.must_be_7bit() && !folded.is_ascii() {
            return Err(Error::Unencodable {
                charset: "us-ascii".to_string(),
                text: folded,
            });
        }
        Ok(folded)
    }
}

/// Appends an address list as plain chunks around encoded display names.
fn append_groups(encoded: &mut EncodedHeader, groups: &[Group]) -> Result<()> {
    let mut plain = String::new();
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            plain.push_str(", ");
        }
        if let Some(name) = group.name() {
            append_phrase(encoded, &mut plain, name)?;
            plain.push_str(": ");
        }
        for (position, address) in group.addresses().iter().enumerate() {
            if position > 0 {
                plain.push_str(", ");
            }
            if address.name().is_empty() {
                plain.push_str(&address.addr_spec());
                continue;
            }
            append_phrase(encoded, &mut plain, address.name())?;
            // an encoded name is followed by the chunk transition space
            if !plain.is_empty() {
                plain.push(' ');
            }
            plain.push('<');
            plain.push_str(&address.addr_spec());
            plain.push('>');
        }
        if group.name().is_some() {
            plain.push(';');
        }
    }
    if !plain.is_empty() {
        encoded.append(&plain, Some(&Charset::us_ascii()))?;
    }
    Ok(())
}

/// Adds a display name to `plain`, or flushes `plain` and appends the name
/// as its own encoded chunk when it is not ASCII.
fn append_phrase(encoded: &mut EncodedHeader, plain: &mut String, name: &str) -> Result<()> {
    if name.is_ascii() {
        if name.chars().any(is_special) {
            plain.push_str(&quote_string(name));
        } else {
            plain.push_str(name);
        }
        return Ok(());
    }
    let flushed = plain.trim_end();
    if !flushed.is_empty() {
        encoded.append(flushed, Some(&Charset::us_ascii()))?;
    }
    plain.clear();
    encoded.append(name, Some(&Charset::utf8()))
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<str> for Header {
    fn eq(&self, other: &str) -> bool {
        self.text == other
    }
}

impl PartialEq<&str> for Header {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::defect::DefectKind;

    fn create(name: &str, raw: &str, unfolded: Option<&str>) -> Header {
        HeaderFactory::new()
            .create(name, raw, unfolded, true, &Policy::default())
            .unwrap()
    }

    #[test]
    fn test_source_handling() {
        let header = create("Subject", "plain", None);
        assert_eq!(header.source(), None);
        assert_eq!(header.value(), "plain");

        let header = create("Subject", "folded\n text", Some("folded text"));
        assert_eq!(header.source(), Some("folded\n text"));
        assert_eq!(header.value(), "folded text");

        let header = create("Subject", "folded\n text", None);
        assert_eq!(header.source(), None);
        assert_eq!(header.value(), "folded text");
    }

    #[test]
    fn test_raw_string_form_without_decoding() {
        let raw = "=?utf-8?q?caf=C3=A9?=";
        let header = HeaderFactory::new()
            .create("Subject", raw, Some(raw), false, &Policy::default())
            .unwrap();
        assert_eq!(header, raw);
        assert_eq!(header.value(), "café");
    }

    #[test]
    fn test_date_header() {
        let header = create("Date", "Tue, 15 Nov 1994 08:12:31 -0800", None);
        assert_eq!(header.max_count(), Some(1));
        assert!(header.defects().is_empty());
        assert_eq!(header.value(), "Tue, 15 Nov 1994 08:12:31 -0800");
        assert!(header.datetime().is_some());

        let header = create("Resent-Date", "", None);
        assert_eq!(header.max_count(), None);
        assert_eq!(header.defects().len(), 1);
        assert_eq!(header.defects()[0].kind(), DefectKind::HeaderMissingRequiredValue);
        assert!(header.datetime().is_none());
    }

    #[test]
    fn test_from_datetime() {
        let datetime = parse_date("Tue, 15 Nov 1994 08:12:31 -0000").unwrap();
        let header = Header::from_datetime("Date", datetime, &Policy::default()).unwrap();
        assert_eq!(header, "Tue, 15 Nov 1994 08:12:31 -0000");
        assert_eq!(header.datetime(), Some(&datetime));
        assert_eq!(header.kind().name(), "unique-date");
    }

    #[test]
    fn test_single_address() {
        let header = create("Sender", "Zaphrod Beblebrux <zippy@pinhead.com>", None);
        let address = header.address().unwrap();
        assert_eq!(address.name(), "Zaphrod Beblebrux");
        assert_eq!(address.addr_spec(), "zippy@pinhead.com");
        assert_eq!(header.groups().len(), 1);

        let header = create("Sender", "a@example.com, b@example.com", None);
        assert!(matches!(
            header.address(),
            Err(Error::NotSingleAddress { count: 2, .. })
        ));

        let header = create("To", "a@example.com", None);
        assert!(header.address().is_err());
    }

    #[test]
    fn test_empty_angle_addr_defect() {
        let header = create("Sender", "<>", None);
        assert_eq!(header, "<>");
        let invalid: Vec<_> = header
            .defects()
            .iter()
            .filter(|defect| defect.is_invalid_header())
            .collect();
        assert_eq!(invalid.len(), 1);
        let address = header.address().unwrap();
        assert_eq!(address.reformatted(), "");
    }

    #[test]
    fn test_name_with_dot() {
        let header = create("Sender", "John X. Doe <jxd@example.com>", None);
        assert_eq!(header.defects().len(), 1);
        assert_eq!(header.defects()[0].kind(), DefectKind::ObsoleteHeader);
        let address = header.address().unwrap();
        assert_eq!(address.name(), "John X. Doe");
        assert_eq!(address.reformatted(), "\"John X. Doe\" <jxd@example.com>");
    }

    #[test]
    fn test_quoted_parens_in_name() {
        let header = create("Sender", r#""A \(Special\) Person" <person@dom.ain>"#, None);
        assert_eq!(header, r#""A (Special) Person" <person@dom.ain>"#);
        assert_eq!(header.address().unwrap().name(), "A (Special) Person");
    }

    #[test]
    fn test_address_list() {
        let value = "Fred <dinsdale@python.org>, foo@example.com, \
                     \"Harry W. Hastings\" <hasty@example.com>";
        let header = create("To", value, Some(value));
        assert_eq!(header, value);
        assert_eq!(header.source(), Some(value));
        assert_eq!(header.groups().len(), 3);
        assert_eq!(header.addresses().len(), 3);
        assert_eq!(header.groups()[1].to_string(), "foo@example.com");
        assert_eq!(header.addresses()[2].name(), "Harry W. Hastings");
    }

    #[test]
    fn test_fold() {
        let header = create("To", "whom_it_may_concern@example.com", None);
        let policy = Policy::default().with_max_line_length(Some(20));
        assert_eq!(
            header.fold(&policy).unwrap(),
            "To: \n whom_it_may_concern@example.com\n"
        );
        assert_eq!(
            header.fold(&Policy::smtp()).unwrap(),
            "To: whom_it_may_concern@example.com\r\n"
        );
    }

    #[test]
    fn test_fold_non_ascii_address_list() {
        let header = create("To", "Jöhn Dœ <jd@example.com>, ann@example.org", None);
        let policy = Policy::default();
        let folded = header.fold(&policy).unwrap();
        assert_eq!(
            folded,
            "To: =?utf-8?b?SsO2aG4gRMWT?= <jd@example.com>, ann@example.org\n"
        );

        let value = folded
            .strip_prefix("To: ")
            .and_then(|rest| rest.strip_suffix('\n'))
            .unwrap();
        let reparsed = create("To", value, None);
        let addresses = reparsed.addresses();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].name(), "Jöhn Dœ");
        assert_eq!(addresses[0].addr_spec(), "jd@example.com");
        assert_eq!(addresses[1].addr_spec(), "ann@example.org");
        assert_eq!(reparsed.value(), header.value());
    }

    #[test]
    fn test_fold_non_ascii_group_name() {
        let header = create("To", "Fröhliche: a@example.com, \"B. C\" <b@example.com>;", None);
        let folded = header.fold(&Policy::default()).unwrap();
        assert!(folded.starts_with("To: =?utf-8?"));
        assert!(folded.ends_with("?= : a@example.com, \"B. C\" <b@example.com>;\n"));

        let header = create("To", "Ann <ann@example.org>, x@exämple.com", None);
        assert!(matches!(
            header.fold(&Policy::default()),
            Err(Error::Unencodable { .. })
        ));
    }

    #[test]
    fn test_fold_must_be_7bit() {
        let header = create("X-Grüße", "hello", None);
        assert_eq!(header.fold(&Policy::default()).unwrap(), "X-Grüße: hello\n");
        assert!(matches!(
            header.fold(&Policy::default().with_must_be_7bit(true)),
            Err(Error::Unencodable { .. })
        ));

        let header = create("Subject", "Grüße", None);
        let folded = header.fold(&Policy::default().with_must_be_7bit(true)).unwrap();
        assert!(folded.is_ascii());
    }

    #[test]
    fn test_fold_non_ascii() {
        let header = create("Subject", "Grüße", None);
        assert_eq!(
            header.fold(&Policy::default()).unwrap(),
            "Subject: =?utf-8?b?R3LDvMOfZQ==?=\n"
        );
    }
}
