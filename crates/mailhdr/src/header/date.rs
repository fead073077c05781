//! RFC 5322 date-time values.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Timestamp carried by a date header.
///
/// A value whose zone is `-0000` states that the local offset is unknown;
/// it is kept as a naive time rather than read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderDateTime {
    /// Time with a known offset.
    Aware(DateTime<FixedOffset>),
    /// Time whose offset is unknown.
    Naive(NaiveDateTime),
}

impl HeaderDateTime {
    /// Returns the local wall-clock time.
    #[must_use]
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            Self::Aware(dt) => dt.naive_local(),
            Self::Naive(dt) => *dt,
        }
    }

    /// Returns the offset, if known.
    #[must_use]
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Aware(dt) => Some(*dt.offset()),
            Self::Naive(_) => None,
        }
    }
}

impl From<DateTime<FixedOffset>> for HeaderDateTime {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::Aware(dt)
    }
}

impl From<NaiveDateTime> for HeaderDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self::Naive(dt)
    }
}

impl fmt::Display for HeaderDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aware(dt) => write!(f, "{}", dt.format("%a, %d %b %Y %H:%M:%S %z")),
            Self::Naive(dt) => write!(f, "{} -0000", dt.format(DATE_FORMAT)),
        }
    }
}

/// Strips a trailing `(comment)` such as `(PST)`.
fn strip_trailing_comment(value: &str) -> &str {
    let value = value.trim();
    if value.ends_with(')') {
        if let Some(open) = value.rfind('(') {
            return value[..open].trim_end();
        }
    }
    value
}

/// Parses an RFC 5322 date, accepting obsolete zone names and two-digit
/// years.
#[must_use]
pub fn parse_date(value: &str) -> Option<HeaderDateTime> {
    let value = strip_trailing_comment(value);
    let parsed = DateTime::parse_from_rfc2822(value).ok()?;
    if value.ends_with("-0000") {
        Some(HeaderDateTime::Naive(parsed.naive_local()))
    } else {
        Some(HeaderDateTime::Aware(parsed))
    }
}

/// Formats `dt` as an RFC 5322 date.
///
/// With `use_gmt` the zone is written as `GMT`, which is only allowed for
/// UTC timestamps.
///
/// # Errors
///
/// Returns [`Error::NotUtc`] if `use_gmt` is set and `dt` is not UTC.
pub fn format_datetime(dt: &HeaderDateTime, use_gmt: bool) -> Result<String> {
    if !use_gmt {
        return Ok(dt.to_string());
    }
    match dt {
        HeaderDateTime::Aware(aware) if aware.offset().local_minus_utc() == 0 => {
            Ok(format!("{} GMT", aware.format(DATE_FORMAT)))
        }
        _ => Err(Error::NotUtc),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_parse_aware() {
        let parsed = parse_date("Tue, 15 Nov 1994 08:12:31 -0800").unwrap();
        let expected = FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(1994, 11, 15, 8, 12, 31)
            .unwrap();
        assert_eq!(parsed, HeaderDateTime::Aware(expected));
        assert_eq!(parsed.offset(), Some(FixedOffset::west_opt(8 * 3600).unwrap()));
        assert_eq!(parsed.to_string(), "Tue, 15 Nov 1994 08:12:31 -0800");
    }

    #[test]
    fn test_parse_unknown_offset_is_naive() {
        let parsed = parse_date("Tue, 15 Nov 1994 08:12:31 -0000").unwrap();
        let expected = NaiveDate::from_ymd_opt(1994, 11, 15)
            .unwrap()
            .and_hms_opt(8, 12, 31)
            .unwrap();
        assert_eq!(parsed, HeaderDateTime::Naive(expected));
        assert_eq!(parsed.offset(), None);
        assert_eq!(parsed.to_string(), "Tue, 15 Nov 1994 08:12:31 -0000");
    }

    #[test]
    fn test_parse_with_comment_and_obsolete_zone() {
        let parsed = parse_date("Tue, 15 Nov 1994 08:12:31 -0800 (PST)").unwrap();
        assert_eq!(parsed.naive_local().to_string(), "1994-11-15 08:12:31");
        let parsed = parse_date("15 Nov 1994 16:12:31 GMT").unwrap();
        assert_eq!(parsed.to_string(), "Tue, 15 Nov 1994 16:12:31 +0000");
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_format_gmt() {
        let utc = HeaderDateTime::Aware(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2001, 9, 11, 12, 46, 0)
                .unwrap(),
        );
        assert_eq!(
            format_datetime(&utc, true).unwrap(),
            "Tue, 11 Sep 2001 12:46:00 GMT"
        );
        let local = parse_date("Tue, 15 Nov 1994 08:12:31 -0800").unwrap();
        assert!(matches!(format_datetime(&local, true), Err(Error::NotUtc)));
    }
}
