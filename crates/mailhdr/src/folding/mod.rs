//! Line folding for header values.
//!
//! [`ValueFormatter`] builds output lines from `(leading whitespace, text)`
//! chunks. ASCII text is folded at whitespace and the caller's split
//! characters; text in a charset that needs RFC 2047 encoding is turned into
//! encoded words sized to the room left on each line.
//!
//! ```
//! use mailhdr::Charset;
//! use mailhdr::folding::ValueFormatter;
//!
//! let mut formatter = ValueFormatter::new(9, 20, " ", ";, \t");
//! formatter.feed("", "We the willing led by the unknowing", &Charset::us_ascii())?;
//! assert_eq!(
//!     formatter.finish("\n")?,
//!     "We the\n willing led by the\n unknowing"
//! );
//! # Ok::<(), mailhdr::Error>(())
//! ```

mod chunks;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::charset::Charset;
use crate::error::{Error, Result};

pub(crate) use chunks::has_encoded_word;
pub use chunks::{DecodedChunk, EncodedHeader, decode_header, make_header};

/// Default split characters, in priority order.
pub const DEFAULT_SPLITCHARS: &str = ";, \t";

/// Default maximum line length, excluding the line separator.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 78;

/// Line length used when a maximum of 0 asks for no wrapping.
pub const UNLIMITED_LINE_LENGTH: usize = 1_000_000;

static EMBEDDED_HEADER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\n[^ \t]+:"));

pub(crate) fn compiled(
    regex: &'static LazyLock<std::result::Result<Regex, regex::Error>>,
) -> Result<&'static Regex> {
    regex
        .as_ref()
        .map_err(|err| Error::HeaderParse(err.to_string()))
}

/// Fails if folded output contains a line that would start a new header.
///
/// # Errors
///
/// Returns [`Error::EmbeddedHeader`] when a line separator is followed by
/// non-blank characters and a colon.
pub fn check_embedded_header(value: &str) -> Result<()> {
    if compiled(&EMBEDDED_HEADER)?.is_match(value) {
        tracing::debug!(value, "refusing folded value with embedded header");
        return Err(Error::EmbeddedHeader(value.to_string()));
    }
    Ok(())
}

/// Splits `text` at line boundaries the way `str::lines` does, but also
/// breaks on lone `\r` and the other Unicode line separators.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        let is_break = matches!(
            ch,
            '\n' | '\r' | '\x0b' | '\x0c' | '\x1c'..='\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
        );
        if !is_break {
            continue;
        }
        lines.push(&text[start..i]);
        let mut end = i + ch.len_utf8();
        if ch == '\r' && chars.peek().is_some_and(|&(_, next)| next == '\n') {
            chars.next();
            end += 1;
        }
        start = end;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

/// The line being built: `(fws, text)` parts plus the width already taken
/// by whatever precedes the first part (the header name on line one).
#[derive(Debug)]
struct Accumulator {
    parts: Vec<(String, String)>,
    initial_size: usize,
}

impl Accumulator {
    const fn new(initial_size: usize) -> Self {
        Self {
            parts: Vec::new(),
            initial_size,
        }
    }

    fn push(&mut self, fws: impl Into<String>, text: impl Into<String>) {
        self.parts.push((fws.into(), text.into()));
    }

    fn pop(&mut self) -> (String, String) {
        self.parts.pop().unwrap_or_default()
    }

    fn pop_from(&mut self, index: usize) -> Vec<(String, String)> {
        self.parts.split_off(index)
    }

    fn width(&self) -> usize {
        self.parts
            .iter()
            .map(|(fws, text)| char_len(fws) + char_len(text))
            .sum::<usize>()
            + self.initial_size
    }

    fn reset(&mut self, parts: Vec<(String, String)>) {
        self.parts = parts;
        self.initial_size = 0;
    }

    fn is_only_whitespace(&self) -> bool {
        let line = self.to_string();
        self.initial_size == 0
            && (self.parts.is_empty()
                || (!line.is_empty() && line.chars().all(char::is_whitespace)))
    }
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (fws, text) in &self.parts {
            f.write_str(fws)?;
            f.write_str(text)?;
        }
        Ok(())
    }
}

/// Folds header text into lines no longer than a maximum width.
#[derive(Debug)]
pub struct ValueFormatter {
    max_line_length: usize,
    continuation_ws: String,
    continuation_len: usize,
    splitchars: Vec<char>,
    lines: Vec<String>,
    current: Accumulator,
}

impl ValueFormatter {
    /// Creates a formatter whose first line already holds `header_len`
    /// characters (`"Name: "`).
    #[must_use]
    pub fn new(
        header_len: usize,
        max_line_length: usize,
        continuation_ws: &str,
        splitchars: &str,
    ) -> Self {
        Self {
            max_line_length,
            continuation_ws: continuation_ws.to_string(),
            continuation_len: char_len(continuation_ws),
            splitchars: splitchars.chars().collect(),
            lines: Vec::new(),
            current: Accumulator::new(header_len),
        }
    }

    /// Ends the current line.
    ///
    /// A trailing transition marker is dropped, and a line holding nothing
    /// but whitespace is glued onto the previous line.
    pub fn newline(&mut self) {
        let end_of_line = self.current.pop();
        if end_of_line.0 != " " || !end_of_line.1.is_empty() {
            self.current.push(end_of_line.0, end_of_line.1);
        }
        if self.current.width() > 0 {
            let line = self.current.to_string();
            match self.lines.last_mut() {
                Some(last) if self.current.is_only_whitespace() => last.push_str(&line),
                _ => self.lines.push(line),
            }
        }
        self.current.reset(Vec::new());
    }

    /// Marks a boundary between chunks; renders as one space unless it
    /// ends up at the end of a line.
    pub fn add_transition(&mut self) {
        self.current.push(" ", "");
    }

    /// Appends `text`, preceded by `fws`, folding as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` cannot be encoded in `charset`.
    pub fn feed(&mut self, fws: &str, text: &str, charset: &Charset) -> Result<()> {
        if charset.header_encoding().is_none() {
            self.ascii_split(fws, text);
            return Ok(());
        }

        let first = signed(self.max_line_length) - signed(self.current.width());
        let rest = signed(self.max_line_length) - signed(self.continuation_len);
        let maxlengths = std::iter::once(first).chain(std::iter::repeat(rest));
        let mut encoded = charset.header_encode_lines(text, maxlengths)?.into_iter();

        if let Some(Some(first_line)) = encoded.next() {
            self.append_chunk(fws, &first_line);
        }
        let mut remaining: Vec<String> = encoded.map(Option::unwrap_or_default).collect();
        let Some(last_line) = remaining.pop() else {
            return Ok(());
        };
        self.newline();
        self.current.push(self.continuation_ws.clone(), last_line);
        for line in remaining {
            self.lines.push(format!("{}{line}", self.continuation_ws));
        }
        Ok(())
    }

    /// Flushes the current line and joins every line with `linesep`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddedHeader`] if the result would smuggle in an
    /// extra header line.
    pub fn finish(mut self, linesep: &str) -> Result<String> {
        self.newline();
        let value = self.lines.join(linesep);
        check_embedded_header(&value)?;
        Ok(value)
    }

    fn ascii_split(&mut self, fws: &str, text: &str) {
        let joined = format!("{fws}{text}");
        for (fws, part) in whitespace_runs(&joined) {
            self.append_chunk(fws, part);
        }
    }

    fn append_chunk(&mut self, fws: &str, text: &str) {
        self.current.push(fws, text);
        if self.current.width() <= self.max_line_length {
            return;
        }

        let parts = &self.current.parts;
        let split_at = self.splitchars.iter().find_map(|&ch| {
            (1..parts.len()).rev().find(|&i| {
                (ch.is_whitespace() && parts[i].0.starts_with(ch)) || parts[i - 1].1.ends_with(ch)
            })
        });

        if let Some(index) = split_at {
            let remainder = self.current.pop_from(index);
            self.lines.push(self.current.to_string());
            self.current.reset(remainder);
        } else {
            let (mut fws, text) = self.current.pop();
            if self.current.initial_size > 0 {
                // nowhere to split: move the token to a line of its own
                self.newline();
                if fws.is_empty() {
                    fws = " ".to_string();
                }
            }
            self.current.push(fws, text);
        }
    }
}

/// Pairs each run of non-blank text with the blanks before it. Leading
/// text gets an empty prefix; trailing blanks pair with empty text.
fn whitespace_runs(text: &str) -> Vec<(&str, &str)> {
    let is_blank = |ch: char| ch == ' ' || ch == '\t';
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if !is_blank(ch) {
            continue;
        }
        let mut end = i + ch.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_blank(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        pieces.push(&text[text_start..i]);
        pieces.push(&text[i..end]);
        text_start = end;
    }
    pieces.push(&text[text_start..]);

    if pieces[0].is_empty() {
        pieces.remove(0);
    } else {
        pieces.insert(0, "");
    }
    pieces
        .chunks(2)
        .filter_map(|pair| match pair {
            [fws, part] => Some((*fws, *part)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fold(header_len: usize, max: usize, text: &str) -> String {
        let mut formatter = ValueFormatter::new(header_len, max, " ", DEFAULT_SPLITCHARS);
        formatter.feed("", text, &Charset::us_ascii()).unwrap();
        formatter.finish("\n").unwrap()
    }

    #[test]
    fn test_whitespace_runs() {
        assert_eq!(whitespace_runs(""), vec![]);
        assert_eq!(whitespace_runs("abc"), vec![("", "abc")]);
        assert_eq!(whitespace_runs(" abc"), vec![(" ", "abc")]);
        assert_eq!(whitespace_runs("abc "), vec![("", "abc"), (" ", "")]);
        assert_eq!(
            whitespace_runs("a \tb  c"),
            vec![("", "a"), (" \t", "b"), ("  ", "c")]
        );
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(split_lines("\n\nx"), vec!["", "", "x"]);
    }

    #[test]
    fn test_short_value_untouched() {
        assert_eq!(fold(9, 78, "short subject"), "short subject");
    }

    #[test]
    fn test_fold_at_whitespace() {
        assert_eq!(
            fold(9, 40, "We the willing led by the unknowing are doing the"),
            "We the willing led by the\n unknowing are doing the"
        );
    }

    #[test]
    fn test_unsplittable_token_moves_to_own_line() {
        assert_eq!(
            fold(6, 40, "nobody_you_want_to_know@example.com"),
            "\n nobody_you_want_to_know@example.com"
        );
    }

    #[test]
    fn test_splitchar_priority() {
        assert_eq!(
            fold(3, 20, "aaaa; bbbb cccc dddd eeee"),
            "aaaa;\n bbbb cccc dddd eeee"
        );
        assert_eq!(fold(3, 10, "one;two,three four"), "\n one;two,three\n four");
    }

    #[test]
    fn test_encoded_feed() {
        let mut formatter = ValueFormatter::new(9, 78, " ", DEFAULT_SPLITCHARS);
        formatter
            .feed(
                "",
                "Mein kleiner grüner Kaktus, Es hat viele Stacheln und beißt mich oft.",
                &Charset::utf8(),
            )
            .unwrap();
        assert_eq!(
            formatter.finish("\n").unwrap(),
            "=?utf-8?q?Mein_kleiner_gr=C3=BCner_Kaktus=2C_Es_hat_viele_Stacheln_?=\n \
             =?utf-8?q?und_bei=C3=9Ft_mich_oft=2E?="
        );
    }

    #[test]
    fn test_transition_dropped_at_end_of_line() {
        let mut formatter = ValueFormatter::new(0, 78, " ", DEFAULT_SPLITCHARS);
        formatter.feed("", "abc", &Charset::us_ascii()).unwrap();
        formatter.add_transition();
        assert_eq!(formatter.finish("\n").unwrap(), "abc");
    }

    #[test]
    fn test_embedded_header_rejected() {
        assert!(matches!(
            check_embedded_header("x\nBcc: victim@example.com"),
            Err(Error::EmbeddedHeader(_))
        ));
        assert!(check_embedded_header("x\n Bcc: folded is fine").is_ok());
        assert!(check_embedded_header("line one\nline two").is_ok());
    }

    proptest! {
        #[test]
        fn folded_lines_fit_unless_unsplittable(
            words in proptest::collection::vec("[a-z]{1,12}", 1..30),
            max in 20_usize..80,
        ) {
            let folded = fold(0, max, &words.join(" "));
            for line in folded.split('\n') {
                prop_assert!(line.len() <= max || !line.trim_start().contains(' '));
            }
            let rejoined: Vec<&str> = folded.split_whitespace().collect();
            prop_assert_eq!(rejoined, words.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
