//! Chunk-based header values that mix charsets.

use std::fmt;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use super::{
    DEFAULT_MAX_LINE_LENGTH, UNLIMITED_LINE_LENGTH, ValueFormatter, compiled, split_lines,
};
use crate::charset::Charset;
use crate::encoded_word;
use crate::error::Result;

/// One piece of a decoded header: raw bytes and the charset they are in,
/// or `None` for text that was never encoded.
pub type DecodedChunk = (Vec<u8>, Option<String>);

static ENCODED_WORD: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?im)=\?([^?]*?)\?([qb])\?(.*?)\?=(?:[ \t]|$)"));

/// True if `value` holds something shaped like an encoded word.
pub(crate) fn has_encoded_word(value: &str) -> Result<bool> {
    Ok(compiled(&ENCODED_WORD)?.is_match(value))
}

enum Word<'a> {
    Plain(&'a str),
    Encoded {
        charset: String,
        encoding: char,
        payload: &'a str,
    },
}

/// Splits a raw header value into decoded chunks.
///
/// Text outside encoded words is trimmed; blank text between two encoded
/// words disappears. Neighbouring chunks in the same charset are merged,
/// with a space between plain chunks.
///
/// # Errors
///
/// Returns [`Error::Base64Decode`](crate::Error::Base64Decode) if a `b`
/// encoded word is not valid base64 after padding.
pub fn decode_header(header: &str) -> Result<Vec<DecodedChunk>> {
    let encoded_word = compiled(&ENCODED_WORD)?;
    if !encoded_word.is_match(header) {
        return Ok(vec![(header.as_bytes().to_vec(), None)]);
    }

    let mut words = Vec::new();
    for line in split_lines(header) {
        let mut last = 0;
        for caps in encoded_word.captures_iter(line) {
            let (Some(whole), Some(charset), Some(encoding), Some(payload)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let plain = line[last..whole.start()].trim();
            if !plain.is_empty() {
                words.push(Word::Plain(plain));
            }
            words.push(Word::Encoded {
                charset: charset.as_str().to_ascii_lowercase(),
                encoding: encoding.as_str().chars().next().unwrap_or('q').to_ascii_lowercase(),
                payload: payload.as_str(),
            });
            last = whole.end();
        }
        let plain = line[last..].trim();
        if !plain.is_empty() {
            words.push(Word::Plain(plain));
        }
    }

    let mut collapsed: Vec<DecodedChunk> = Vec::new();
    for word in words {
        let (bytes, charset) = match word {
            Word::Plain(text) => (text.as_bytes().to_vec(), None),
            Word::Encoded {
                charset,
                encoding,
                payload,
            } => {
                let bytes = if encoding == 'q' {
                    encoded_word::decode_q(payload.as_bytes()).0
                } else {
                    let mut padded = payload.to_string();
                    padded.push_str(&"==="[..(4 - payload.len() % 4) % 4]);
                    STANDARD.decode(padded)?
                };
                (bytes, Some(charset))
            }
        };
        match collapsed.last_mut() {
            Some((last_bytes, last_charset)) if *last_charset == charset => {
                if charset.is_none() {
                    last_bytes.push(b' ');
                }
                last_bytes.extend(bytes);
            }
            _ => collapsed.push((bytes, charset)),
        }
    }
    Ok(collapsed)
}

/// Builds an [`EncodedHeader`] from the output of [`decode_header`].
///
/// # Errors
///
/// Returns an error if a chunk's bytes are not valid in its charset.
pub fn make_header(
    chunks: &[DecodedChunk],
    max_line_length: Option<usize>,
    header_name: Option<&str>,
    continuation_ws: &str,
) -> Result<EncodedHeader> {
    let mut header = EncodedHeader::new().with_continuation_ws(continuation_ws);
    if let Some(max_line_length) = max_line_length {
        header = header.with_max_line_length(max_line_length);
    }
    if let Some(name) = header_name {
        header = header.with_name(name);
    }
    for (bytes, charset) in chunks {
        let charset = charset.as_deref().map(Charset::new);
        header.append_bytes(bytes, charset.as_ref())?;
    }
    Ok(header)
}

/// A header value assembled from chunks of text, each with its own
/// charset, that encodes to folded RFC 2047 output.
#[derive(Debug, Clone)]
pub struct EncodedHeader {
    chunks: Vec<(String, Charset)>,
    charset: Option<Charset>,
    max_line_length: usize,
    header_len: usize,
    continuation_ws: String,
}

impl Default for EncodedHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodedHeader {
    /// Creates an empty header value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            charset: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            header_len: 0,
            continuation_ws: " ".to_string(),
        }
    }

    /// Reserves room on the first line for `"Name: "`.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.header_len = name.chars().count() + 2;
        self
    }

    /// Sets the maximum line length; 0 disables wrapping.
    #[must_use]
    pub const fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Sets the charset used for chunks appended without one.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    /// Sets the whitespace that starts continuation lines.
    #[must_use]
    pub fn with_continuation_ws(mut self, continuation_ws: &str) -> Self {
        self.continuation_ws = continuation_ws.to_string();
        self
    }

    /// Returns the chunks appended so far.
    #[must_use]
    pub fn chunks(&self) -> &[(String, Charset)] {
        &self.chunks
    }

    /// Appends `text` in `charset`.
    ///
    /// Without an explicit charset the header's own charset is used, or
    /// `us-ascii`/`utf-8` depending on the text.
    ///
    /// # Errors
    ///
    /// Returns an error if the charset's output encoding cannot hold `text`.
    pub fn append(&mut self, text: &str, charset: Option<&Charset>) -> Result<()> {
        let charset = charset
            .or(self.charset.as_ref())
            .cloned()
            .unwrap_or_else(|| Charset::for_text(text));
        charset.encode_text(text)?;
        self.chunks.push((text.to_string(), charset));
        Ok(())
    }

    /// Decodes `bytes` from `charset` (default `us-ascii`) and appends them.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid in the charset.
    pub fn append_bytes(&mut self, bytes: &[u8], charset: Option<&Charset>) -> Result<()> {
        let charset = charset
            .or(self.charset.as_ref())
            .cloned()
            .unwrap_or_else(Charset::us_ascii);
        let text = charset.decode_strict(bytes)?;
        self.append(&text, Some(&charset))
    }

    /// Merges neighbouring chunks that share a charset.
    fn normalized(&self) -> Vec<(String, Charset)> {
        let mut chunks: Vec<(String, Charset)> = Vec::with_capacity(self.chunks.len());
        for (text, charset) in &self.chunks {
            match chunks.last_mut() {
                Some((last, last_charset)) if last_charset == charset => {
                    last.push(' ');
                    last.push_str(text);
                }
                _ => chunks.push((text.clone(), charset.clone())),
            }
        }
        chunks
    }

    /// Folds the value into encoded lines.
    ///
    /// `max_line_length` overrides the header's own limit; 0 means no
    /// wrapping.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk cannot be encoded, or if the result
    /// would contain an embedded header line.
    pub fn encode(
        &self,
        splitchars: &str,
        max_line_length: Option<usize>,
        linesep: &str,
    ) -> Result<String> {
        let max_line_length = match max_line_length.unwrap_or(self.max_line_length) {
            0 => UNLIMITED_LINE_LENGTH,
            n => n,
        };
        let mut formatter = ValueFormatter::new(
            self.header_len,
            max_line_length,
            &self.continuation_ws,
            splitchars,
        );
        for (text, charset) in self.normalized() {
            let lines = split_lines(&text);
            formatter.feed("", lines.first().copied().unwrap_or_default(), &charset)?;
            for line in lines.iter().skip(1) {
                formatter.newline();
                let stripped = line.trim_start();
                if charset.header_encoding().is_some() {
                    formatter.feed(&self.continuation_ws, &format!(" {stripped}"), &charset)?;
                } else {
                    let fws = &line[..line.len() - stripped.len()];
                    formatter.feed(fws, stripped, &charset)?;
                }
            }
            if lines.len() > 1 {
                formatter.newline();
            }
            formatter.add_transition();
        }
        formatter.finish(linesep)
    }
}

fn is_plain(charset: &Charset) -> bool {
    charset.header_encoding().is_none()
}

impl fmt::Display for EncodedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last_plain: Option<bool> = None;
        for (text, charset) in self.normalized() {
            // a space separates encoded text from whatever follows or precedes it
            let plain = is_plain(&charset);
            if last_plain.is_some_and(|last_plain| last_plain != plain) {
                f.write_str(" ")?;
            }
            last_plain = Some(plain);
            f.write_str(&text)?;
        }
        Ok(())
    }
}

impl PartialEq for EncodedHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::error::Error;

    const LONG_SUBJECT: &str = "We the willing led by the unknowing are doing the\n \
        impossible for the ungrateful. We have done so much for so long with so little\n \
        we are now qualified to do anything with nothing.";

    fn subject(max: usize) -> String {
        let mut header = EncodedHeader::new().with_name("Subject");
        header.append(LONG_SUBJECT, None).unwrap();
        format!("Subject: {}", header.encode(";, \t", Some(max), "\n").unwrap())
    }

    #[test]
    fn test_long_subject_unlimited() {
        let expected = "Subject: We the willing led by the unknowing are doing the\n \
            impossible for the ungrateful. We have done so much for so long with so little\n \
            we are now qualified to do anything with nothing.";
        assert_eq!(subject(0), expected);
        assert_eq!(subject(100), expected);
    }

    #[test]
    fn test_long_subject_40() {
        assert_eq!(
            subject(40),
            "Subject: We the willing led by the\n unknowing are doing the\n \
             impossible for the ungrateful. We have\n done so much for so long with so little\n \
             we are now qualified to do anything\n with nothing."
        );
    }

    #[test]
    fn test_long_subject_20() {
        assert_eq!(
            subject(20),
            "Subject: We the\n willing led by the\n unknowing are doing\n the\n \
             impossible for the\n ungrateful. We have\n done so much for so\n \
             long with so little\n we are now\n qualified to do\n anything with\n nothing."
        );
    }

    #[test]
    fn test_non_ascii_value_uses_encoded_words() {
        let mut header = EncodedHeader::new();
        header
            .append(
                "Subject: Mein kleiner grüner Kaktus, Es hat viele Stacheln und beißt mich oft.",
                None,
            )
            .unwrap();
        assert_eq!(
            header.encode(";, \t", None, "\n").unwrap(),
            "=?utf-8?q?Subject=3A_Mein_kleiner_gr=C3=BCner_Kaktus=2C_Es_hat_viele_Stachel?=\n \
             =?utf-8?q?n_und_bei=C3=9Ft_mich_oft=2E?="
        );
    }

    #[test]
    fn test_mixed_charsets() {
        let mut header = EncodedHeader::new();
        header.append("Hello", None).unwrap();
        header.append("Wörld", Some(&Charset::utf8())).unwrap();
        header.append("and more", None).unwrap();
        assert_eq!(header.to_string(), "Hello Wörld and more");
        assert_eq!(
            header.encode(";, \t", None, "\n").unwrap(),
            "Hello =?utf-8?b?V8O2cmxk?= and more"
        );
    }

    #[test]
    fn test_same_charset_chunks_merge() {
        let mut header = EncodedHeader::new();
        header.append("one", None).unwrap();
        header.append("two", None).unwrap();
        assert_eq!(header.chunks().len(), 2);
        assert_eq!(header.to_string(), "one two");
    }

    #[test]
    fn test_append_rejects_unencodable_text() {
        let mut header = EncodedHeader::new();
        assert!(matches!(
            header.append("café", Some(&Charset::us_ascii())),
            Err(Error::Unencodable { .. })
        ));
        assert!(matches!(
            header.append_bytes(b"caf\xe9", None),
            Err(Error::Undecodable(_))
        ));
    }

    #[test]
    fn test_linesep_and_embedded_header() {
        let mut header = EncodedHeader::new().with_name("X");
        header.append("line one\nline two", None).unwrap();
        assert_eq!(header.encode(";, \t", None, "\r\n").unwrap(), "line one\r\nline two");

        let mut header = EncodedHeader::new().with_name("X");
        header.append("innocent\nBcc: victim@example.com", None).unwrap();
        assert!(matches!(
            header.encode(";, \t", None, "\n"),
            Err(Error::EmbeddedHeader(_))
        ));
    }

    #[test]
    fn test_decode_header_plain() {
        assert_eq!(
            decode_header("just text").unwrap(),
            vec![(b"just text".to_vec(), None)]
        );
    }

    #[test]
    fn test_decode_header_merges_charsets() {
        assert_eq!(
            decode_header("=?iso-8859-1?q?hello_W=F6rld?= =?ISO-8859-1?Q?_!?= plain").unwrap(),
            vec![
                (b"hello W\xf6rld !".to_vec(), Some("iso-8859-1".to_string())),
                (b"plain".to_vec(), None),
            ]
        );
        assert_eq!(
            decode_header("=?utf-8?b?SMOpbGxv?= and =?UTF-8?Q?more?=").unwrap(),
            vec![
                (b"H\xc3\xa9llo".to_vec(), Some("utf-8".to_string())),
                (b"and".to_vec(), None),
                (b"more".to_vec(), Some("utf-8".to_string())),
            ]
        );
    }

    #[test]
    fn test_decode_header_bad_base64() {
        assert!(matches!(
            decode_header("=?utf-8?b?!!!!?="),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn test_make_header_round_trip() {
        let chunks = decode_header("=?iso-8859-1?q?hello_W=F6rld?= plain").unwrap();
        let header = make_header(&chunks, None, Some("Subject"), " ").unwrap();
        assert_eq!(header.to_string(), "hello Wörld plain");
        assert_eq!(
            header.encode(";, \t", None, "\n").unwrap(),
            "=?iso-8859-1?q?hello_W=F6rld?= plain"
        );
    }
}
