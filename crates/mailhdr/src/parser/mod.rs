//! Recursive-descent parser for RFC 5322 header values.
//!
//! Every production is a method on [`Parser`] that takes the remaining
//! input and returns the token it built together with the unconsumed rest.
//! Productions that can fail return [`ParseError`]; callers use that to
//! backtrack and try an alternative. Recoverable problems never fail the
//! parse: they are recorded as [`Defect`]s on the token where they were
//! found.
//!
//! The two list productions, [`Parser::get_address_list`] and
//! [`Parser::get_mailbox_list`], never fail. An entry that cannot be parsed
//! becomes an `invalid-mailbox` node and parsing resumes at the next comma.
//!
//! # Example
//!
//! ```
//! use mailhdr::parser::Parser;
//!
//! let parser = Parser::default();
//! let (list, rest) = parser.get_address_list("Fred <fred@example.com>, jane@example.org");
//! assert!(rest.is_empty());
//! assert_eq!(list.addresses().len(), 2);
//! ```

#![allow(clippy::missing_errors_doc)]

mod accessor;
mod token;

pub use token::{Terminal, Token, TokenKind, TokenList, quote_string};

use crate::defect::{Defect, DefectKind};
use crate::encoded_word;
use crate::error::Error;

/// Comment nesting deeper than this is consumed without further recursion.
pub const DEFAULT_MAX_COMMENT_DEPTH: usize = 64;

const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '@', ',', ':', ';', '.', '\\', '"', '[', ']',
];

/// Failure of a single production.
///
/// This is internal control flow; public entry points either recover from
/// it or convert it into [`Error::HeaderParse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(String);

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::HeaderParse(err.0)
    }
}

/// Result of a production: the token and the unconsumed input.
pub type ParseResult<'a, T> = Result<(T, &'a str), ParseError>;

const fn is_wsp(ch: char) -> bool {
    matches!(ch, ' ' | '\t')
}

pub(crate) fn is_special(ch: char) -> bool {
    SPECIALS.contains(&ch)
}

pub(crate) fn is_atom_end(ch: char) -> bool {
    is_special(ch) || is_wsp(ch)
}

fn is_phrase_end(ch: char) -> bool {
    is_special(ch) && !matches!(ch, '.' | '"' | '(')
}

fn first(value: &str) -> Option<char> {
    value.chars().next()
}

fn rest(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next();
    chars.as_str()
}

fn starts_with_cfws(value: &str) -> bool {
    first(value).is_some_and(|ch| is_wsp(ch) || ch == '(')
}

fn starts_with_wsp(value: &str) -> bool {
    first(value).is_some_and(is_wsp)
}

/// Splits `value` at its first run of blanks: `(word, blanks, rest)`.
fn split_wsp(value: &str) -> (&str, &str, &str) {
    let Some(start) = value.find(is_wsp) else {
        return (value, "", "");
    };
    let after = &value[start..];
    let end = after.find(|ch| !is_wsp(ch)).unwrap_or(after.len());
    (&value[..start], &after[..end], &after[end..])
}

/// Reads up to the first unescaped `endchars` member or blank.
///
/// Returns the unescaped text, the rest of the input and whether any quoted
/// pair was seen. An escaped endchar is kept as text.
fn get_ptext_to_endchars<'a>(value: &'a str, endchars: &[char]) -> (String, &'a str, bool) {
    let fragment_end = value.find(is_wsp).unwrap_or(value.len());
    let mut text = String::new();
    let mut escape = false;
    let mut had_qp = false;
    let mut end = fragment_end;
    for (pos, ch) in value[..fragment_end].char_indices() {
        if escape {
            escape = false;
            had_qp = true;
            text.push(ch);
        } else if ch == '\\' {
            escape = true;
        } else if endchars.contains(&ch) {
            end = pos;
            break;
        } else {
            text.push(ch);
        }
    }
    (text, &value[end..], had_qp)
}

fn validate_xtext(terminal: &mut Terminal) {
    let non_printables: Vec<char> = terminal
        .text()
        .chars()
        .filter(|ch| matches!(ch, '\0'..=' ' | '\x7f'))
        .collect();
    if !non_printables.is_empty() {
        terminal.push_defect(Defect::new(
            DefectKind::NonPrintable,
            format!("non-printable characters {non_printables:?}"),
        ));
    }
}

/// Wraps `token` as the single child of a new `kind` list.
fn wrap(kind: TokenKind, token: impl Into<Token>) -> TokenList {
    TokenList::with_children(kind, vec![token.into()])
}

/// Accumulates unstructured text, turning blank runs into `fws` tokens.
#[derive(Default)]
struct UnstructuredBuilder {
    list: Option<TokenList>,
    pending_ws: String,
}

impl UnstructuredBuilder {
    fn list(&mut self) -> &mut TokenList {
        self.list
            .get_or_insert_with(|| TokenList::new(TokenKind::Unstructured))
    }

    fn push_word(&mut self, word: &str) {
        if !self.pending_ws.is_empty() {
            let ws = std::mem::take(&mut self.pending_ws);
            self.list().push(Terminal::whitespace(ws, TokenKind::Fws));
        }
        let mut vtext = Terminal::new(word, TokenKind::Vtext);
        validate_xtext(&mut vtext);
        self.list().push(vtext);
    }

    fn push_text(&mut self, text: &str) {
        let mut text = text;
        while !text.is_empty() {
            let (word, ws, after) = split_wsp(text);
            if word.is_empty() {
                self.pending_ws.push_str(ws);
            } else {
                self.push_word(word);
                self.pending_ws = ws.to_string();
            }
            text = after;
        }
    }

    fn finish(mut self) -> TokenList {
        if !self.pending_ws.is_empty() {
            let ws = std::mem::take(&mut self.pending_ws);
            self.list().push(Terminal::whitespace(ws, TokenKind::Fws));
        }
        self.list
            .unwrap_or_else(|| TokenList::new(TokenKind::Unstructured))
    }
}

/// Decodes a run of encoded words separated only by blanks.
///
/// The blanks between adjacent encoded words are dropped. Returns the
/// decoded text, the input starting at the blanks after the last decoded
/// word, and the decoding defects; `None` if `value` does not start with an
/// encoded word.
fn decode_encoded_word_run(value: &str) -> Option<(String, &str, Vec<Defect>)> {
    let mut text = String::new();
    let mut defects = Vec::new();
    let mut pending = value;
    let mut current = value;
    while !current.is_empty() {
        let (word, _, after) = split_wsp(current);
        if !encoded_word::is_encoded_word(word) {
            break;
        }
        let Ok((decoded, word_defects)) = encoded_word::decode(word) else {
            break;
        };
        text.push_str(&decoded);
        defects.extend(word_defects);
        pending = &current[word.len()..];
        current = after;
    }
    (pending.len() < value.len()).then_some((text, pending, defects))
}

/// Decodes the encoded words an atom starts with into a single atext.
///
/// Blanks between adjacent encoded words are dropped. Returns `None` when the
/// atom's text is not an encoded word.
fn decode_encoded_atext(value: &str) -> Option<(Terminal, &str)> {
    let mut text = String::new();
    let mut defects = Vec::new();
    let mut rest = value;
    let mut current = value;
    loop {
        let end = current.find(is_atom_end).unwrap_or(current.len());
        let word = &current[..end];
        if !encoded_word::is_encoded_word(word) {
            break;
        }
        let Ok((decoded, word_defects)) = encoded_word::decode(word) else {
            break;
        };
        text.push_str(&decoded);
        defects.extend(word_defects);
        rest = &current[end..];
        current = rest.trim_start_matches(is_wsp);
        if current.len() == rest.len() {
            break;
        }
    }
    if rest.len() == value.len() {
        return None;
    }
    let mut atext = Terminal::new(text, TokenKind::Atext);
    for defect in defects {
        atext.push_defect(defect);
    }
    Some((atext, rest))
}

/// Header value parser.
///
/// The parser itself is stateless apart from its limits; the same value
/// can be shared across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parser {
    max_comment_depth: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMENT_DEPTH)
    }
}

impl Parser {
    /// Creates a parser with the given comment nesting limit.
    #[must_use]
    pub const fn new(max_comment_depth: usize) -> Self {
        Self { max_comment_depth }
    }

    /// Returns the comment nesting limit.
    #[must_use]
    pub const fn max_comment_depth(&self) -> usize {
        self.max_comment_depth
    }

    /// Parses an unstructured value, decoding encoded words.
    ///
    /// Never fails. Blanks between adjacent encoded words are dropped;
    /// malformed encoded words are kept as plain text.
    #[must_use]
    pub fn get_unstructured(&self, value: &str) -> TokenList {
        let mut builder = UnstructuredBuilder::default();
        let mut value = value;
        while !value.is_empty() {
            let (word, ws, after) = split_wsp(value);
            if word.is_empty() {
                builder.pending_ws.push_str(ws);
                value = after;
            } else if let Some((text, remainder, defects)) = decode_encoded_word_run(value) {
                builder.list().extend_defects(defects);
                builder.push_text(&text);
                // blanks after the run join any trailing blanks of the text
                let (_, ws, after) = split_wsp(remainder);
                builder.pending_ws.push_str(ws);
                value = after;
            } else {
                builder.push_word(word);
                builder.pending_ws = ws.to_string();
                value = after;
            }
        }
        builder.finish()
    }

    /// Parses folding whitespace.
    #[must_use]
    pub fn get_fws<'a>(&self, value: &'a str) -> (Terminal, &'a str) {
        let rest = value.trim_start();
        let ws = &value[..value.len() - rest.len()];
        (Terminal::whitespace(ws, TokenKind::Fws), rest)
    }

    /// Parses comment text up to a blank or parenthesis.
    #[must_use]
    pub fn get_qp_ctext<'a>(&self, value: &'a str) -> (Terminal, &'a str) {
        let (text, rest, _) = get_ptext_to_endchars(value, &['(', ')']);
        let mut ptext = Terminal::whitespace(text, TokenKind::Ptext);
        validate_xtext(&mut ptext);
        (ptext, rest)
    }

    /// Parses quoted-string content up to a blank or `"`.
    #[must_use]
    pub fn get_qcontent<'a>(&self, value: &'a str) -> (Terminal, &'a str) {
        let (text, rest, _) = get_ptext_to_endchars(value, &['"']);
        let mut ptext = Terminal::new(text, TokenKind::Ptext);
        validate_xtext(&mut ptext);
        (ptext, rest)
    }

    /// Parses the longest run of atom characters.
    pub fn get_atext<'a>(&self, value: &'a str) -> ParseResult<'a, Terminal> {
        let end = value.find(is_atom_end).unwrap_or(value.len());
        if end == 0 {
            return Err(ParseError::new(format!("expected atext but found '{value}'")));
        }
        let mut atext = Terminal::new(&value[..end], TokenKind::Atext);
        validate_xtext(&mut atext);
        Ok((atext, &value[end..]))
    }

    /// Parses `"..."` without surrounding CFWS.
    ///
    /// A missing closing quote is a defect, not a failure.
    pub fn get_bare_quoted_string<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        if first(value) != Some('"') {
            return Err(ParseError::new(format!("expected '\"' but found '{value}'")));
        }
        let mut bare = TokenList::new(TokenKind::BareQuotedString);
        let mut value = &value[1..];
        while let Some(ch) = first(value) {
            if ch == '"' {
                break;
            }
            let (token, after): (Token, &str) = if is_wsp(ch) {
                let (fws, after) = self.get_fws(value);
                (fws.into(), after)
            } else {
                let (qcontent, after) = self.get_qcontent(value);
                (qcontent.into(), after)
            };
            bare.push(token);
            value = after;
        }
        if value.is_empty() {
            bare.push_defect(Defect::invalid("end of header inside quoted string"));
            return Ok((bare, value));
        }
        Ok((bare, &value[1..]))
    }

    /// Parses a parenthesised comment, which may nest.
    pub fn get_comment<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        if first(value) != Some('(') {
            return Err(ParseError::new(format!("expected '(' but found '{value}'")));
        }
        Ok(self.comment_at(value, 1))
    }

    /// `value` starts with `(`.
    fn comment_at<'a>(&self, value: &'a str, depth: usize) -> (TokenList, &'a str) {
        if depth > self.max_comment_depth {
            tracing::debug!(depth, "comment nesting limit reached");
            return flat_comment(value);
        }
        let mut comment = TokenList::new(TokenKind::Comment);
        let mut value = &value[1..];
        while let Some(ch) = first(value) {
            if ch == ')' {
                break;
            }
            let (token, after): (Token, &str) = if is_wsp(ch) {
                let (fws, after) = self.get_fws(value);
                (fws.into(), after)
            } else if ch == '(' {
                let (nested, after) = self.comment_at(value, depth + 1);
                (nested.into(), after)
            } else {
                let (ctext, after) = self.get_qp_ctext(value);
                (ctext.into(), after)
            };
            comment.push(token);
            value = after;
        }
        if value.is_empty() {
            comment.push_defect(Defect::invalid("end of header inside comment"));
            return (comment, value);
        }
        (comment, &value[1..])
    }

    /// Parses any mix of blanks and comments. May consume nothing.
    #[must_use]
    pub fn get_cfws<'a>(&self, value: &'a str) -> (TokenList, &'a str) {
        let mut cfws = TokenList::new(TokenKind::Cfws);
        let mut value = value;
        while let Some(ch) = first(value) {
            if is_wsp(ch) {
                let (fws, after) = self.get_fws(value);
                cfws.push(fws);
                value = after;
            } else if ch == '(' {
                let (comment, after) = self.comment_at(value, 1);
                cfws.push(comment);
                value = after;
            } else {
                break;
            }
        }
        (cfws, value)
    }

    fn leading_cfws<'a>(&self, value: &'a str) -> (Option<TokenList>, &'a str) {
        if starts_with_cfws(value) {
            let (cfws, value) = self.get_cfws(value);
            (Some(cfws), value)
        } else {
            (None, value)
        }
    }

    fn push_trailing_cfws<'a>(&self, list: &mut TokenList, value: &'a str) -> &'a str {
        if starts_with_cfws(value) {
            let (cfws, value) = self.get_cfws(value);
            list.push(cfws);
            value
        } else {
            value
        }
    }

    /// `[CFWS] bare-quoted-string [CFWS]`
    pub fn get_quoted_string<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut quoted = TokenList::new(TokenKind::QuotedString);
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = leader {
            quoted.push(leader);
        }
        let (bare, value) = self.get_bare_quoted_string(value)?;
        quoted.push(bare);
        let value = self.push_trailing_cfws(&mut quoted, value);
        Ok((quoted, value))
    }

    /// `[CFWS] 1*atext [CFWS]`
    pub fn get_atom<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut atom = TokenList::new(TokenKind::Atom);
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = leader {
            atom.push(leader);
        }
        if first(value).is_some_and(is_atom_end) {
            return Err(ParseError::new(format!("expected atom but found '{value}'")));
        }
        let (atext, value) = match decode_encoded_atext(value) {
            Some(decoded) => decoded,
            None => self.get_atext(value)?,
        };
        atom.push(atext);
        let value = self.push_trailing_cfws(&mut atom, value);
        Ok((atom, value))
    }

    /// `1*atext *("." 1*atext)` with no CFWS anywhere.
    pub fn get_dot_atom_text<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut dot_atom_text = TokenList::new(TokenKind::DotAtomText);
        if first(value).is_none_or(is_atom_end) {
            return Err(ParseError::new(format!(
                "expected atom at start of dot-atom-text but found '{value}'"
            )));
        }
        let mut value = value;
        while first(value).is_some_and(|ch| !is_atom_end(ch)) {
            let (atext, after) = self.get_atext(value)?;
            dot_atom_text.push(atext);
            value = after;
            if first(value) == Some('.') {
                dot_atom_text.push(Terminal::new(".", TokenKind::Dot));
                value = &value[1..];
            }
        }
        if dot_atom_text
            .children()
            .last()
            .is_some_and(|last| last.kind() == TokenKind::Dot)
        {
            return Err(ParseError::new(format!(
                "expected atom at end of dot-atom-text but found '.{value}'"
            )));
        }
        Ok((dot_atom_text, value))
    }

    /// `[CFWS] dot-atom-text [CFWS]`
    pub fn get_dot_atom<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut dot_atom = TokenList::new(TokenKind::DotAtom);
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = leader {
            dot_atom.push(leader);
        }
        let (text, value) = self.get_dot_atom_text(value)?;
        dot_atom.push(text);
        let value = self.push_trailing_cfws(&mut dot_atom, value);
        Ok((dot_atom, value))
    }

    /// `atom / quoted-string`
    ///
    /// Leading CFWS is parsed once and attached to whichever alternative
    /// matched.
    pub fn get_word<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let (leader, value) = self.leading_cfws(value);
        let (mut word, value) = match first(value) {
            None => {
                return Err(ParseError::new("expected word but found end of input"));
            }
            Some('"') => self.get_quoted_string(value)?,
            Some(ch) if is_special(ch) => {
                return Err(ParseError::new(format!(
                    "expected word but found '{value}'"
                )));
            }
            Some(_) => self.get_atom(value)?,
        };
        if let Some(leader) = leader {
            word.prepend(leader);
        }
        Ok((word, value))
    }

    /// `1*word / obs-phrase`
    ///
    /// Obsolete forms (periods between words, bare comments) are accepted
    /// with defects.
    pub fn get_phrase<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut phrase = TokenList::new(TokenKind::Phrase);
        let mut value = match self.get_word(value) {
            Ok((word, after)) => {
                phrase.push(word);
                after
            }
            Err(_) => {
                phrase.push_defect(Defect::invalid("phrase does not start with word"));
                value
            }
        };
        while let Some(ch) = first(value) {
            if is_phrase_end(ch) {
                break;
            }
            if ch == '.' {
                phrase.push(Terminal::new(".", TokenKind::Dot));
                phrase.push_defect(Defect::obsolete("period in 'phrase'"));
                value = &value[1..];
                continue;
            }
            match self.get_word(value) {
                Ok((word, after)) => {
                    phrase.push(word);
                    value = after;
                }
                Err(err) => {
                    if !starts_with_cfws(value) {
                        return Err(err);
                    }
                    let (cfws, after) = self.get_cfws(value);
                    phrase.push(cfws);
                    phrase.push_defect(Defect::obsolete("comment found without atom"));
                    value = after;
                }
            }
        }
        Ok((phrase, value))
    }

    /// `dot-atom / quoted-string / obs-local-part`
    pub fn get_local_part<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut local_part = TokenList::new(TokenKind::LocalPart);
        let (leader, value) = self.leading_cfws(value);
        if value.is_empty() {
            return Err(ParseError::new("expected local-part but found end of input"));
        }
        let (mut token, mut value) = match self.get_dot_atom(value) {
            Ok(parsed) => parsed,
            Err(_) => self.get_word(value)?,
        };
        if let Some(leader) = leader {
            token.prepend(leader);
        }

        let continues_obsolete =
            |value: &str| first(value).is_some_and(|ch| ch == '\\' || !is_phrase_end(ch));
        if !continues_obsolete(value) {
            local_part.push(token);
            return Ok((local_part, value));
        }

        let mut obs = TokenList::new(TokenKind::ObsLocalPart);
        if token.kind() == TokenKind::DotAtom {
            obs.extend(token.into_children());
        } else {
            obs.push(token);
        }
        while continues_obsolete(value) {
            match first(value) {
                Some('.') => {
                    obs.push(Terminal::new(".", TokenKind::Dot));
                    value = &value[1..];
                }
                Some('\\') => {
                    obs.push(Terminal::new("\\", TokenKind::MisplacedSpecial));
                    obs.push_defect(Defect::invalid(
                        "'\\' character outside of quoted-string/ccontent",
                    ));
                    value = &value[1..];
                    continue;
                }
                _ => obs.push_defect(Defect::invalid("missing '.' between words")),
            }
            let (word, after) = self.get_word(value)?;
            obs.push(word);
            value = after;
        }

        if obs.defects().is_empty() {
            local_part.push_defect(Defect::obsolete(
                "local-part is not a dot-atom (contains CFWS)",
            ));
        } else {
            local_part.push_defect(Defect::invalid(
                "local-part is not dot-atom, quoted-string, or obs-local-part",
            ));
            obs.mark_invalid();
        }
        local_part.push(obs);
        Ok((local_part, value))
    }

    /// Parses domain-literal text up to a blank or bracket.
    #[must_use]
    pub fn get_dtext<'a>(&self, value: &'a str) -> (Terminal, &'a str) {
        let (text, rest, had_qp) = get_ptext_to_endchars(value, &['[', ']']);
        let mut ptext = Terminal::new(text, TokenKind::Ptext);
        if had_qp {
            ptext.push_defect(Defect::obsolete("quoted printable found in domain-literal"));
        }
        validate_xtext(&mut ptext);
        (ptext, rest)
    }

    /// `[CFWS] "[" *([FWS] dtext) [FWS] "]" [CFWS]`
    pub fn get_domain_literal<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut literal = TokenList::new(TokenKind::DomainLiteral);
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = leader {
            literal.push(leader);
        }
        if first(value) != Some('[') {
            return Err(ParseError::new(format!(
                "expected '[' at start of domain-literal but found '{value}'"
            )));
        }
        literal.push(Terminal::new("[", TokenKind::DomainLiteralStart));
        let mut value = &value[1..];

        let end_early = |literal: &mut TokenList| {
            literal.push_defect(Defect::invalid("end of input inside domain-literal"));
            literal.push(Terminal::new("]", TokenKind::DomainLiteralEnd));
        };

        if value.is_empty() {
            end_early(&mut literal);
            return Ok((literal, value));
        }
        if starts_with_wsp(value) {
            let (fws, after) = self.get_fws(value);
            literal.push(fws);
            value = after;
        }
        let (dtext, after) = self.get_dtext(value);
        literal.push(dtext);
        value = after;
        if value.is_empty() {
            end_early(&mut literal);
            return Ok((literal, value));
        }
        if starts_with_wsp(value) {
            let (fws, after) = self.get_fws(value);
            literal.push(fws);
            value = after;
        }
        if value.is_empty() {
            end_early(&mut literal);
            return Ok((literal, value));
        }
        if first(value) != Some(']') {
            return Err(ParseError::new(format!(
                "expected ']' at end of domain-literal but found '{value}'"
            )));
        }
        literal.push(Terminal::new("]", TokenKind::DomainLiteralEnd));
        let value = self.push_trailing_cfws(&mut literal, &value[1..]);
        Ok((literal, value))
    }

    /// `dot-atom / domain-literal / obs-domain`
    pub fn get_domain<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut domain = TokenList::new(TokenKind::Domain);
        let (leader, value) = self.leading_cfws(value);
        if value.is_empty() {
            return Err(ParseError::new("expected domain but found end of input"));
        }
        if first(value) == Some('[') {
            let (mut literal, value) = self.get_domain_literal(value)?;
            if let Some(leader) = leader {
                literal.prepend(leader);
            }
            domain.push(literal);
            return Ok((domain, value));
        }
        let (mut token, mut value) = match self.get_dot_atom(value) {
            Ok(parsed) => parsed,
            Err(_) => self.get_atom(value)?,
        };
        if let Some(leader) = leader {
            token.prepend(leader);
        }
        if first(value) != Some('.') {
            domain.push(token);
            return Ok((domain, value));
        }

        domain.push_defect(Defect::obsolete("domain is not a dot-atom (contains CFWS)"));
        if token.kind() == TokenKind::DotAtom {
            domain.extend(token.into_children());
        } else {
            domain.push(token);
        }
        while first(value) == Some('.') {
            domain.push(Terminal::new(".", TokenKind::Dot));
            let (atom, after) = self.get_atom(&value[1..])?;
            domain.push(atom);
            value = after;
        }
        Ok((domain, value))
    }

    /// `local-part "@" domain`
    ///
    /// A local part with no `@` after it is accepted with a defect.
    pub fn get_addr_spec<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut addr_spec = TokenList::new(TokenKind::AddrSpec);
        let (local_part, value) = self.get_local_part(value)?;
        addr_spec.push(local_part);
        if first(value) != Some('@') {
            addr_spec.push_defect(Defect::invalid("addr-spec local part with no domain"));
            return Ok((addr_spec, value));
        }
        addr_spec.push(Terminal::new("@", TokenKind::AddressAtSymbol));
        let (domain, value) = self.get_domain(&value[1..])?;
        addr_spec.push(domain);
        Ok((addr_spec, value))
    }

    /// `obs-domain-list ":"`, the source route of RFC 822.
    pub fn get_obs_route<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut route = TokenList::new(TokenKind::ObsRoute);
        let mut value = value;
        while first(value).is_some_and(|ch| ch == ',' || is_wsp(ch) || ch == '(') {
            if starts_with_cfws(value) {
                let (cfws, after) = self.get_cfws(value);
                route.push(cfws);
                value = after;
            } else {
                route.push(Terminal::new(",", TokenKind::ListSeparator));
                value = &value[1..];
            }
        }
        if first(value) != Some('@') {
            return Err(ParseError::new(format!(
                "expected obs-route domain but found '{value}'"
            )));
        }
        route.push(Terminal::new("@", TokenKind::RouteComponentMarker));
        let (domain, after) = self.get_domain(&value[1..])?;
        route.push(domain);
        value = after;
        while first(value) == Some(',') {
            route.push(Terminal::new(",", TokenKind::ListSeparator));
            value = &value[1..];
            if value.is_empty() {
                break;
            }
            if starts_with_cfws(value) {
                let (cfws, after) = self.get_cfws(value);
                route.push(cfws);
                value = after;
            }
            if first(value) == Some('@') {
                route.push(Terminal::new("@", TokenKind::RouteComponentMarker));
                let (domain, after) = self.get_domain(&value[1..])?;
                route.push(domain);
                value = after;
            }
        }
        if first(value) != Some(':') {
            return Err(ParseError::new(format!(
                "expected ':' marking end of obs-route but found '{value}'"
            )));
        }
        route.push(Terminal::new(":", TokenKind::EndOfObsRouteMarker));
        Ok((route, &value[1..]))
    }

    /// `[CFWS] "<" [obs-route] addr-spec ">" [CFWS]`
    ///
    /// A missing `>` is a defect; the closing terminal is always present in
    /// the tree.
    pub fn get_angle_addr<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut angle = TokenList::new(TokenKind::AngleAddr);
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = leader {
            angle.push(leader);
        }
        if first(value) != Some('<') {
            return Err(ParseError::new(format!(
                "expected angle-addr but found '{value}'"
            )));
        }
        angle.push(Terminal::new("<", TokenKind::AngleAddrStart));
        let value = &value[1..];
        let mut value = match self.get_addr_spec(value) {
            Ok((addr_spec, after)) => {
                angle.push(addr_spec);
                after
            }
            Err(_) => {
                let (route, after) = self.get_obs_route(value).map_err(|_| {
                    ParseError::new(format!("expected addr-spec or obs-route but found '{value}'"))
                })?;
                angle.push_defect(Defect::obsolete(
                    "obsolete route specification in angle-addr",
                ));
                angle.push(route);
                let (addr_spec, after) = self.get_addr_spec(after)?;
                angle.push(addr_spec);
                after
            }
        };
        if first(value) == Some('>') {
            value = &value[1..];
        } else {
            angle.push_defect(Defect::invalid("missing trailing '>' on angle-addr"));
        }
        angle.push(Terminal::new(">", TokenKind::AngleAddrEnd));
        let value = self.push_trailing_cfws(&mut angle, value);
        Ok((angle, value))
    }

    /// `phrase`, retyped as a display name.
    pub fn get_display_name<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let (phrase, value) = self.get_phrase(value)?;
        let defects = phrase.defects().to_vec();
        let mut display_name =
            TokenList::with_children(TokenKind::DisplayName, phrase.into_children());
        display_name.extend_defects(defects);
        Ok((display_name, value))
    }

    /// `[display-name] angle-addr`
    pub fn get_name_addr<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut name_addr = TokenList::new(TokenKind::NameAddr);
        let (mut leader, mut value) = self.leading_cfws(value);
        if leader.is_some() && value.is_empty() {
            return Err(ParseError::new("expected name-addr but found end of input"));
        }
        if first(value) != Some('<') {
            if first(value).is_none_or(is_phrase_end) {
                return Err(ParseError::new(format!(
                    "expected name-addr but found '{value}'"
                )));
            }
            let (mut display_name, after) = self.get_display_name(value)?;
            if after.is_empty() {
                return Err(ParseError::new(format!(
                    "expected name-addr but found '{display_name}'"
                )));
            }
            if let Some(leader) = leader.take() {
                match display_name.first_mut().and_then(Token::as_list_mut) {
                    Some(first_word) => first_word.prepend(leader),
                    None => display_name.prepend(leader),
                }
            }
            name_addr.push(display_name);
            value = after;
        }
        let (mut angle, value) = self.get_angle_addr(value)?;
        if let Some(leader) = leader {
            angle.prepend(leader);
        }
        name_addr.push(angle);
        Ok((name_addr, value))
    }

    /// `name-addr / addr-spec`
    ///
    /// A mailbox whose subtree holds an invalid-header defect is marked
    /// invalid but kept.
    pub fn get_mailbox<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let (token, value) = match self.get_name_addr(value) {
            Ok(parsed) => parsed,
            Err(_) => self
                .get_addr_spec(value)
                .map_err(|_| ParseError::new(format!("expected mailbox but found '{value}'")))?,
        };
        let mut mailbox = TokenList::new(TokenKind::Mailbox);
        if token.all_defects().iter().any(|d| d.is_invalid_header()) {
            mailbox.mark_invalid();
        }
        mailbox.push(token);
        Ok((mailbox, value))
    }

    /// Consumes text up to one of `endchars` as an `invalid-mailbox`.
    ///
    /// Never fails and always consumes at least one character of non-empty
    /// input that does not start with an endchar.
    #[must_use]
    pub fn get_invalid_mailbox<'a>(&self, value: &'a str, endchars: &[char]) -> (TokenList, &'a str) {
        let mut invalid = TokenList::new(TokenKind::InvalidMailbox);
        let mut value = value;
        while let Some(ch) = first(value) {
            if endchars.contains(&ch) {
                break;
            }
            if !is_phrase_end(ch) {
                if let Ok((phrase, after)) = self.get_phrase(value) {
                    if after.len() < value.len() {
                        invalid.push(phrase);
                        value = after;
                        continue;
                    }
                }
            }
            invalid.push(Terminal::new(ch.to_string(), TokenKind::MisplacedSpecial));
            value = rest(value);
        }
        (invalid, value)
    }

    /// `mailbox *("," mailbox)` with fault isolation.
    ///
    /// Stops at `;` or end of input. Entries that cannot be parsed become
    /// `invalid-mailbox` nodes; empty entries are obsolete syntax.
    #[must_use]
    pub fn get_mailbox_list<'a>(&self, value: &'a str) -> (TokenList, &'a str) {
        const ENDS: &[char] = &[',', ';'];
        let mut list = TokenList::new(TokenKind::MailboxList);
        let mut value = value;
        while first(value).is_some_and(|ch| ch != ';') {
            match self.get_mailbox(value) {
                Ok((mailbox, after)) => {
                    list.push(mailbox);
                    value = after;
                }
                Err(_) => {
                    let (leader, after) = self.leading_cfws(value);
                    value = after;
                    if let Some(leader) = leader {
                        if first(value).is_none_or(|ch| ENDS.contains(&ch)) {
                            list.push(leader);
                            list.push_defect(Defect::obsolete("empty element in mailbox-list"));
                        } else {
                            let (mut invalid, after) = self.get_invalid_mailbox(value, ENDS);
                            invalid.prepend(leader);
                            list.push(invalid);
                            list.push_defect(Defect::invalid("invalid mailbox in mailbox-list"));
                            value = after;
                        }
                    } else if first(value) == Some(',') {
                        list.push_defect(Defect::obsolete("empty element in mailbox-list"));
                    } else {
                        let (invalid, after) = self.get_invalid_mailbox(value, ENDS);
                        list.push(invalid);
                        list.push_defect(Defect::invalid("invalid mailbox in mailbox-list"));
                        value = after;
                    }
                }
            }
            if first(value).is_some_and(|ch| !ENDS.contains(&ch)) {
                tracing::trace!(remaining = value, "trailing junk after mailbox");
                let (invalid, after) = self.get_invalid_mailbox(value, ENDS);
                match list.last_mut().and_then(Token::as_list_mut) {
                    Some(last) => {
                        last.mark_invalid();
                        last.extend(invalid.into_children());
                    }
                    None => list.push(invalid),
                }
                list.push_defect(Defect::invalid("invalid mailbox in mailbox-list"));
                value = after;
            }
            if first(value) == Some(',') {
                list.push(Terminal::new(",", TokenKind::ListSeparator));
                value = &value[1..];
            }
        }
        (list, value)
    }

    /// `[mailbox-list / CFWS / obs-group-list]`
    #[must_use]
    pub fn get_group_list<'a>(&self, value: &'a str) -> (TokenList, &'a str) {
        let mut group_list = TokenList::new(TokenKind::GroupList);
        if value.is_empty() {
            group_list.push_defect(Defect::invalid("end of header before group-list"));
            return (group_list, value);
        }
        let (leader, value) = self.leading_cfws(value);
        if let Some(leader) = &leader {
            if value.is_empty() {
                group_list.push(leader.clone());
                group_list.push_defect(Defect::invalid("end of header in group-list"));
                return (group_list, value);
            }
            if first(value) == Some(';') {
                group_list.push(leader.clone());
                return (group_list, value);
            }
        }
        let (mut mailbox_list, value) = self.get_mailbox_list(value);
        if mailbox_list.mailboxes().is_empty() {
            if let Some(leader) = leader {
                group_list.push(leader);
            }
            let defects = mailbox_list.defects().to_vec();
            group_list.extend(mailbox_list.into_children());
            group_list.extend_defects(defects);
            group_list.push_defect(Defect::obsolete("group-list with empty entries"));
            return (group_list, value);
        }
        if let Some(leader) = leader {
            mailbox_list.prepend(leader);
        }
        group_list.push(mailbox_list);
        (group_list, value)
    }

    /// `display-name ":" [group-list] ";" [CFWS]`
    pub fn get_group<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let mut group = TokenList::new(TokenKind::Group);
        let (display_name, value) = self.get_display_name(value)?;
        if first(value) != Some(':') {
            return Err(ParseError::new(format!(
                "expected ':' at end of group display name but found '{value}'"
            )));
        }
        group.push(display_name);
        group.push(Terminal::new(":", TokenKind::GroupDisplayNameTerminator));
        let value = &value[1..];
        if first(value) == Some(';') {
            group.push(Terminal::new(";", TokenKind::GroupTerminator));
            return Ok((group, &value[1..]));
        }
        let (group_list, value) = self.get_group_list(value);
        group.push(group_list);
        if value.is_empty() {
            group.push_defect(Defect::invalid("end of header in group"));
            return Ok((group, value));
        }
        if first(value) != Some(';') {
            return Err(ParseError::new(format!(
                "expected ';' at end of group but found '{value}'"
            )));
        }
        group.push(Terminal::new(";", TokenKind::GroupTerminator));
        let value = self.push_trailing_cfws(&mut group, &value[1..]);
        Ok((group, value))
    }

    /// `mailbox / group`
    pub fn get_address<'a>(&self, value: &'a str) -> ParseResult<'a, TokenList> {
        let (token, value) = match self.get_group(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::trace!(%err, "not a group, trying mailbox");
                self.get_mailbox(value).map_err(|_| {
                    ParseError::new(format!("expected address but found '{value}'"))
                })?
            }
        };
        Ok((wrap(TokenKind::Address, token), value))
    }

    /// `address *("," address)` with fault isolation.
    ///
    /// Never fails and consumes the whole input.
    #[must_use]
    pub fn get_address_list<'a>(&self, value: &'a str) -> (TokenList, &'a str) {
        const ENDS: &[char] = &[','];
        let mut list = TokenList::new(TokenKind::AddressList);
        let mut value = value;
        while !value.is_empty() {
            match self.get_address(value) {
                Ok((address, after)) => {
                    list.push(address);
                    value = after;
                }
                Err(_) => {
                    let (leader, after) = self.leading_cfws(value);
                    value = after;
                    if let Some(leader) = leader {
                        if first(value).is_none_or(|ch| ch == ',') {
                            list.push(leader);
                            list.push_defect(Defect::obsolete(
                                "address-list entry with no content",
                            ));
                        } else {
                            let (mut invalid, after) = self.get_invalid_mailbox(value, ENDS);
                            invalid.prepend(leader);
                            list.push(wrap(TokenKind::Address, invalid));
                            list.push_defect(Defect::invalid("invalid address in address-list"));
                            value = after;
                        }
                    } else if first(value) == Some(',') {
                        list.push_defect(Defect::obsolete("empty element in address-list"));
                    } else {
                        let (invalid, after) = self.get_invalid_mailbox(value, ENDS);
                        list.push(wrap(TokenKind::Address, invalid));
                        list.push_defect(Defect::invalid("invalid address in address-list"));
                        value = after;
                    }
                }
            }
            if first(value).is_some_and(|ch| ch != ',') {
                tracing::trace!(remaining = value, "trailing junk after address");
                let (invalid, after) = self.get_invalid_mailbox(value, ENDS);
                let target = list
                    .last_mut()
                    .and_then(Token::as_list_mut)
                    .and_then(TokenList::first_mut)
                    .and_then(Token::as_list_mut);
                match target {
                    Some(entry) => {
                        entry.mark_invalid();
                        entry.extend(invalid.into_children());
                    }
                    None => list.push(wrap(TokenKind::Address, invalid)),
                }
                list.push_defect(Defect::invalid("invalid address in address-list"));
                value = after;
            }
            if first(value) == Some(',') {
                list.push(Terminal::new(",", TokenKind::ListSeparator));
                value = &value[1..];
            }
        }
        (list, value)
    }
}

/// Consumes a balanced comment as flat text once the nesting limit is hit.
fn flat_comment(value: &str) -> (TokenList, &str) {
    let mut depth = 0_usize;
    let mut escape = false;
    let mut text = String::new();
    for (pos, ch) in value.char_indices() {
        if escape {
            escape = false;
            text.push(ch);
            continue;
        }
        match ch {
            '\\' => escape = true,
            '(' => {
                depth += 1;
                if depth > 1 {
                    text.push(ch);
                }
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let mut comment =
                        wrap(TokenKind::Comment, Terminal::whitespace(text, TokenKind::Ptext));
                    comment.push_defect(Defect::invalid("comment nesting too deep"));
                    return (comment, &value[pos + 1..]);
                }
                text.push(ch);
            }
            _ => text.push(ch),
        }
    }
    let mut comment = wrap(TokenKind::Comment, Terminal::whitespace(text, TokenKind::Ptext));
    comment.push_defect(Defect::invalid("comment nesting too deep"));
    comment.push_defect(Defect::invalid("end of header inside comment"));
    (comment, "")
}

/// Parses an unstructured value with the default parser.
#[must_use]
pub fn get_unstructured(value: &str) -> TokenList {
    Parser::default().get_unstructured(value)
}

/// Parses an address list with the default parser.
#[must_use]
pub fn get_address_list(value: &str) -> (TokenList, &str) {
    Parser::default().get_address_list(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parser() -> Parser {
        Parser::default()
    }

    fn details(list: &TokenList) -> Vec<String> {
        list.all_defects()
            .iter()
            .map(|defect| defect.detail().to_string())
            .collect()
    }

    #[test]
    fn test_unstructured_keeps_whitespace() {
        let list = get_unstructured("  hello   world  ");
        assert_eq!(list.to_string(), "  hello   world  ");
        assert_eq!(list.value(), " hello world ");
        assert!(list.all_defects().is_empty());
    }

    #[test]
    fn test_unstructured_decodes_encoded_word_runs() {
        let list = get_unstructured("=?utf-8?q?foo?= =?utf-8?q?bar?= baz");
        assert_eq!(list.to_string(), "foobar baz");

        let list = get_unstructured("Hello =?utf-8?q?W=C3=B6rld?=");
        assert_eq!(list.to_string(), "Hello Wörld");
    }

    #[test]
    fn test_unstructured_keeps_malformed_encoded_word() {
        let list = get_unstructured("=?utf-8?x?abc?= tail");
        assert_eq!(list.to_string(), "=?utf-8?x?abc?= tail");
        assert!(list.all_defects().is_empty());
    }

    #[test]
    fn test_unstructured_collects_decoding_defects() {
        let list = get_unstructured("=?us-ascii?q?=ACx?=");
        assert_eq!(list.to_string(), "\u{FFFD}x");
        let kinds: Vec<DefectKind> = list.all_defects().iter().map(|d| d.kind()).collect();
        assert_eq!(kinds, vec![DefectKind::UndecodableBytes]);
    }

    #[test]
    fn test_unstructured_non_printable() {
        let list = get_unstructured("a\x01b");
        assert_eq!(list.all_defects()[0].kind(), DefectKind::NonPrintable);
    }

    #[test]
    fn test_unterminated_quoted_string() {
        let (bare, rest) = parser().get_bare_quoted_string("\"abc").unwrap();
        assert_eq!(rest, "");
        assert_eq!(bare.value(), "abc");
        assert_eq!(details(&bare), vec!["end of header inside quoted string"]);
    }

    #[test]
    fn test_nested_comment() {
        let (comment, rest) = parser().get_comment("(a (b) c) rest").unwrap();
        assert_eq!(rest, " rest");
        assert_eq!(comment.to_string(), "(a (b) c)");
        assert_eq!(comment.content().as_deref(), Some("a (b) c"));
    }

    #[test]
    fn test_unterminated_comment() {
        let (comment, rest) = parser().get_comment("(open").unwrap();
        assert_eq!(rest, "");
        assert_eq!(details(&comment), vec!["end of header inside comment"]);
    }

    #[test]
    fn test_comment_depth_limit() {
        let (comment, rest) = Parser::new(2).get_comment("(a(b(c(d)))) x").unwrap();
        assert_eq!(rest, " x");
        assert!(details(&comment).contains(&"comment nesting too deep".to_string()));
    }

    #[test]
    fn test_deeply_nested_comment_does_not_recurse() {
        let value = format!("{}{}", "(".repeat(10_000), ")".repeat(10_000));
        let (comment, rest) = parser().get_comment(&value).unwrap();
        assert_eq!(rest, "");
        assert_eq!(comment.kind(), TokenKind::Comment);
    }

    #[test]
    fn test_dot_atom_text() {
        assert!(parser().get_dot_atom_text("a.b.").is_err());
        assert!(parser().get_dot_atom_text(".a").is_err());
        let (text, rest) = parser().get_dot_atom_text("a.b c").unwrap();
        assert_eq!(text.to_string(), "a.b");
        assert_eq!(rest, " c");
    }

    #[test]
    fn test_word_rejects_specials() {
        assert!(parser().get_word("@x").is_err());
        assert!(parser().get_word("   ").is_err());
        let (word, rest) = parser().get_word(" (c) \"q\" x").unwrap();
        assert_eq!(word.kind(), TokenKind::QuotedString);
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_atom_decodes_encoded_words() {
        let (phrase, rest) = parser()
            .get_phrase("=?utf-8?q?J=C3=B6hn?= =?utf-8?q?_D=C5=93?= <jd@example.com>")
            .unwrap();
        assert_eq!(rest, "<jd@example.com>");
        assert_eq!(phrase.value(), "Jöhn Dœ ");
        assert!(phrase.all_defects().is_empty());

        let (phrase, rest) = parser().get_phrase("=?utf-8?q?Ann?=<a@b>").unwrap();
        assert_eq!(rest, "<a@b>");
        assert_eq!(phrase.value(), "Ann");

        let (atom, rest) = parser().get_atom("=?utf-8?q?a?=b c").unwrap();
        assert_eq!(atom.value(), "=?utf-8?q?a?=b ");
        assert_eq!(rest, "c");
    }

    #[test]
    fn test_phrase_with_period() {
        let (phrase, rest) = parser().get_phrase("John Q. Public <x@y>").unwrap();
        assert_eq!(rest, "<x@y>");
        assert_eq!(phrase.defects()[0].kind(), DefectKind::ObsoleteHeader);
        assert_eq!(phrase.defects()[0].detail(), "period in 'phrase'");
        assert_eq!(phrase.value(), "John Q. Public ");
    }

    #[test]
    fn test_addr_spec_without_domain() {
        let (addr_spec, rest) = parser().get_addr_spec("fred").unwrap();
        assert_eq!(rest, "");
        assert_eq!(details(&addr_spec), vec!["addr-spec local part with no domain"]);
        assert_eq!(addr_spec.addr_spec().as_deref(), Some("fred"));
    }

    #[test]
    fn test_obs_local_part_missing_dot() {
        let (local_part, rest) = parser().get_local_part("fred bloggs@x").unwrap();
        assert_eq!(rest, "@x");
        assert!(local_part.defects()[0].is_invalid_header());
        assert_eq!(
            local_part.children()[0].token_type(),
            "invalid-obs-local-part"
        );
        assert_eq!(local_part.value(), "fred bloggs");
    }

    #[test]
    fn test_obs_local_part_with_comment() {
        let (local_part, rest) = parser().get_local_part("fred.(c)bloggs@x").unwrap();
        assert_eq!(rest, "@x");
        assert_eq!(local_part.defects()[0].kind(), DefectKind::ObsoleteHeader);
        assert_eq!(local_part.children()[0].token_type(), "obs-local-part");
    }

    #[test]
    fn test_stray_backslash_in_local_part() {
        let (local_part, _) = parser().get_local_part("a\\b@x").unwrap();
        let obs = local_part.children()[0].as_list().unwrap();
        assert!(obs.children().iter().any(|c| c.kind() == TokenKind::MisplacedSpecial));
        assert!(local_part.all_defects().iter().any(|d| d.is_invalid_header()));
    }

    #[test]
    fn test_domain_literal() {
        let (domain, rest) = parser().get_domain("[127.0.0.1]").unwrap();
        assert_eq!(rest, "");
        assert_eq!(domain.domain().as_deref(), Some("[127.0.0.1]"));

        let (literal, rest) = parser().get_domain_literal("[1.2.3.4").unwrap();
        assert_eq!(rest, "");
        assert_eq!(literal.to_string(), "[1.2.3.4]");
        assert_eq!(details(&literal), vec!["end of input inside domain-literal"]);
    }

    #[test]
    fn test_obs_domain() {
        let (domain, rest) = parser().get_domain("example. com").unwrap();
        assert_eq!(rest, "");
        assert_eq!(domain.domain().as_deref(), Some("example.com"));
        assert_eq!(domain.defects()[0].kind(), DefectKind::ObsoleteHeader);
    }

    #[test]
    fn test_angle_addr_missing_close() {
        let (angle, rest) = parser().get_angle_addr("<a@b").unwrap();
        assert_eq!(rest, "");
        assert_eq!(angle.to_string(), "<a@b>");
        assert_eq!(details(&angle), vec!["missing trailing '>' on angle-addr"]);
    }

    #[test]
    fn test_address_list_isolates_bad_entry() {
        let (list, rest) = get_address_list("Fred <a@b.org>, !!!, x@y.com");
        assert_eq!(rest, "");
        assert_eq!(list.addresses().len(), 3);
        assert_eq!(list.mailboxes().len(), 2);
        assert_eq!(details(&list), vec!["addr-spec local part with no domain"]);
    }

    #[test]
    fn test_address_list_empty_element() {
        let (list, _) = get_address_list("a@b.com,,c@d.com");
        assert_eq!(list.addresses().len(), 2);
        assert_eq!(list.defects()[0].detail(), "empty element in address-list");
        assert_eq!(list.defects()[0].kind(), DefectKind::ObsoleteHeader);
    }

    #[test]
    fn test_address_list_trailing_junk() {
        let (list, _) = get_address_list("a@b.com junk, c@d.com");
        assert_eq!(list.to_string(), "a@b.com junk, c@d.com");
        assert_eq!(list.addresses().len(), 2);
        assert_eq!(list.mailboxes().len(), 1);
        assert_eq!(list.all_mailboxes()[0].token_type(), "invalid-mailbox");
        assert_eq!(list.defects()[0].detail(), "invalid address in address-list");
    }

    #[test]
    fn test_null_angle_addr_becomes_invalid_mailbox() {
        let (list, _) = get_address_list("<>");
        let invalid: Vec<_> = list.all_defects().into_iter().filter(|d| d.is_invalid_header()).collect();
        assert_eq!(invalid.len(), 1);
        assert_eq!(list.all_mailboxes()[0].kind(), TokenKind::InvalidMailbox);
        assert!(list.mailboxes().is_empty());
    }

    #[test]
    fn test_empty_group() {
        let (list, _) = get_address_list("undisclosed-recipients:;");
        let addresses = list.addresses();
        assert_eq!(addresses.len(), 1);
        assert_eq!(
            addresses[0].display_name().as_deref(),
            Some("undisclosed-recipients")
        );
        assert!(list.mailboxes().is_empty());
        assert!(list.all_defects().is_empty());
    }

    #[test]
    fn test_unterminated_group() {
        let (list, _) = get_address_list("Friends: a@b.com");
        assert_eq!(list.mailboxes().len(), 1);
        assert_eq!(details(&list), vec!["end of header in group"]);
    }

    #[test]
    fn test_invalid_mailbox_consumes_specials() {
        let (invalid, rest) = parser().get_invalid_mailbox("<<>>,x", &[',']);
        assert_eq!(rest, ",x");
        assert_eq!(invalid.len(), 4);
        assert_eq!(invalid.to_string(), "<<>>");
    }

    #[test]
    fn test_parse_error_converts() {
        let err = parser().get_atom("@").unwrap_err();
        assert!(matches!(Error::from(err), Error::HeaderParse(_)));
    }

    proptest! {
        #[test]
        fn address_list_consumes_everything(value in "\\PC*") {
            let (_, rest) = get_address_list(&value);
            prop_assert!(rest.is_empty());
        }

        #[test]
        fn address_list_of_specials_never_panics(value in "[<>@,:;.\\\\\"\\[\\]() a-z]{0,40}") {
            let (list, rest) = get_address_list(&value);
            prop_assert!(rest.is_empty());
            let _ = list.all_mailboxes().iter().map(|m| m.addr_spec()).count();
        }

        #[test]
        fn unstructured_never_panics(value in "\\PC*") {
            let list = get_unstructured(&value);
            let _ = list.value();
        }
    }
}
