//! Parse tree produced by the header grammar.
//!
//! A tree is made of [`TokenList`] nodes that own their children and
//! [`Terminal`] leaves holding unescaped text. Each node keeps the defects
//! detected while building it; [`Token::all_defects`] gathers the defects
//! of a whole subtree on demand.

use std::fmt;

use crate::defect::Defect;

/// Grammar production or lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Untyped list built while slicing other lists.
    Fragment,
    /// Unstructured header text.
    Unstructured,
    /// Phrase (a sequence of words).
    Phrase,
    /// Comments and folding whitespace.
    Cfws,
    /// Parenthesised comment.
    Comment,
    /// Atom with surrounding CFWS.
    Atom,
    /// Quoted string with surrounding CFWS.
    QuotedString,
    /// The text between the quotes of a quoted string.
    BareQuotedString,
    /// Dot-atom with surrounding CFWS.
    DotAtom,
    /// Dot separated run of atext.
    DotAtomText,
    /// Obsolete local part made of dot separated words.
    ObsLocalPart,
    /// Local part of an addr-spec.
    LocalPart,
    /// Bracketed domain literal.
    DomainLiteral,
    /// Domain of an addr-spec.
    Domain,
    /// `local-part@domain`.
    AddrSpec,
    /// Obsolete source route.
    ObsRoute,
    /// `<addr-spec>`.
    AngleAddr,
    /// Display name of a mailbox or group.
    DisplayName,
    /// Display name followed by an angle address.
    NameAddr,
    /// Mailbox.
    Mailbox,
    /// Unparsable text standing in for a mailbox.
    InvalidMailbox,
    /// Comma separated mailboxes.
    MailboxList,
    /// Mailboxes inside a group.
    GroupList,
    /// `display-name: mailbox-list;`.
    Group,
    /// Mailbox or group.
    Address,
    /// Comma separated addresses.
    AddressList,
    /// Folding whitespace.
    Fws,
    /// Visible text in unstructured values.
    Vtext,
    /// Printable text in comments, quoted strings and domain literals.
    Ptext,
    /// Atom text.
    Atext,
    /// `.`
    Dot,
    /// `,`
    ListSeparator,
    /// `,` or `:` inside an obsolete route.
    RouteComponentMarker,
    /// Special character found where it is not allowed.
    MisplacedSpecial,
    /// `@`
    AddressAtSymbol,
    /// `<`
    AngleAddrStart,
    /// `>`
    AngleAddrEnd,
    /// `[`
    DomainLiteralStart,
    /// `]`
    DomainLiteralEnd,
    /// `:` after a group display name.
    GroupDisplayNameTerminator,
    /// `;` closing a group.
    GroupTerminator,
    /// `:` closing an obsolete route.
    EndOfObsRouteMarker,
}

impl TokenKind {
    /// Returns the grammar name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fragment => "fragment",
            Self::Unstructured => "unstructured",
            Self::Phrase => "phrase",
            Self::Cfws => "cfws",
            Self::Comment => "comment",
            Self::Atom => "atom",
            Self::QuotedString => "quoted-string",
            Self::BareQuotedString => "bare-quoted-string",
            Self::DotAtom => "dot-atom",
            Self::DotAtomText => "dot-atom-text",
            Self::ObsLocalPart => "obs-local-part",
            Self::LocalPart => "local-part",
            Self::DomainLiteral => "domain-literal",
            Self::Domain => "domain",
            Self::AddrSpec => "addr-spec",
            Self::ObsRoute => "obs-route",
            Self::AngleAddr => "angle-addr",
            Self::DisplayName => "display-name",
            Self::NameAddr => "name-addr",
            Self::Mailbox => "mailbox",
            Self::InvalidMailbox => "invalid-mailbox",
            Self::MailboxList => "mailbox-list",
            Self::GroupList => "group-list",
            Self::Group => "group",
            Self::Address => "address",
            Self::AddressList => "address-list",
            Self::Fws => "fws",
            Self::Vtext => "vtext",
            Self::Ptext => "ptext",
            Self::Atext => "atext",
            Self::Dot => "dot",
            Self::ListSeparator => "list-separator",
            Self::RouteComponentMarker => "route-component-marker",
            Self::MisplacedSpecial => "misplaced-special",
            Self::AddressAtSymbol => "address-at-symbol",
            Self::AngleAddrStart => "angle-addr-start",
            Self::AngleAddrEnd => "angle-addr-end",
            Self::DomainLiteralStart => "domain-literal-start",
            Self::DomainLiteralEnd => "domain-literal-end",
            Self::GroupDisplayNameTerminator => "group-display-name-terminator",
            Self::GroupTerminator => "group-terminator",
            Self::EndOfObsRouteMarker => "end-of-obs-route-marker",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wraps `value` in double quotes, escaping `\` and `"`.
#[must_use]
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Leaf token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    text: String,
    kind: TokenKind,
    whitespace: bool,
    defects: Vec<Defect>,
}

impl Terminal {
    /// Creates a terminal whose value is its text.
    #[must_use]
    pub fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            kind,
            whitespace: false,
            defects: Vec::new(),
        }
    }

    /// Creates a terminal whose value is a single space.
    #[must_use]
    pub fn whitespace(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            whitespace: true,
            ..Self::new(text, kind)
        }
    }

    /// Returns the literal text, quoted pairs already removed.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the token kind.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns true if the token is semantically a single space.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        self.whitespace
    }

    /// Returns the defects recorded on this terminal.
    #[must_use]
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// Returns the semantic value.
    #[must_use]
    pub fn value(&self) -> String {
        if self.whitespace {
            " ".to_string()
        } else {
            self.text.clone()
        }
    }

    pub(crate) fn push_defect(&mut self, defect: Defect) {
        self.defects.push(defect);
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Composite token owning an ordered list of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenList {
    kind: TokenKind,
    children: Vec<Token>,
    defects: Vec<Defect>,
    invalid: bool,
}

impl TokenList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            defects: Vec::new(),
            invalid: false,
        }
    }

    /// Creates a list from existing children.
    #[must_use]
    pub const fn with_children(kind: TokenKind, children: Vec<Token>) -> Self {
        Self {
            kind,
            children,
            defects: Vec::new(),
            invalid: false,
        }
    }

    /// Returns the production this list was built by.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns the current token type name.
    ///
    /// Mailboxes and groups marked invalid report `invalid-mailbox`, an
    /// invalid obsolete local part reports `invalid-obs-local-part`.
    #[must_use]
    pub const fn token_type(&self) -> &'static str {
        match (self.kind, self.invalid) {
            (TokenKind::Mailbox | TokenKind::Group, true) => "invalid-mailbox",
            (TokenKind::ObsLocalPart, true) => "invalid-obs-local-part",
            (kind, _) => kind.as_str(),
        }
    }

    /// Returns true once the list has been marked invalid.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Returns the children.
    #[must_use]
    pub fn children(&self) -> &[Token] {
        &self.children
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the defects recorded directly on this list.
    #[must_use]
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// Returns this list's defects followed by those of every descendant.
    #[must_use]
    pub fn all_defects(&self) -> Vec<&Defect> {
        let mut all: Vec<&Defect> = self.defects.iter().collect();
        for child in &self.children {
            all.extend(child.all_defects());
        }
        all
    }

    /// Returns the literal content of every comment in the subtree.
    #[must_use]
    pub fn comments(&self) -> Vec<String> {
        if self.kind == TokenKind::Comment {
            return vec![self.raw_text()];
        }
        self.children
            .iter()
            .filter_map(Token::as_list)
            .flat_map(Self::comments)
            .collect()
    }

    /// Returns the semantic value.
    ///
    /// Comments and folding whitespace collapse to one space, the inside of
    /// a quoted string keeps its whitespace, everything else concatenates
    /// the children's values.
    #[must_use]
    pub fn value(&self) -> String {
        match self.kind {
            TokenKind::Cfws | TokenKind::Comment => " ".to_string(),
            TokenKind::BareQuotedString => self.raw_text(),
            TokenKind::DisplayName => self.display_name_value(),
            TokenKind::LocalPart => self.local_part_value(),
            TokenKind::AddrSpec => self.addr_spec_value(),
            _ => self.concat_values(),
        }
    }

    pub(crate) fn concat_values(&self) -> String {
        self.children.iter().map(Token::value).collect()
    }

    /// Concatenated literal text of the children.
    pub(crate) fn raw_text(&self) -> String {
        self.children.iter().map(ToString::to_string).collect()
    }

    pub(crate) fn push(&mut self, token: impl Into<Token>) {
        self.children.push(token.into());
    }

    pub(crate) fn prepend(&mut self, token: impl Into<Token>) {
        self.children.insert(0, token.into());
    }

    pub(crate) fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) {
        self.children.extend(tokens);
    }

    pub(crate) fn push_defect(&mut self, defect: Defect) {
        self.defects.push(defect);
    }

    pub(crate) fn extend_defects(&mut self, defects: impl IntoIterator<Item = Defect>) {
        self.defects.extend(defects);
    }

    pub(crate) const fn mark_invalid(&mut self) {
        self.invalid = true;
    }

    pub(crate) fn first_mut(&mut self) -> Option<&mut Token> {
        self.children.first_mut()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Token> {
        self.children.last_mut()
    }

    pub(crate) fn into_children(self) -> Vec<Token> {
        self.children
    }
}

impl fmt::Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::BareQuotedString => f.write_str(&quote_string(&self.raw_text())),
            TokenKind::Comment => {
                f.write_str("(")?;
                for child in &self.children {
                    if child.kind() == TokenKind::Comment {
                        write!(f, "{child}")?;
                    } else {
                        let text = child.to_string();
                        f.write_str(
                            &text
                                .replace('\\', "\\\\")
                                .replace('(', "\\(")
                                .replace(')', "\\)"),
                        )?;
                    }
                }
                f.write_str(")")
            }
            _ => self.children.iter().try_for_each(|child| write!(f, "{child}")),
        }
    }
}

/// Node of a parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Composite node.
    List(TokenList),
    /// Leaf node.
    Terminal(Terminal),
}

impl Token {
    /// Returns the token kind.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        match self {
            Self::List(list) => list.kind(),
            Self::Terminal(terminal) => terminal.kind(),
        }
    }

    /// Returns the current token type name, see [`TokenList::token_type`].
    #[must_use]
    pub const fn token_type(&self) -> &'static str {
        match self {
            Self::List(list) => list.token_type(),
            Self::Terminal(terminal) => terminal.kind().as_str(),
        }
    }

    /// Returns the semantic value.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::List(list) => list.value(),
            Self::Terminal(terminal) => terminal.value(),
        }
    }

    /// Returns the defects recorded directly on this node.
    #[must_use]
    pub fn defects(&self) -> &[Defect] {
        match self {
            Self::List(list) => list.defects(),
            Self::Terminal(terminal) => terminal.defects(),
        }
    }

    /// Returns the defects of the whole subtree.
    #[must_use]
    pub fn all_defects(&self) -> Vec<&Defect> {
        match self {
            Self::List(list) => list.all_defects(),
            Self::Terminal(terminal) => terminal.defects().iter().collect(),
        }
    }

    /// Returns the list if this is a composite node.
    #[must_use]
    pub const fn as_list(&self) -> Option<&TokenList> {
        match self {
            Self::List(list) => Some(list),
            Self::Terminal(_) => None,
        }
    }

    /// Returns the terminal if this is a leaf.
    #[must_use]
    pub const fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            Self::List(_) => None,
            Self::Terminal(terminal) => Some(terminal),
        }
    }

    pub(crate) const fn as_list_mut(&mut self) -> Option<&mut TokenList> {
        match self {
            Self::List(list) => Some(list),
            Self::Terminal(_) => None,
        }
    }

    /// Returns true if this node is a list whose first child has `kind`.
    pub(crate) fn starts_with_kind(&self, kind: TokenKind) -> bool {
        self.as_list()
            .and_then(|list| list.children().first())
            .is_some_and(|first| first.kind() == kind)
    }

    /// Returns true if this node is a list whose last child has `kind`.
    pub(crate) fn ends_with_kind(&self, kind: TokenKind) -> bool {
        self.as_list()
            .and_then(|list| list.children().last())
            .is_some_and(|last| last.kind() == kind)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(list) => fmt::Display::fmt(list, f),
            Self::Terminal(terminal) => fmt::Display::fmt(terminal, f),
        }
    }
}

impl From<TokenList> for Token {
    fn from(list: TokenList) -> Self {
        Self::List(list)
    }
}

impl From<Terminal> for Token {
    fn from(terminal: Terminal) -> Self {
        Self::Terminal(terminal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn comment(parts: &[&str]) -> TokenList {
        let mut list = TokenList::new(TokenKind::Comment);
        for part in parts {
            list.push(Terminal::whitespace(*part, TokenKind::Ptext));
        }
        list
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("plain"), "\"plain\"");
        assert_eq!(quote_string("a \"b\" \\c"), "\"a \\\"b\\\" \\\\c\"");
    }

    #[test]
    fn test_whitespace_collapses_in_value() {
        let mut cfws = TokenList::new(TokenKind::Cfws);
        cfws.push(Terminal::whitespace("  \t", TokenKind::Fws));
        cfws.push(comment(&["note"]));

        let mut atom = TokenList::new(TokenKind::Atom);
        atom.push(Terminal::new("word", TokenKind::Atext));
        atom.push(cfws);

        assert_eq!(atom.value(), "word ");
        assert_eq!(atom.to_string(), "word  \t(note)");
    }

    #[test]
    fn test_bare_quoted_string_keeps_whitespace() {
        let mut bare = TokenList::new(TokenKind::BareQuotedString);
        bare.push(Terminal::new("a", TokenKind::Ptext));
        bare.push(Terminal::whitespace("   ", TokenKind::Fws));
        bare.push(Terminal::new("\"b\"", TokenKind::Ptext));

        assert_eq!(bare.value(), "a   \"b\"");
        assert_eq!(bare.to_string(), "\"a   \\\"b\\\"\"");
    }

    #[test]
    fn test_comment_rendering_escapes_parens() {
        let mut outer = comment(&["x(y)"]);
        outer.push(comment(&["inner"]));

        assert_eq!(outer.to_string(), "(x\\(y\\)(inner))");
        assert_eq!(outer.value(), " ");
        assert_eq!(outer.comments(), vec!["x(y)(inner)".to_string()]);
    }

    #[test]
    fn test_all_defects_includes_descendants() {
        let mut leaf = Terminal::new("x", TokenKind::Atext);
        leaf.push_defect(Defect::obsolete("leaf"));
        let mut inner = TokenList::new(TokenKind::Atom);
        inner.push(leaf);
        inner.push_defect(Defect::invalid("inner"));
        let mut outer = TokenList::new(TokenKind::Phrase);
        outer.push_defect(Defect::invalid("outer"));
        outer.push(inner);

        let details: Vec<&str> = outer.all_defects().iter().map(|d| d.detail()).collect();
        assert_eq!(details, vec!["outer", "inner", "leaf"]);
        assert_eq!(outer.defects().len(), 1);
    }

    #[test]
    fn test_invalid_retags_mailbox() {
        let mut mailbox = TokenList::new(TokenKind::Mailbox);
        assert_eq!(mailbox.token_type(), "mailbox");
        mailbox.mark_invalid();
        assert_eq!(mailbox.token_type(), "invalid-mailbox");
        assert_eq!(mailbox.kind(), TokenKind::Mailbox);
    }
}
