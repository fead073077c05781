//! Read-only views over finished parse trees.
//!
//! Accessors dispatch on the node kind and answer `None` (or an empty
//! list) when a question does not apply to that kind. A mailbox marked
//! invalid still answers them; an `invalid-mailbox` placeholder never does.

use super::token::{Token, TokenKind, TokenList, quote_string};
use super::is_atom_end;

/// Value of `children` with CFWS removed from both edges.
///
/// Edge CFWS is dropped whether it is a direct child or the first (last)
/// child of the first (last) child.
fn strip_cfws_edges(children: &[Token]) -> String {
    let mut res: Vec<Token> = children.to_vec();
    if res.first().is_some_and(|first| first.kind() == TokenKind::Cfws) {
        res.remove(0);
    } else if let Some(trimmed) = res.first().and_then(|first| trim_inner_edge(first, true)) {
        res[0] = trimmed;
    }
    if res.last().is_some_and(|last| last.kind() == TokenKind::Cfws) {
        res.pop();
    } else if let Some(trimmed) = res.last().and_then(|last| trim_inner_edge(last, false)) {
        let idx = res.len() - 1;
        res[idx] = trimmed;
    }
    res.iter().map(Token::value).collect()
}

/// Copy of `token` without its first (or last) child if that child is CFWS.
fn trim_inner_edge(token: &Token, at_start: bool) -> Option<Token> {
    let children = token.as_list()?.children();
    let kept = if at_start {
        (children.first()?.kind() == TokenKind::Cfws).then(|| &children[1..])?
    } else {
        (children.last()?.kind() == TokenKind::Cfws).then(|| &children[..children.len() - 1])?
    };
    Some(TokenList::with_children(TokenKind::Fragment, kept.to_vec()).into())
}

fn edge_is_cfws(token: Option<&Token>, at_start: bool) -> bool {
    token.is_some_and(|token| {
        token.kind() == TokenKind::Cfws
            || if at_start {
                token.starts_with_kind(TokenKind::Cfws)
            } else {
                token.ends_with_kind(TokenKind::Cfws)
            }
    })
}

impl TokenList {
    fn child_list(&self, index: usize) -> Option<&Self> {
        self.children().get(index).and_then(Token::as_list)
    }

    fn last_child_list(&self) -> Option<&Self> {
        self.children().last().and_then(Token::as_list)
    }

    fn find_child(&self, kind: TokenKind) -> Option<&Self> {
        self.children()
            .iter()
            .filter_map(Token::as_list)
            .find(|child| child.kind() == kind)
    }

    fn lists_of_kind(&self, kind: TokenKind) -> impl Iterator<Item = &Self> {
        self.children()
            .iter()
            .filter_map(Token::as_list)
            .filter(move |child| child.kind() == kind)
    }

    /// Value of a display name: re-quoted when the phrase had defects or
    /// contained a quoted string, with one space kept for edge CFWS.
    pub(crate) fn display_name_value(&self) -> String {
        let quote = !self.defects().is_empty()
            || self
                .children()
                .iter()
                .any(|child| child.kind() == TokenKind::QuotedString);
        if !quote {
            return self.concat_values();
        }
        let pre = if edge_is_cfws(self.children().first(), true) { " " } else { "" };
        let post = if edge_is_cfws(self.children().last(), false) { " " } else { "" };
        format!(
            "{pre}{}{post}",
            quote_string(&strip_cfws_edges(self.children()))
        )
    }

    pub(crate) fn local_part_value(&self) -> String {
        match self.children().first() {
            Some(Token::List(first)) if first.kind() == TokenKind::QuotedString => {
                first.quoted_value()
            }
            Some(first) => first.value(),
            None => String::new(),
        }
    }

    pub(crate) fn addr_spec_value(&self) -> String {
        match self.children() {
            [local, at, domain] => format!(
                "{}{}{}",
                local.value().trim_end(),
                at.value(),
                domain.value().trim_start()
            ),
            [first, ..] => first.value(),
            [] => String::new(),
        }
    }

    /// Display name of a display-name, name-addr, mailbox, group or
    /// group address.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match self.kind() {
            TokenKind::DisplayName => Some(strip_cfws_edges(self.children())),
            TokenKind::NameAddr => {
                if self.len() == 1 {
                    None
                } else {
                    self.child_list(0)?.display_name()
                }
            }
            TokenKind::Mailbox => self
                .child_list(0)
                .filter(|child| child.kind() == TokenKind::NameAddr)?
                .display_name(),
            TokenKind::Group => self.child_list(0)?.display_name(),
            TokenKind::Address => self
                .child_list(0)
                .filter(|child| child.kind() == TokenKind::Group && !child.is_invalid())?
                .display_name(),
            _ => None,
        }
    }

    /// Local part with edge CFWS removed and quoting undone.
    #[must_use]
    pub fn local_part(&self) -> Option<String> {
        match self.kind() {
            TokenKind::LocalPart => Some(strip_cfws_edges(self.child_list(0)?.children())),
            TokenKind::AddrSpec | TokenKind::Mailbox => self.child_list(0)?.local_part(),
            TokenKind::AngleAddr => self.find_child(TokenKind::AddrSpec)?.local_part(),
            TokenKind::NameAddr => self.last_child_list()?.local_part(),
            _ => None,
        }
    }

    /// Domain with all whitespace removed.
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        match self.kind() {
            TokenKind::Domain | TokenKind::DomainLiteral => {
                Some(self.concat_values().split_whitespace().collect())
            }
            TokenKind::AddrSpec => {
                if self.len() < 3 {
                    None
                } else {
                    self.last_child_list()?.domain()
                }
            }
            TokenKind::AngleAddr => self.find_child(TokenKind::AddrSpec)?.domain(),
            TokenKind::NameAddr => self.last_child_list()?.domain(),
            TokenKind::Mailbox => self.child_list(0)?.domain(),
            _ => None,
        }
    }

    /// Domains of an obsolete source route.
    #[must_use]
    pub fn route(&self) -> Option<Vec<String>> {
        match self.kind() {
            TokenKind::ObsRoute => Some(
                self.lists_of_kind(TokenKind::Domain)
                    .filter_map(Self::domain)
                    .collect(),
            ),
            TokenKind::AngleAddr => self.find_child(TokenKind::ObsRoute)?.route(),
            TokenKind::NameAddr => self.last_child_list()?.route(),
            TokenKind::Mailbox => self
                .child_list(0)
                .filter(|child| child.kind() == TokenKind::NameAddr)?
                .route(),
            _ => None,
        }
    }

    /// Canonical `local@domain` form.
    ///
    /// The local part is quoted if it contains an atom-ending character. An
    /// angle address with no addr-spec yields `<>`.
    #[must_use]
    pub fn addr_spec(&self) -> Option<String> {
        match self.kind() {
            TokenKind::AddrSpec => {
                let local = self.local_part().unwrap_or_default();
                let local = if local.chars().any(is_atom_end) {
                    quote_string(&local)
                } else {
                    local
                };
                Some(match self.domain() {
                    Some(domain) => format!("{local}@{domain}"),
                    None => local,
                })
            }
            TokenKind::AngleAddr => Some(
                self.find_child(TokenKind::AddrSpec)
                    .and_then(Self::addr_spec)
                    .unwrap_or_else(|| "<>".to_string()),
            ),
            TokenKind::NameAddr => self.last_child_list()?.addr_spec(),
            TokenKind::Mailbox => self.child_list(0)?.addr_spec(),
            _ => None,
        }
    }

    /// Address entries of an address list.
    #[must_use]
    pub fn addresses(&self) -> Vec<&Self> {
        match self.kind() {
            TokenKind::AddressList => self.lists_of_kind(TokenKind::Address).collect(),
            _ => Vec::new(),
        }
    }

    /// Valid mailboxes, flattened through groups.
    #[must_use]
    pub fn mailboxes(&self) -> Vec<&Self> {
        match self.kind() {
            TokenKind::AddressList => self
                .lists_of_kind(TokenKind::Address)
                .flat_map(Self::mailboxes)
                .collect(),
            TokenKind::Address => match self.child_list(0) {
                Some(mailbox) if mailbox.kind() == TokenKind::Mailbox && !mailbox.is_invalid() => {
                    vec![mailbox]
                }
                Some(group) if group.kind() == TokenKind::Group && !group.is_invalid() => {
                    group.mailboxes()
                }
                _ => Vec::new(),
            },
            TokenKind::MailboxList => self
                .lists_of_kind(TokenKind::Mailbox)
                .filter(|mailbox| !mailbox.is_invalid())
                .collect(),
            TokenKind::GroupList => self
                .child_list(0)
                .filter(|child| child.kind() == TokenKind::MailboxList)
                .map(Self::mailboxes)
                .unwrap_or_default(),
            TokenKind::Group => self
                .child_list(2)
                .filter(|child| child.kind() == TokenKind::GroupList)
                .map(Self::mailboxes)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Every mailbox including invalid ones and placeholders.
    #[must_use]
    pub fn all_mailboxes(&self) -> Vec<&Self> {
        match self.kind() {
            TokenKind::AddressList => self
                .lists_of_kind(TokenKind::Address)
                .flat_map(Self::all_mailboxes)
                .collect(),
            TokenKind::Address => match self.child_list(0) {
                Some(group) if group.kind() == TokenKind::Group => group.all_mailboxes(),
                Some(mailbox)
                    if matches!(
                        mailbox.kind(),
                        TokenKind::Mailbox | TokenKind::InvalidMailbox
                    ) =>
                {
                    vec![mailbox]
                }
                _ => Vec::new(),
            },
            TokenKind::MailboxList => self
                .children()
                .iter()
                .filter_map(Token::as_list)
                .filter(|child| {
                    matches!(child.kind(), TokenKind::Mailbox | TokenKind::InvalidMailbox)
                })
                .collect(),
            TokenKind::GroupList => self
                .child_list(0)
                .filter(|child| child.kind() == TokenKind::MailboxList)
                .map(Self::all_mailboxes)
                .unwrap_or_default(),
            TokenKind::Group => self
                .child_list(2)
                .filter(|child| child.kind() == TokenKind::GroupList)
                .map(Self::all_mailboxes)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Text inside a quoted string or comment.
    #[must_use]
    pub fn content(&self) -> Option<String> {
        match self.kind() {
            TokenKind::QuotedString => Some(self.find_child(TokenKind::BareQuotedString)?.value()),
            TokenKind::Comment => Some(self.raw_text()),
            _ => None,
        }
    }

    /// Value with any bare quoted string kept in quoted form.
    #[must_use]
    pub fn quoted_value(&self) -> String {
        self.children()
            .iter()
            .map(|child| {
                if child.kind() == TokenKind::BareQuotedString {
                    child.to_string()
                } else {
                    child.value()
                }
            })
            .collect()
    }
}
