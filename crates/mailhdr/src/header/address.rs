//! Address and group records extracted from address headers.

use std::fmt;

use crate::defect::Defect;
use crate::parser::{TokenList, is_atom_end, is_special, quote_string};

/// A single mailbox.
///
/// `Display` gives the text as it appeared in the header; use
/// [`reformatted`](Self::reformatted) for the canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    source: String,
    name: String,
    username: String,
    domain: String,
    defects: Vec<Defect>,
}

impl Address {
    /// Builds an address from its parts.
    #[must_use]
    pub fn new(name: &str, username: &str, domain: &str) -> Self {
        let mut address = Self {
            source: String::new(),
            name: name.to_string(),
            username: username.to_string(),
            domain: domain.to_string(),
            defects: Vec::new(),
        };
        address.source = address.reformatted();
        address
    }

    pub(crate) fn from_mailbox(mailbox: &TokenList) -> Self {
        Self {
            source: mailbox.to_string().trim_start().to_string(),
            name: mailbox.display_name().unwrap_or_default(),
            username: mailbox.local_part().unwrap_or_default(),
            domain: mailbox.domain().unwrap_or_default(),
            defects: mailbox.all_defects().into_iter().cloned().collect(),
        }
    }

    /// Display name, empty when there is none.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local part, unquoted.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Domain, empty when there is none.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Defects found while parsing this mailbox.
    #[must_use]
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// `username@domain`, quoting the username when needed.
    #[must_use]
    pub fn addr_spec(&self) -> String {
        let local = if self.username.chars().any(is_atom_end) {
            quote_string(&self.username)
        } else {
            self.username.clone()
        };
        if self.domain.is_empty() {
            local
        } else {
            format!("{local}@{}", self.domain)
        }
    }

    /// `Name <addr-spec>`, or just the addr-spec without a display name.
    #[must_use]
    pub fn reformatted(&self) -> String {
        let name = if self.name.chars().any(is_special) {
            quote_string(&self.name)
        } else {
            self.name.clone()
        };
        if name.is_empty() {
            self.addr_spec()
        } else {
            format!("{name} <{}>", self.addr_spec())
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A named group of mailboxes, or a lone mailbox with no group name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    source: String,
    name: Option<String>,
    addresses: Vec<Address>,
}

impl Group {
    /// Builds a group. Without a name, `addresses` should hold one mailbox.
    #[must_use]
    pub fn new(name: Option<&str>, addresses: Vec<Address>) -> Self {
        let members = addresses
            .iter()
            .map(Address::reformatted)
            .collect::<Vec<_>>()
            .join(", ");
        let source = match name {
            Some(name) if name.chars().any(is_special) => {
                format!("{}: {members};", quote_string(name))
            }
            Some(name) => format!("{name}: {members};"),
            None => members,
        };
        Self {
            source,
            name: name.map(ToString::to_string),
            addresses,
        }
    }

    pub(crate) fn from_address(address: &TokenList) -> Self {
        Self {
            source: address.to_string().trim_start().to_string(),
            name: address.display_name(),
            addresses: address
                .all_mailboxes()
                .into_iter()
                .map(Address::from_mailbox)
                .collect(),
        }
    }

    /// Group name; `None` for a bare mailbox.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Members of the group.
    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
