//! Registry mapping header names to [`HeaderKind`]s.

use std::collections::HashMap;
use std::sync::Arc;

use super::Header;
use super::kind::{AddressKind, DateKind, HeaderKind, Unstructured};
use crate::error::Result;
use crate::policy::Policy;

fn shared(kind: impl HeaderKind + 'static) -> Arc<dyn HeaderKind> {
    Arc::new(kind)
}

fn default_table() -> Vec<(&'static str, Arc<dyn HeaderKind>)> {
    let unique_address = shared(AddressKind::new(true, false));
    let address = shared(AddressKind::new(false, false));
    let unique_date = shared(DateKind::unique());
    vec![
        ("subject", shared(Unstructured::unique())),
        ("date", unique_date.clone()),
        ("resent-date", shared(DateKind::repeatable())),
        ("orig-date", unique_date),
        ("sender", shared(AddressKind::new(true, true))),
        ("resent-sender", shared(AddressKind::new(false, true))),
        ("to", unique_address.clone()),
        ("resent-to", address.clone()),
        ("cc", unique_address.clone()),
        ("resent-cc", address.clone()),
        ("bcc", unique_address.clone()),
        ("resent-bcc", address.clone()),
        ("from", unique_address.clone()),
        ("resent-from", address),
        ("reply-to", unique_address),
    ]
}

/// Chooses the [`HeaderKind`] for each header name and builds headers.
///
/// Names are matched case-insensitively. Each factory owns its registry, so
/// registering a kind on one factory never affects another.
#[derive(Debug, Clone)]
pub struct HeaderFactory {
    registry: HashMap<String, Arc<dyn HeaderKind>>,
    default_kind: Arc<dyn HeaderKind>,
}

impl Default for HeaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderFactory {
    /// Creates a factory seeded with the standard address, date and subject
    /// headers.
    #[must_use]
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.registry.extend(
            default_table()
                .into_iter()
                .map(|(name, kind)| (name.to_string(), kind)),
        );
        factory
    }

    /// Creates a factory that treats every header as unstructured.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            registry: HashMap::new(),
            default_kind: Arc::new(Unstructured::repeatable()),
        }
    }

    /// Sets the kind used for names with no registered kind.
    #[must_use]
    pub fn with_default_kind(mut self, kind: Arc<dyn HeaderKind>) -> Self {
        self.default_kind = kind;
        self
    }

    /// Registers `kind` for headers called `name`.
    pub fn map_to_type(&mut self, name: &str, kind: Arc<dyn HeaderKind>) {
        self.registry.insert(name.to_ascii_lowercase(), kind);
    }

    /// Returns the kind used for `name`.
    #[must_use]
    pub fn kind_for(&self, name: &str) -> Arc<dyn HeaderKind> {
        self.registry
            .get(&name.to_ascii_lowercase())
            .unwrap_or(&self.default_kind)
            .clone()
    }

    /// Builds a header.
    ///
    /// `raw` is the value as found in the source; `unfolded` is the same
    /// value with folding removed, when the caller has it. With
    /// `use_decoded` the header's string form is the decoded value rather
    /// than `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Defect`](crate::Error::Defect) if `policy` raises on
    /// defects and the value has one.
    pub fn create(
        &self,
        name: &str,
        raw: &str,
        unfolded: Option<&str>,
        use_decoded: bool,
        policy: &Policy,
    ) -> Result<Header> {
        Header::build(name, raw, unfolded, use_decoded, self.kind_for(name), policy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let factory = HeaderFactory::new();
        assert_eq!(factory.kind_for("Subject").max_count(), Some(1));
        assert_eq!(factory.kind_for("subject").name(), "unique-unstructured");
        assert_eq!(factory.kind_for("To").max_count(), Some(1));
        assert_eq!(factory.kind_for("Resent-To").max_count(), None);
        assert_eq!(factory.kind_for("DATE").name(), "unique-date");
        assert_eq!(factory.kind_for("resent-date").name(), "date");
        assert_eq!(factory.kind_for("sender").name(), "unique-single-address");
        assert_eq!(factory.kind_for("resent-sender").name(), "single-address");
        assert_eq!(factory.kind_for("X-Mailer").name(), "unstructured");
        assert_eq!(factory.kind_for("X-Mailer").max_count(), None);
    }

    #[test]
    fn test_map_to_type() {
        let mut factory = HeaderFactory::new();
        factory.map_to_type("X-Reviewers", Arc::new(AddressKind::new(false, false)));
        assert_eq!(factory.kind_for("x-reviewers").name(), "address");
        assert_eq!(HeaderFactory::new().kind_for("x-reviewers").name(), "unstructured");
    }

    #[test]
    fn test_empty_and_default_kind() {
        let factory = HeaderFactory::empty();
        assert_eq!(factory.kind_for("to").name(), "unstructured");
        let factory = factory.with_default_kind(Arc::new(Unstructured::unique()));
        assert_eq!(factory.kind_for("anything").max_count(), Some(1));
    }
}
