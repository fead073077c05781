//! Policy: configuration shared by parsing and folding.
//!
//! A [`Policy`] is an immutable value. Variants are derived with
//! [`Policy::with`] or the `with_*` builders, or by merging two policies
//! with `+`, where settings made explicitly on the right-hand side win.
//!
//! ```
//! use mailhdr::Policy;
//!
//! let policy = Policy::smtp().with_max_line_length(Some(100));
//! assert_eq!(policy.linesep(), "\r\n");
//! assert_eq!(policy.max_line_length(), Some(100));
//!
//! let strict_smtp = Policy::smtp() + Policy::strict();
//! assert!(strict_smtp.raise_on_defect());
//! assert_eq!(strict_smtp.linesep(), "\r\n");
//! ```

use std::ops::Add;
use std::sync::{Arc, LazyLock};

use crate::defect::Defect;
use crate::error::{Error, Result};
use crate::folding::DEFAULT_MAX_LINE_LENGTH;
use crate::header::{Header, HeaderFactory};
use crate::parser::{DEFAULT_MAX_COMMENT_DEPTH, Parser};

static DEFAULT_FACTORY: LazyLock<HeaderFactory> = LazyLock::new(HeaderFactory::new);

/// Settings explicitly chosen for a [`Policy`].
///
/// `None` means "not set", so the setting falls back to its default and a
/// merge leaves the other side's value alone.
#[derive(Debug, Clone, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PolicyOverrides {
    /// Raise the first defect as an error instead of recording it.
    pub raise_on_defect: Option<bool>,
    /// Line separator for folded output.
    pub linesep: Option<String>,
    /// Folded output must be 7-bit clean.
    pub must_be_7bit: Option<bool>,
    /// Maximum output line length; `Some(None)` disables wrapping.
    pub max_line_length: Option<Option<usize>>,
    /// Use the decoded value as a header's string form.
    pub decoded_headers: Option<bool>,
    /// Comment nesting limit for the parser.
    pub max_comment_depth: Option<usize>,
    /// Factory choosing header kinds.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub header_factory: Option<Arc<HeaderFactory>>,
}

impl PolicyOverrides {
    /// Combines two override sets; fields set in `other` win.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            raise_on_defect: other.raise_on_defect.or(self.raise_on_defect),
            linesep: other.linesep.clone().or_else(|| self.linesep.clone()),
            must_be_7bit: other.must_be_7bit.or(self.must_be_7bit),
            max_line_length: other.max_line_length.or(self.max_line_length),
            decoded_headers: other.decoded_headers.or(self.decoded_headers),
            max_comment_depth: other.max_comment_depth.or(self.max_comment_depth),
            header_factory: other
                .header_factory
                .clone()
                .or_else(|| self.header_factory.clone()),
        }
    }
}

/// Controls how headers are parsed, how defects are handled and how
/// output is folded.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    overrides: PolicyOverrides,
}

impl Policy {
    /// The default policy: defects are recorded, lines are folded at 78
    /// characters and separated by `\n`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Like the default, but the first defect is raised as an error.
    #[must_use]
    pub fn strict() -> Self {
        Self::new().with_raise_on_defect(true)
    }

    /// Default policy with `\r\n` line endings.
    #[must_use]
    pub fn smtp() -> Self {
        Self::new().with_linesep("\r\n")
    }

    /// `\r\n` line endings and no wrapping.
    #[must_use]
    pub fn http() -> Self {
        Self::new().with_linesep("\r\n").with_max_line_length(None)
    }

    /// Headers keep their source value as string form.
    #[must_use]
    pub fn email5_defaults() -> Self {
        Self::new().with_decoded_headers(false)
    }

    /// Headers use their decoded value as string form.
    #[must_use]
    pub fn email6_defaults() -> Self {
        Self::new().with_decoded_headers(true)
    }

    /// Builds a policy from explicit settings.
    #[must_use]
    pub const fn from_overrides(overrides: PolicyOverrides) -> Self {
        Self { overrides }
    }

    /// The explicitly chosen settings.
    #[must_use]
    pub const fn overrides(&self) -> &PolicyOverrides {
        &self.overrides
    }

    /// Returns a copy with `overrides` applied on top.
    #[must_use]
    pub fn with(&self, overrides: PolicyOverrides) -> Self {
        Self {
            overrides: self.overrides.merge(&overrides),
        }
    }

    /// Merges two policies; settings made explicitly in `other` win.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.with(other.overrides.clone())
    }

    /// Returns a copy with `raise_on_defect` set.
    #[must_use]
    pub fn with_raise_on_defect(&self, raise_on_defect: bool) -> Self {
        self.with(PolicyOverrides {
            raise_on_defect: Some(raise_on_defect),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy with the line separator set.
    #[must_use]
    pub fn with_linesep(&self, linesep: &str) -> Self {
        self.with(PolicyOverrides {
            linesep: Some(linesep.to_string()),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy with `must_be_7bit` set.
    #[must_use]
    pub fn with_must_be_7bit(&self, must_be_7bit: bool) -> Self {
        self.with(PolicyOverrides {
            must_be_7bit: Some(must_be_7bit),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy with the maximum line length set; `None` disables
    /// wrapping.
    #[must_use]
    pub fn with_max_line_length(&self, max_line_length: Option<usize>) -> Self {
        self.with(PolicyOverrides {
            max_line_length: Some(max_line_length),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy with `decoded_headers` set.
    #[must_use]
    pub fn with_decoded_headers(&self, decoded_headers: bool) -> Self {
        self.with(PolicyOverrides {
            decoded_headers: Some(decoded_headers),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy with the comment nesting limit set.
    #[must_use]
    pub fn with_max_comment_depth(&self, max_comment_depth: usize) -> Self {
        self.with(PolicyOverrides {
            max_comment_depth: Some(max_comment_depth),
            ..PolicyOverrides::default()
        })
    }

    /// Returns a copy that builds headers with `factory`.
    #[must_use]
    pub fn with_header_factory(&self, factory: HeaderFactory) -> Self {
        self.with(PolicyOverrides {
            header_factory: Some(Arc::new(factory)),
            ..PolicyOverrides::default()
        })
    }

    /// Whether defects are raised rather than recorded.
    #[must_use]
    pub fn raise_on_defect(&self) -> bool {
        self.overrides.raise_on_defect.unwrap_or(false)
    }

    /// Line separator for folded output.
    #[must_use]
    pub fn linesep(&self) -> &str {
        self.overrides.linesep.as_deref().unwrap_or("\n")
    }

    /// Whether folded output must be 7-bit clean.
    #[must_use]
    pub fn must_be_7bit(&self) -> bool {
        self.overrides.must_be_7bit.unwrap_or(false)
    }

    /// Maximum output line length, `None` for no wrapping.
    #[must_use]
    pub fn max_line_length(&self) -> Option<usize> {
        self.overrides
            .max_line_length
            .unwrap_or(Some(DEFAULT_MAX_LINE_LENGTH))
    }

    /// Whether headers use their decoded value as string form.
    #[must_use]
    pub fn decoded_headers(&self) -> bool {
        self.overrides.decoded_headers.unwrap_or(false)
    }

    /// Comment nesting limit for the parser.
    #[must_use]
    pub fn max_comment_depth(&self) -> usize {
        self.overrides
            .max_comment_depth
            .unwrap_or(DEFAULT_MAX_COMMENT_DEPTH)
    }

    /// Factory used by [`make_header`](Self::make_header).
    #[must_use]
    pub fn header_factory(&self) -> &HeaderFactory {
        self.overrides
            .header_factory
            .as_deref()
            .unwrap_or(&DEFAULT_FACTORY)
    }

    /// Parser configured with this policy's limits.
    #[must_use]
    pub fn parser(&self) -> Parser {
        Parser::new(self.max_comment_depth())
    }

    /// Records `defect` in `defects`, or returns it as an error when the
    /// policy raises on defects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Defect`] under a raising policy.
    pub fn handle_defect(&self, defects: &mut Vec<Defect>, defect: Defect) -> Result<()> {
        if self.raise_on_defect() {
            tracing::debug!(kind = %defect.kind(), detail = defect.detail(), "raising defect");
            return Err(Error::Defect(defect));
        }
        self.register_defect(defects, defect);
        Ok(())
    }

    /// Records `defect` without raising.
    #[allow(clippy::unused_self)]
    pub fn register_defect(&self, defects: &mut Vec<Defect>, defect: Defect) {
        tracing::trace!(kind = %defect.kind(), detail = defect.detail(), "recording defect");
        defects.push(defect);
    }

    /// Checks whether another `name` header may be added when `present`
    /// already exist, recording a duplicate defect if not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Defect`] under a raising policy when the header's
    /// kind allows fewer instances.
    pub fn check_header_count(
        &self,
        name: &str,
        present: usize,
        defects: &mut Vec<Defect>,
    ) -> Result<()> {
        match self.header_factory().kind_for(name).max_count() {
            Some(max) if present >= max => {
                self.handle_defect(defects, Defect::duplicate_header(name))
            }
            _ => Ok(()),
        }
    }

    /// Builds a header through this policy's factory.
    ///
    /// `unfolded` is the value with folding line breaks removed; pass it
    /// whenever `raw` comes from message source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Defect`] if the policy raises on defects and the
    /// value has one.
    pub fn make_header(&self, name: &str, raw: &str, unfolded: Option<&str>) -> Result<Header> {
        self.header_factory()
            .create(name, raw, unfolded, self.decoded_headers(), self)
    }
}

impl Add for Policy {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.merge(&other)
    }
}

impl Add<&Policy> for &Policy {
    type Output = Policy;

    fn add(self, other: &Policy) -> Policy {
        self.merge(other)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::defect::DefectKind;
    use crate::header::{AddressKind, HeaderKind};

    #[test]
    fn test_presets() {
        let default = Policy::default();
        assert!(!default.raise_on_defect());
        assert_eq!(default.linesep(), "\n");
        assert_eq!(default.max_line_length(), Some(78));
        assert!(!default.decoded_headers());
        assert!(!default.must_be_7bit());
        assert_eq!(default.max_comment_depth(), 64);

        assert!(Policy::strict().raise_on_defect());
        assert_eq!(Policy::smtp().linesep(), "\r\n");
        assert_eq!(Policy::smtp().max_line_length(), Some(78));
        assert_eq!(Policy::http().linesep(), "\r\n");
        assert_eq!(Policy::http().max_line_length(), None);

        assert!(!Policy::email5_defaults().decoded_headers());
        assert!(Policy::email6_defaults().decoded_headers());
        assert_eq!(
            Policy::email5_defaults().overrides().decoded_headers,
            Some(false)
        );
    }

    #[test]
    fn test_merge_is_right_biased() {
        let left = Policy::new().with_linesep("\r\n").with_max_line_length(Some(40));
        let right = Policy::new().with_max_line_length(Some(100));
        let merged = left.clone() + right;
        assert_eq!(merged.linesep(), "\r\n");
        assert_eq!(merged.max_line_length(), Some(100));

        // defaults on the right never override explicit settings on the left
        let merged = &left + &Policy::default();
        assert_eq!(merged.max_line_length(), Some(40));

        let merged = Policy::http().merge(&Policy::smtp());
        assert_eq!(merged.max_line_length(), None);

        let merged = Policy::new().with_must_be_7bit(true) + Policy::email6_defaults();
        assert!(merged.must_be_7bit());
        assert!(merged.decoded_headers());
    }

    #[test]
    fn test_with_does_not_mutate() {
        let base = Policy::default();
        let strict = base.with(PolicyOverrides {
            raise_on_defect: Some(true),
            ..PolicyOverrides::default()
        });
        assert!(strict.raise_on_defect());
        assert!(!base.raise_on_defect());
    }

    #[test]
    fn test_handle_defect() {
        let mut defects = Vec::new();
        Policy::default()
            .handle_defect(&mut defects, Defect::obsolete("old"))
            .unwrap();
        assert_eq!(defects.len(), 1);

        let err = Policy::strict()
            .handle_defect(&mut defects, Defect::invalid("bad"))
            .unwrap_err();
        assert!(matches!(err, Error::Defect(ref d) if d.kind() == DefectKind::InvalidHeader));
        assert_eq!(defects.len(), 1);
    }

    #[test]
    fn test_make_header_strict() {
        let header = Policy::default()
            .make_header("To", "a@b.com junk", None)
            .unwrap();
        assert!(!header.defects().is_empty());

        assert!(matches!(
            Policy::strict().make_header("To", "a@b.com junk", None),
            Err(Error::Defect(_))
        ));
        assert!(Policy::strict().make_header("To", "a@b.com", None).is_ok());
    }

    #[test]
    fn test_check_header_count() {
        let mut defects = Vec::new();
        let policy = Policy::default();
        policy.check_header_count("Subject", 0, &mut defects).unwrap();
        policy.check_header_count("Received", 5, &mut defects).unwrap();
        assert!(defects.is_empty());

        policy.check_header_count("subject", 1, &mut defects).unwrap();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind(), DefectKind::DuplicateHeader);

        assert!(Policy::strict().check_header_count("To", 1, &mut defects).is_err());
    }

    #[test]
    fn test_decoded_headers_flag() {
        let raw = "=?utf-8?q?caf=C3=A9?=";
        let header = Policy::default().make_header("Subject", raw, Some(raw)).unwrap();
        assert_eq!(header.as_str(), raw);
        let header = Policy::default()
            .with_decoded_headers(true)
            .make_header("Subject", raw, Some(raw))
            .unwrap();
        assert_eq!(header.as_str(), "café");
    }

    #[test]
    fn test_factory_isolation() {
        let mut factory = HeaderFactory::new();
        factory.map_to_type("X-Reviewers", Arc::new(AddressKind::new(false, false)));
        let custom = Policy::default().with_header_factory(factory);

        let header = custom.make_header("X-Reviewers", "a@example.com", None).unwrap();
        assert_eq!(header.addresses().len(), 1);
        assert_eq!(custom.header_factory().kind_for("x-reviewers").name(), "address");
        assert_eq!(
            Policy::default().header_factory().kind_for("x-reviewers").name(),
            "unstructured"
        );
    }

    #[test]
    fn test_comment_depth_reaches_parser() {
        let policy = Policy::default().with_max_comment_depth(2);
        assert_eq!(policy.parser().max_comment_depth(), 2);
        let header = policy.make_header("Subject", "x", None).unwrap();
        assert_eq!(header.value(), "x");
        let header = policy.make_header("To", "a@b.com (((deep)))", None).unwrap();
        assert!(header.defects().iter().any(|d| d.detail() == "comment nesting too deep"));
    }

    #[test]
    fn test_policy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Policy>();
        let kind: &dyn HeaderKind = &AddressKind::new(false, false);
        assert_eq!(kind.max_count(), None);
    }
}
