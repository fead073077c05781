//! # mailhdr
//!
//! RFC 5322 / RFC 2047 email header parsing, decoding and folding.
//!
//! ## Features
//!
//! - **Lenient parsing**: A recursive-descent parser that never gives up on
//!   a header value; anomalies are recorded as [`Defect`]s
//! - **Encoded words**: RFC 2047 `=?charset?q?...?=` decoding and encoding
//! - **Typed headers**: Address, date and unstructured header kinds chosen by
//!   a configurable [`HeaderFactory`]
//! - **Folding**: Line wrapping at syntactic split points with encoded-word
//!   output for non-ASCII text
//! - **Policies**: Immutable [`Policy`] values controlling strictness, line
//!   length and line endings
//!
//! ## Quick Start
//!
//! ### Parsing Headers
//!
//! ```ignore
//! use mailhdr::Policy;
//!
//! let policy = Policy::default();
//! let to = policy.make_header("To", "Fred <fred@example.com>, jane@example.org", None)?;
//! for address in to.addresses() {
//!     println!("{} -> {}", address.name(), address.addr_spec());
//! }
//!
//! let subject = policy.make_header("Subject", "=?utf-8?q?caf=C3=A9?=", None)?;
//! assert_eq!(subject.value(), "café");
//! ```
//!
//! ### Folding Headers
//!
//! ```ignore
//! use mailhdr::Policy;
//!
//! let policy = Policy::smtp();
//! let header = policy.make_header("Subject", "Grüße aus Berlin", None)?;
//! print!("{}", header.fold(&policy)?);
//! ```
//!
//! ### Strict Parsing
//!
//! ```ignore
//! use mailhdr::{Error, Policy};
//!
//! match Policy::strict().make_header("To", "a@b.com junk", None) {
//!     Err(Error::Defect(defect)) => println!("rejected: {defect}"),
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! ### Decoding Raw Values
//!
//! ```ignore
//! use mailhdr::folding::{decode_header, make_header};
//!
//! let chunks = decode_header("=?iso-8859-1?q?hello_W=F6rld?= plain")?;
//! let header = make_header(&chunks, None, None, " ")?;
//! assert_eq!(header.to_string(), "hello Wörld plain");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod defect;
mod error;
mod policy;

pub mod charset;
pub mod encoded_word;
pub mod folding;
pub mod header;
pub mod parser;

pub use charset::{Charset, HeaderEncoding};
pub use defect::{Defect, DefectKind};
pub use error::{Error, Result};
pub use folding::{EncodedHeader, decode_header, make_header};
pub use header::{Address, Group, Header, HeaderDateTime, HeaderFactory, HeaderKind};
pub use policy::{Policy, PolicyOverrides};
