// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Recover
//!
//! Password recovery for PDF documents protected by the Standard Security
//! Handler, revisions 2 (40-bit RC4) and 3 (40-128 bit RC4).
//!
//! ## Core Features
//!
//! - **Parameter extraction**: trailer, `/ID` and encryption dictionary,
//!   classic trailers or cross-reference streams
//! - **Four search modes**: owner password (with or without the user
//!   password), user password, verification of a supplied password
//! - **Fast rejection**: precomputed key derivation input, RC4 schedules
//!   specialised for 40 and 128 bit keys, 3-byte early exit for revision 3
//! - **Candidate expansion**: first-letter and full case permutations
//! - **Resumable**: JSON checkpoints, word lists and brute force restart at
//!   the saved candidate
//! - **Parallel search** (feature `parallel`): rayon workers, one session
//!   clone each
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_recover::candidates::{CandidateSupplier, Wordlist};
//! use pdf_recover::driver;
//! use pdf_recover::extract::extract_from_file;
//! use pdf_recover::CrackConfig;
//!
//! # fn main() -> pdf_recover::Result<()> {
//! let params = extract_from_file("locked.pdf")?;
//! let config = CrackConfig::new().with_user_fallback(true);
//! let report = driver::recover(&params, &config, || {
//!     let words: Box<dyn CandidateSupplier> = Box::new(Wordlist::open("words.txt")?);
//!     Ok(words)
//! })?;
//! if let Some(owner) = report.owner_password() {
//!     println!("owner password: {}", String::from_utf8_lossy(owner));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing single candidates
//!
//! ```
//! use pdf_recover::{EncryptionParameters, PermutationKind, Session};
//!
//! let params = EncryptionParameters::synthesize(b"owner", b"Secret", 3, 128, -4, b"id");
//! let mut session = Session::begin(&params, None, true, PermutationKind::FirstChar).unwrap();
//! assert!(!session.test(b"wrong"));
//! assert!(session.test(b"secret")); // first letter upper-cased
//! assert_eq!(session.found_password(), Some(&b"Secret"[..]));
//! ```
//!
//! ## PDF Specification
//!
//! Implements the password algorithms of ISO 32000-1:2008, Section 7.6.3
//! (PDF Reference 1.7, Algorithms 3.2 - 3.5).

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Encryption parameters and algorithms
pub mod encryption;

// Candidate testing
pub mod engine;

// Parameter extraction
pub mod extract;
pub mod lexer;

// Candidate supply and the search loop
pub mod candidates;
pub mod driver;

pub use config::CrackConfig;
pub use encryption::{EncryptionParameters, ParamWarning};
pub use engine::{Checkpoint, Mode, PermutationKind, Progress, Session};
pub use error::{Error, Result};
