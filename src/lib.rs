// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! A streaming YAML 1.1 scanner.
//!
//! This crate is the tokenizing core of a YAML processing pipeline: it
//! turns a pull-based stream of Unicode characters into an ordered stream
//! of [`Token`]s with accurate source [`Mark`]s, or fails with a located
//! [`ScanError`]. It handles the parts of YAML that make scanning hard:
//!
//! - Simple keys, recognized retroactively when their `:` is seen
//! - Indentation-driven synthesis of block collection start/end tokens
//! - Block vs flow context switching
//! - All five scalar styles, with folding, chomping, and escape decoding
//!
//! The event parser, representation model, and emitter are separate
//! concerns consuming the token stream this crate produces.
//!
//! # Example
//!
//! ```
//! use yaml_scanner::{scan, ScalarStyle, TokenKind};
//!
//! let tokens = scan("a: 1\n").unwrap();
//! let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
//!
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::StreamStart,
//!         TokenKind::BlockMappingStart,
//!         TokenKind::Key,
//!         TokenKind::Scalar { value: "a".to_owned(), style: ScalarStyle::Plain },
//!         TokenKind::Value,
//!         TokenKind::Scalar { value: "1".to_owned(), style: ScalarStyle::Plain },
//!         TokenKind::BlockEnd,
//!         TokenKind::StreamEnd,
//!     ]
//! );
//! ```

mod buffer;
mod error;
mod mark;
mod queue;
mod scanner;
mod token;

pub use buffer::LookAheadBuffer;
pub use error::{ScanError, ScanResult};
pub use mark::Mark;
pub use scanner::Scanner;
pub use token::{ScalarStyle, Token, TokenKind};

/// Scan an entire input string into its token stream.
///
/// Convenience wrapper over [`Scanner`] for callers that do not need
/// incremental pulling. Returns the first error encountered, if any.
pub fn scan(input: &str) -> ScanResult<Vec<Token>> {
    Scanner::new(input.chars()).collect()
}

#[cfg(test)]
mod tests;
