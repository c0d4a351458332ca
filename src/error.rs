// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Error type for YAML scanning.
//!
//! The scanner reports every syntax failure through a single error type
//! carrying a message and the [`Mark`] that located it. Errors are not
//! recoverable: the scanner is poisoned after the first one and replays it
//! on every subsequent pull.

use derive_more::Display;

use crate::mark::Mark;

/// A syntax error encountered while scanning.
///
/// The mark points at the position the scanner used to report the problem,
/// which for multi-character constructs (scalars, directives, tags) is
/// usually where the construct started. [`Scanner::current_position`]
/// additionally exposes the buffer position at the moment of detection.
///
/// [`Scanner::current_position`]: crate::Scanner::current_position
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{message}, at {mark}")]
pub struct ScanError {
    /// Where the error was located.
    pub mark: Mark,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ScanError {
    /// Create an error at the given mark.
    #[must_use]
    pub fn new(mark: Mark, message: impl Into<String>) -> Self {
        Self {
            mark,
            message: message.into(),
        }
    }

    /// Create an error for a failure inside a named construct, in the form
    /// `while scanning <what>, <problem>`.
    #[must_use]
    pub fn while_scanning(what: &str, mark: Mark, problem: &str) -> Self {
        Self::new(mark, format!("while scanning {what}, {problem}"))
    }
}

impl std::error::Error for ScanError {}

/// Result alias used by every scanning primitive.
pub type ScanResult<T> = Result<T, ScanError>;
