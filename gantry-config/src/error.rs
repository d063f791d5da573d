//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::tree::{ConfigFormat, MergePolicy};

// Configuration content errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    Parse(ParseError),
    FormatMismatch(ConfigFormat),
    PolicyConflict(ConfigFormat, MergePolicy),
}

// Parse failure, with the offending line number when one is known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    pub line: Option<usize>,
    pub message: String,
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Parse(error) => {
                warn!(line = ?error.line, message = %error.message, "{}", self);
            }
            Error::FormatMismatch(format) => {
                warn!(?format, "{}", self);
            }
            Error::PolicyConflict(format, policy) => {
                warn!(?format, ?policy, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(error) => error.fmt(f),
            Error::FormatMismatch(..) => {
                write!(f, "content does not match the declared format")
            }
            Error::PolicyConflict(..) => {
                write!(f, "merge policy is incompatible with the content format")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Error {
        Error::Parse(error)
    }
}

// ===== impl ParseError =====

impl ParseError {
    pub(crate) fn new(line: Option<usize>, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => {
                write!(f, "parse error at line {}: {}", line, self.message)
            }
            None => write!(f, "parse error: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}
