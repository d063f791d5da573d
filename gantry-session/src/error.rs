//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tracing::warn;

use crate::transport::{RpcError, TransportError};

//
// Type aliases.
//
pub type Result<T> = std::result::Result<T, Error>;

// Session errors.
#[derive(Debug)]
pub enum Error {
    // Transport
    Connection(std::io::Error),
    Timeout(Duration),
    SessionClosed,
    // Lock state machine misuse
    AlreadyLocked,
    NotLocked,
    LockHeld,
    // Staged content
    Config(gantry_config::Error),
    // Device-reported failures
    Validation(RpcError),
    Commit(RpcError),
    Command(RpcError),
    Rpc(RpcError),
    // Local rollback argument check
    RollbackIndex(usize),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Connection(error) => {
                warn!(%error, "{}", self);
            }
            Error::Timeout(timeout) => {
                warn!(?timeout, "{}", self);
            }
            Error::SessionClosed
            | Error::AlreadyLocked
            | Error::NotLocked
            | Error::LockHeld => {
                warn!("{}", self);
            }
            Error::Config(error) => {
                error.log();
            }
            Error::Validation(error)
            | Error::Commit(error)
            | Error::Command(error)
            | Error::Rpc(error) => {
                warn!(tag = %error.tag, message = %error.message, "{}", self);
            }
            Error::RollbackIndex(index) => {
                warn!(%index, "{}", self);
            }
        }
    }

    // Validation requests surface device denials as validation failures.
    pub(crate) fn validation(error: TransportError) -> Error {
        match error {
            TransportError::Rpc(error) => Error::Validation(error),
            error => error.into(),
        }
    }

    // Commit requests surface device denials as commit failures.
    pub(crate) fn commit(error: TransportError) -> Error {
        match error {
            TransportError::Rpc(error) => Error::Commit(error),
            error => error.into(),
        }
    }

    // Operational command failures.
    pub(crate) fn command(error: TransportError) -> Error {
        match error {
            TransportError::Rpc(error) => Error::Command(error),
            error => error.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connection(..) => {
                write!(f, "connection failed")
            }
            Error::Timeout(..) => {
                write!(f, "RPC deadline exceeded")
            }
            Error::SessionClosed => {
                write!(f, "session is disconnected")
            }
            Error::AlreadyLocked => {
                write!(f, "configuration lock already held")
            }
            Error::NotLocked => {
                write!(f, "configuration lock not held")
            }
            Error::LockHeld => {
                write!(f, "configuration lock still held")
            }
            Error::Config(error) => error.fmt(f),
            Error::Validation(error) => {
                write!(f, "configuration check failed: {}", error)
            }
            Error::Commit(error) => {
                write!(f, "commit failed: {}", error)
            }
            Error::Command(error) => {
                write!(f, "command failed: {}", error)
            }
            Error::Rpc(error) => {
                write!(f, "RPC failed: {}", error)
            }
            Error::RollbackIndex(index) => {
                write!(f, "invalid rollback index: {}", index)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(error) => Some(error),
            Error::Config(error) => Some(error),
            Error::Validation(error)
            | Error::Commit(error)
            | Error::Command(error)
            | Error::Rpc(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Error {
        match error {
            TransportError::Connection(error) => Error::Connection(error),
            TransportError::Closed => Error::SessionClosed,
            TransportError::Rpc(error) => Error::Rpc(error),
        }
    }
}

impl From<gantry_config::Error> for Error {
    fn from(error: gantry_config::Error) -> Error {
        Error::Config(error)
    }
}
