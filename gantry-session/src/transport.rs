//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use gantry_config::ConfigTree;
use serde::{Deserialize, Serialize};

use crate::commit::{CommitOptions, CommitRecord};

// Identity reported by the device when a transport attaches.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct DeviceFacts {
    pub hostname: String,
    pub model: String,
    pub version: String,
}

// Requested encoding of operational command output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Xml,
}

// Structured failure carried inside an RPC reply.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct RpcError {
    pub severity: RpcSeverity,
    pub tag: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcSeverity {
    Warning,
    Error,
}

// Transport-level failures. Connection errors are fatal and never retried
// at this layer; retry policy belongs to the caller.
#[derive(Debug)]
pub enum TransportError {
    Connection(std::io::Error),
    Closed,
    Rpc(RpcError),
}

// Capability interface to one managed device.
//
// One RPC is in flight per connection at any time; the `&mut self`
// receivers make that structural. Exactly-once delivery per call and the
// absence of silent partial writes are properties of the underlying
// protocol session and are assumed here, not re-derived.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + std::fmt::Debug {
    // Attach and authenticate.
    async fn open(&mut self) -> Result<DeviceFacts, TransportError>;

    // Detach. Infallible by design; a connection that is already gone is
    // as closed as one that shut down cleanly.
    async fn close(&mut self);

    // Exclusive configuration lock.
    async fn lock(&mut self) -> Result<(), TransportError>;
    async fn unlock(&mut self) -> Result<(), TransportError>;

    // Active (committed) configuration.
    async fn get_config(&mut self) -> Result<ConfigTree, TransportError>;

    // Historical configuration by rollback index.
    async fn get_rollback(
        &mut self,
        index: usize,
    ) -> Result<ConfigTree, TransportError>;

    // Device commit history, most recent first.
    async fn history(&mut self) -> Result<Vec<CommitRecord>, TransportError>;

    // Validate a configuration without applying it.
    async fn validate(
        &mut self,
        config: &ConfigTree,
    ) -> Result<(), TransportError>;

    // Commit a configuration, returning the new commit record.
    async fn commit(
        &mut self,
        config: &ConfigTree,
        options: &CommitOptions,
    ) -> Result<CommitRecord, TransportError>;

    // Reconfirm a pending confirmed commit without content changes.
    async fn confirm(&mut self) -> Result<(), TransportError>;

    // Read-only operational command.
    async fn run_command(
        &mut self,
        command: &str,
        format: OutputFormat,
    ) -> Result<String, TransportError>;

    // Arbitrary RPC by name.
    async fn execute_rpc(
        &mut self,
        name: &str,
        args: &[(String, String)],
    ) -> Result<String, TransportError>;
}

// ===== impl RpcError =====

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag, self.message)
    }
}

impl std::error::Error for RpcError {}

// ===== impl TransportError =====

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connection(error) => {
                write!(f, "connection failed: {}", error)
            }
            TransportError::Closed => {
                write!(f, "connection is closed")
            }
            TransportError::Rpc(error) => {
                write!(f, "device reported an error: {}", error)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Connection(error) => Some(error),
            TransportError::Rpc(error) => Some(error),
            TransportError::Closed => None,
        }
    }
}
