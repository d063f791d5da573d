//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use enum_as_inner::EnumAsInner;
use gantry_config::{ConfigDiff, ConfigFormat, ConfigTree, MergePolicy};
use tokio::time;

use crate::commit::{COMMIT_HISTORY_DEPTH, CommitHistory, PendingConfirm};
use crate::debug::Debug;
use crate::error::{Error, Result};
use crate::transport::{DeviceFacts, OutputFormat, Transport};

// Default per-RPC deadline.
pub const DFLT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

// Connection lifecycle of a session.
//
// Transitions never skip a state:
// Disconnected -> Connected -> Locked -> Connected -> Disconnected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(EnumAsInner)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Locked,
}

// One authenticated session to a managed device.
//
// All operations take `&mut self`, so a session is serialized by
// construction: a second in-flight RPC on the same session does not
// type-check. Callers needing parallelism open independent sessions to
// independent devices.
#[derive(Debug)]
pub struct Session<T: Transport> {
    pub(crate) transport: T,
    pub(crate) state: ConnectionState,
    pub(crate) timeout: Duration,
    pub(crate) facts: DeviceFacts,
    // Last known active configuration.
    pub(crate) running: ConfigTree,
    // Staged configuration, present only while changes are pending.
    pub(crate) candidate: Option<ConfigTree>,
    // Client-side mirror of the device commit history.
    pub(crate) history: CommitHistory,
    // Set while a confirmed commit awaits reconfirmation.
    pub(crate) pending_confirm: Option<PendingConfirm>,
}

// ===== impl Session =====

impl<T: Transport> Session<T> {
    // Opens the session: attaches the transport and primes the local view
    // of the device (facts, active configuration, commit history).
    pub async fn connect(mut transport: T) -> Result<Session<T>> {
        let timeout = DFLT_RPC_TIMEOUT;
        let facts = time::timeout(timeout, transport.open())
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        let running = time::timeout(timeout, transport.get_config())
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        let records = time::timeout(timeout, transport.history())
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        Debug::SessionConnect(&facts.hostname).log();

        let mut history = CommitHistory::default();
        history.replace(records);
        Ok(Session {
            transport,
            state: ConnectionState::Connected,
            timeout,
            facts,
            running,
            candidate: None,
            history,
            pending_confirm: None,
        })
    }

    // Closes the session. The lock must have been released first; the
    // state machine never skips a transition.
    pub async fn disconnect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => return Err(Error::SessionClosed),
            ConnectionState::Locked => return Err(Error::LockHeld),
            ConnectionState::Connected => (),
        }
        self.transport.close().await;
        self.state = ConnectionState::Disconnected;
        self.candidate = None;
        Debug::SessionDisconnect(&self.facts.hostname).log();
        Ok(())
    }

    // Acquires the exclusive configuration lock. Non-blocking: a lock held
    // elsewhere surfaces as a device denial, and a lock already held by
    // this session fails fast without touching the device.
    pub async fn lock(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if self.state.is_locked() {
            return Err(Error::AlreadyLocked);
        }
        time::timeout(self.timeout, self.transport.lock())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        self.state = ConnectionState::Locked;
        Debug::LockAcquire.log();
        Ok(())
    }

    // Releases the configuration lock. Releasing a lock that is not held
    // is an orchestration error and surfaces loudly.
    pub async fn unlock(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if !self.state.is_locked() {
            return Err(Error::NotLocked);
        }
        time::timeout(self.timeout, self.transport.unlock())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        self.state = ConnectionState::Connected;
        Debug::LockRelease.log();
        Ok(())
    }

    // Stages configuration content into the candidate. The candidate is
    // initialized from the last known active configuration on first load;
    // later loads merge over earlier ones in application order. The staged
    // set is only modified if the whole load succeeds.
    pub fn load(
        &mut self,
        content: &str,
        format: ConfigFormat,
        policy: MergePolicy,
    ) -> Result<()> {
        self.ensure_locked()?;
        let mut next = self
            .candidate
            .clone()
            .unwrap_or_else(|| self.running.clone());
        next.load(content, format, policy)?;
        self.candidate = Some(next);
        Debug::CandidateLoad(format, policy).log();
        Ok(())
    }

    // Drops the staged set without committing. Idempotent.
    pub fn discard(&mut self) -> Result<()> {
        self.ensure_locked()?;
        self.candidate = None;
        Debug::CandidateDiscard.log();
        Ok(())
    }

    // Changes pending against the device: the active configuration is
    // re-read and compared with the intended view (the candidate when one
    // is staged, the last known active configuration otherwise). An
    // out-of-band device change, such as a confirmed-commit reversion,
    // therefore shows up even with nothing staged. Does not modify any
    // session state.
    pub async fn diff(&mut self) -> Result<ConfigDiff> {
        self.ensure_connected()?;
        let active = time::timeout(self.timeout, self.transport.get_config())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        let intended = self.candidate.as_ref().unwrap_or(&self.running);
        Ok(ConfigDiff::compute(&active, intended))
    }

    // Changes made since the given rollback point: historical
    // configuration versus the active one.
    pub async fn diff_rollback(&mut self, index: usize) -> Result<ConfigDiff> {
        self.ensure_connected()?;
        if index >= COMMIT_HISTORY_DEPTH || index >= self.history.len() {
            return Err(Error::RollbackIndex(index));
        }
        let historical =
            time::timeout(self.timeout, self.transport.get_rollback(index))
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
        let active = time::timeout(self.timeout, self.transport.get_config())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        Ok(ConfigDiff::compute(&historical, &active))
    }

    // Read-only operational command. Independent of the lock and candidate
    // lifecycle; output reflects the active configuration only.
    pub async fn run_command(
        &mut self,
        command: &str,
        format: OutputFormat,
    ) -> Result<String> {
        self.ensure_connected()?;
        let output = time::timeout(
            self.timeout,
            self.transport.run_command(command, format),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(Error::command)?;
        Debug::CommandRun(command).log();
        Ok(output)
    }

    // Arbitrary RPC by name. Long-running requests may override the
    // session deadline for this call only.
    pub async fn execute_rpc(
        &mut self,
        name: &str,
        args: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.ensure_connected()?;
        let timeout = timeout.unwrap_or(self.timeout);
        let output =
            time::timeout(timeout, self.transport.execute_rpc(name, args))
                .await
                .map_err(|_| Error::Timeout(timeout))??;
        Debug::RpcRun(name).log();
        Ok(output)
    }

    pub fn facts(&self) -> &DeviceFacts {
        &self.facts
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_rpc_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    // Last known active configuration.
    pub fn running(&self) -> &ConfigTree {
        &self.running
    }

    // Staged configuration, if any.
    pub fn candidate(&self) -> Option<&ConfigTree> {
        self.candidate.as_ref()
    }

    pub fn history(&self) -> &CommitHistory {
        &self.history
    }

    pub fn pending_confirm(&self) -> Option<&PendingConfirm> {
        self.pending_confirm.as_ref()
    }

    // Direct transport access, primarily useful to adjust a test double
    // after the session has taken ownership of it.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if self.state.is_disconnected() {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    // Configuration-changing operations require the lock and never
    // acquire it implicitly.
    pub(crate) fn ensure_locked(&self) -> Result<()> {
        match self.state {
            ConnectionState::Locked => Ok(()),
            ConnectionState::Connected => Err(Error::NotLocked),
            ConnectionState::Disconnected => Err(Error::SessionClosed),
        }
    }
}
