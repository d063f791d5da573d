//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use gantry_config::ConfigTree;
use tokio::time::Instant;

use crate::commit::{COMMIT_HISTORY_DEPTH, CommitOptions, CommitRecord};
use crate::transport::{
    DeviceFacts, OutputFormat, RpcError, RpcSeverity, Transport,
    TransportError,
};

// In-memory device used by the test suites.
//
// Implements the full transport surface against local state: an active
// configuration, an exclusive lock, a bounded rollback store and the
// confirmed-commit timer. The timer is evaluated lazily against the tokio
// clock on every RPC entry, so tests drive it with a paused clock and
// `tokio::time::advance`.
#[derive(Debug)]
pub struct StubDevice {
    facts: DeviceFacts,
    open: bool,
    locked: bool,
    running: ConfigTree,
    // Commit history, most recent first, paired with the configuration
    // each commit made active.
    rollbacks: VecDeque<(CommitRecord, ConfigTree)>,
    next_commit_id: u32,
    pending: Option<PendingRevert>,
    // Validation hook: any rendered configuration containing this text is
    // refused by validate/commit.
    deny_rule: Option<String>,
    command_replies: BTreeMap<String, String>,
    rpc_replies: BTreeMap<String, String>,
    // Artificial per-RPC latency, for deadline tests.
    rpc_delay: Option<Duration>,
}

#[derive(Debug)]
struct PendingRevert {
    deadline: Instant,
    prior: ConfigTree,
}

// ===== impl StubDevice =====

impl StubDevice {
    pub fn new(hostname: &str, running: ConfigTree) -> StubDevice {
        let facts = DeviceFacts::new(
            hostname.to_owned(),
            "gx9000".to_owned(),
            "24.2R1".to_owned(),
        );

        let mut command_replies = BTreeMap::new();
        command_replies.insert(
            "show version".to_owned(),
            format!(
                "Hostname: {}\nModel: {}\nOS release: {}",
                facts.hostname, facts.model, facts.version
            ),
        );

        let mut rpc_replies = BTreeMap::new();
        rpc_replies.insert(
            "request-reboot".to_owned(),
            "Reboot initiated".to_owned(),
        );
        rpc_replies.insert(
            "request-power-off".to_owned(),
            "Shutdown initiated".to_owned(),
        );
        rpc_replies.insert(
            "request-system-zeroize".to_owned(),
            "Zeroize initiated, device will reset to factory defaults"
                .to_owned(),
        );

        let initial = CommitRecord::new(
            1,
            Utc::now(),
            "initial configuration".to_owned(),
            None,
        );
        let mut rollbacks = VecDeque::new();
        rollbacks.push_front((initial, running.clone()));

        StubDevice {
            facts,
            open: false,
            locked: false,
            running,
            rollbacks,
            next_commit_id: 2,
            pending: None,
            deny_rule: None,
            command_replies,
            rpc_replies,
            rpc_delay: None,
        }
    }

    pub fn with_deny_rule(mut self, rule: &str) -> StubDevice {
        self.deny_rule = Some(rule.to_owned());
        self
    }

    pub fn set_deny_rule(&mut self, rule: Option<&str>) {
        self.deny_rule = rule.map(str::to_owned);
    }

    pub fn set_rpc_delay(&mut self, delay: Option<Duration>) {
        self.rpc_delay = delay;
    }

    pub fn insert_command_reply(&mut self, command: &str, reply: &str) {
        self.command_replies
            .insert(command.to_owned(), reply.to_owned());
    }

    pub fn insert_rpc_reply(&mut self, name: &str, reply: &str) {
        self.rpc_replies.insert(name.to_owned(), reply.to_owned());
    }

    pub fn running_config(&self) -> &ConfigTree {
        &self.running
    }

    pub fn confirm_pending(&self) -> bool {
        self.pending.is_some()
    }

    async fn delay(&self) {
        if let Some(delay) = self.rpc_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    // Expires the confirmed-commit timer if its deadline has passed,
    // reverting to the prior configuration and recording the reversion as
    // a commit of its own.
    fn tick(&mut self) {
        let expired = matches!(&self.pending,
            Some(pending) if Instant::now() >= pending.deadline);
        if expired {
            let pending = self.pending.take().unwrap();
            self.running = pending.prior;
            let record = CommitRecord::new(
                self.next_commit_id,
                Utc::now(),
                "confirmed commit rollback".to_owned(),
                None,
            );
            self.next_commit_id += 1;
            self.rollbacks.push_front((record, self.running.clone()));
            self.rollbacks.truncate(COMMIT_HISTORY_DEPTH);
        }
    }

    fn check_config(&self, config: &ConfigTree) -> Result<(), TransportError> {
        if let Some(rule) = &self.deny_rule
            && config.to_text().contains(rule.as_str())
        {
            return Err(rpc_error(
                "operation-failed",
                format!("configuration check-out failed: {}", rule),
            ));
        }
        Ok(())
    }
}

impl Transport for StubDevice {
    async fn open(&mut self) -> Result<DeviceFacts, TransportError> {
        self.delay().await;
        self.open = true;
        Ok(self.facts.clone())
    }

    async fn close(&mut self) {
        self.open = false;
        self.locked = false;
    }

    async fn lock(&mut self) -> Result<(), TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        if self.locked {
            return Err(rpc_error(
                "lock-denied",
                "configuration database locked",
            ));
        }
        self.locked = true;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        if !self.locked {
            return Err(rpc_error(
                "operation-failed",
                "configuration database not locked",
            ));
        }
        self.locked = false;
        Ok(())
    }

    async fn get_config(&mut self) -> Result<ConfigTree, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        Ok(self.running.clone())
    }

    async fn get_rollback(
        &mut self,
        index: usize,
    ) -> Result<ConfigTree, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        self.rollbacks
            .get(index)
            .map(|(_, config)| config.clone())
            .ok_or_else(|| {
                rpc_error(
                    "bad-element",
                    format!("invalid rollback index {}", index),
                )
            })
    }

    async fn history(&mut self) -> Result<Vec<CommitRecord>, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        Ok(self
            .rollbacks
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn validate(
        &mut self,
        config: &ConfigTree,
    ) -> Result<(), TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        self.check_config(config)
    }

    async fn commit(
        &mut self,
        config: &ConfigTree,
        options: &CommitOptions,
    ) -> Result<CommitRecord, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        if !self.locked {
            return Err(rpc_error(
                "access-denied",
                "configuration database not locked",
            ));
        }
        self.check_config(config)?;

        let confirm_deadline = (options.confirm_minutes > 0).then(|| {
            Utc::now() + chrono::Duration::minutes(options.confirm_minutes as i64)
        });
        let record = CommitRecord::new(
            self.next_commit_id,
            Utc::now(),
            options.comment.clone().unwrap_or_default(),
            confirm_deadline,
        );
        self.next_commit_id += 1;

        let prior = std::mem::replace(&mut self.running, config.clone());
        // A new confirm timer replaces any pending one; a plain commit
        // cancels it (the commit is itself the confirmation).
        self.pending = (options.confirm_minutes > 0).then(|| PendingRevert {
            deadline: Instant::now()
                + Duration::from_secs(options.confirm_minutes as u64 * 60),
            prior,
        });
        self.rollbacks.push_front((record.clone(), self.running.clone()));
        self.rollbacks.truncate(COMMIT_HISTORY_DEPTH);
        Ok(record)
    }

    async fn confirm(&mut self) -> Result<(), TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        match self.pending.take() {
            Some(_) => Ok(()),
            None => Err(rpc_error(
                "operation-failed",
                "no confirmed commit in progress",
            )),
        }
    }

    async fn run_command(
        &mut self,
        command: &str,
        format: OutputFormat,
    ) -> Result<String, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        match self.command_replies.get(command) {
            Some(reply) => Ok(match format {
                OutputFormat::Text => reply.clone(),
                OutputFormat::Xml => format!("<output>{}</output>", reply),
            }),
            None => Err(rpc_error(
                "unknown-command",
                format!("unknown command: {}", command),
            )),
        }
    }

    async fn execute_rpc(
        &mut self,
        name: &str,
        _args: &[(String, String)],
    ) -> Result<String, TransportError> {
        self.delay().await;
        self.ensure_open()?;
        self.tick();
        match self.rpc_replies.get(name) {
            Some(reply) => Ok(reply.clone()),
            None => Err(rpc_error(
                "operation-not-supported",
                format!("unknown RPC: {}", name),
            )),
        }
    }
}

// ===== helper functions =====

fn rpc_error(tag: &str, message: impl Into<String>) -> TransportError {
    TransportError::Rpc(RpcError::new(
        RpcSeverity::Error,
        tag.to_owned(),
        message.into(),
    ))
}
