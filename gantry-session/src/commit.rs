//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::time;

use crate::debug::Debug;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::Transport;

// Number of commit records the device retains. Rollback indices address
// this window: index 0 is the currently active configuration.
pub const COMMIT_HISTORY_DEPTH: usize = 50;

// One successful commit.
#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct CommitRecord {
    // Device-assigned identifier.
    pub id: u32,

    // Date and time for when the commit occurred.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,

    // Optional comment for the commit.
    pub comment: String,

    // Deadline of the confirm timer, when one was armed.
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub confirm_deadline: Option<DateTime<Utc>>,
}

// Commit request parameters.
#[derive(Clone, Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct CommitOptions {
    pub comment: Option<String>,
    // Arms the device confirm timer when non-zero: unless the commit is
    // reconfirmed within this many minutes, the device reverts to the
    // previous configuration on its own.
    pub confirm_minutes: u32,
    // Ask every device daemon to re-evaluate the new configuration.
    pub full: bool,
    // On redundant control planes, synchronize and commit on both.
    pub sync: bool,
}

// Client-side mirror of the device commit history, most recent first.
#[derive(Clone, Debug, Default)]
pub struct CommitHistory {
    records: VecDeque<CommitRecord>,
}

// Marker for a commit whose confirm timer is still running on the device.
// The device owns the timer; this is only the client's record of it.
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct PendingConfirm {
    pub commit_id: u32,
    pub confirm_minutes: u32,
    pub armed_at: DateTime<Utc>,
}

// ===== impl CommitHistory =====

impl CommitHistory {
    pub(crate) fn push(&mut self, record: CommitRecord) {
        self.records.push_front(record);
        self.records.truncate(COMMIT_HISTORY_DEPTH);
    }

    pub(crate) fn replace(&mut self, records: Vec<CommitRecord>) {
        self.records =
            records.into_iter().take(COMMIT_HISTORY_DEPTH).collect();
    }

    pub fn get(&self, index: usize) -> Option<&CommitRecord> {
        self.records.get(index)
    }

    pub fn newest(&self) -> Option<&CommitRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitRecord> {
        self.records.iter()
    }
}

// ===== impl Session (commit controller) =====

impl<T: Transport> Session<T> {
    // Validates the staged set against the device without consuming it.
    // When nothing is staged the active configuration is validated
    // instead. Callable at any connected state; a failure leaves the
    // staged set in place for correction.
    pub async fn commit_check(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let config = self.candidate.as_ref().unwrap_or(&self.running);
        time::timeout(self.timeout, self.transport.validate(config))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(Error::validation)
    }

    // Commits the staged set.
    //
    // A commit with no effective changes returns `Ok(None)` without
    // fabricating a record; when a confirmed commit is pending, the same
    // call sends the reconfirmation instead. On success the staged set is
    // cleared, the new record enters the mirror history at index 0, and a
    // non-zero confirm timer arms the pending marker.
    //
    // A rejected commit leaves the staged set untouched; whether the
    // device kept partial state is device-defined, so callers reconcile
    // via `diff` before retrying.
    pub async fn commit(
        &mut self,
        options: &CommitOptions,
    ) -> Result<Option<CommitRecord>> {
        self.ensure_locked()?;

        let unchanged = match &self.candidate {
            None => true,
            Some(candidate) => *candidate == self.running,
        };
        if unchanged {
            if self.pending_confirm.is_some() {
                time::timeout(self.timeout, self.transport.confirm())
                    .await
                    .map_err(|_| Error::Timeout(self.timeout))?
                    .map_err(Error::commit)?;
                let pending = self.pending_confirm.take().unwrap();
                Debug::CommitConfirmed(pending.commit_id).log();
            } else {
                Debug::CommitNoChanges.log();
            }
            self.candidate = None;
            return Ok(None);
        }

        let candidate = self.candidate.clone().unwrap();
        let record = time::timeout(
            self.timeout,
            self.transport.commit(&candidate, options),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(Error::commit)?;

        self.running = candidate;
        self.candidate = None;
        // Any successful commit doubles as the reconfirmation of a
        // previous confirmed commit.
        self.pending_confirm = (options.confirm_minutes > 0).then(|| {
            PendingConfirm::new(
                record.id,
                options.confirm_minutes,
                record.date,
            )
        });
        self.history.push(record.clone());
        Debug::CommitSuccess(record.id, options.confirm_minutes).log();
        Ok(Some(record))
    }

    // Stages the historical configuration at `index` as the candidate.
    // Nothing becomes active until an explicit `commit`; rollback and
    // activation are deliberately separate steps.
    pub async fn rollback(&mut self, index: usize) -> Result<()> {
        self.ensure_locked()?;
        if index >= COMMIT_HISTORY_DEPTH || index >= self.history.len() {
            return Err(Error::RollbackIndex(index));
        }
        let config =
            time::timeout(self.timeout, self.transport.get_rollback(index))
                .await
                .map_err(|_| Error::Timeout(self.timeout))??;
        self.candidate = Some(config);
        Debug::RollbackStage(index).log();
        Ok(())
    }

    // Re-reads the active configuration and commit history from the
    // device. The device-side confirm timer is invisible to the client
    // except through such re-reads: when the newest device record no
    // longer matches the pending confirmed commit, the device superseded
    // it (reverted) and the marker is dropped.
    pub async fn resync(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let running = time::timeout(self.timeout, self.transport.get_config())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        let records = time::timeout(self.timeout, self.transport.history())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        if let Some(pending) = &self.pending_confirm
            && records.first().map(|record| record.id)
                != Some(pending.commit_id)
        {
            Debug::ConfirmSuperseded(pending.commit_id).log();
            self.pending_confirm = None;
        }
        self.running = running;
        self.history.replace(records);
        Debug::Resync.log();
        Ok(())
    }
}
