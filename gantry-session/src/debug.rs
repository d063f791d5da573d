//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use gantry_config::{ConfigFormat, MergePolicy};
use tracing::{debug, debug_span};

// Session debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    SessionConnect(&'a str),
    SessionDisconnect(&'a str),
    LockAcquire,
    LockRelease,
    CandidateLoad(ConfigFormat, MergePolicy),
    CandidateDiscard,
    CommitNoChanges,
    CommitSuccess(u32, u32),
    CommitConfirmed(u32),
    ConfirmSuperseded(u32),
    RollbackStage(usize),
    CommandRun(&'a str),
    RpcRun(&'a str),
    Resync,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::SessionConnect(hostname)
            | Debug::SessionDisconnect(hostname) => {
                debug_span!("session", %hostname).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::LockAcquire
            | Debug::LockRelease
            | Debug::CandidateDiscard
            | Debug::CommitNoChanges
            | Debug::Resync => {
                debug_span!("session").in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::CandidateLoad(format, policy) => {
                debug_span!("session").in_scope(|| {
                    debug!(%format, ?policy, "{}", self);
                });
            }
            Debug::CommitSuccess(commit_id, confirm_minutes) => {
                debug_span!("session").in_scope(|| {
                    debug!(%commit_id, %confirm_minutes, "{}", self);
                });
            }
            Debug::CommitConfirmed(commit_id)
            | Debug::ConfirmSuperseded(commit_id) => {
                debug_span!("session").in_scope(|| {
                    debug!(%commit_id, "{}", self);
                });
            }
            Debug::RollbackStage(index) => {
                debug_span!("session").in_scope(|| {
                    debug!(%index, "{}", self);
                });
            }
            Debug::CommandRun(command) => {
                debug_span!("session").in_scope(|| {
                    debug!(%command, "{}", self);
                });
            }
            Debug::RpcRun(name) => {
                debug_span!("session").in_scope(|| {
                    debug!(%name, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SessionConnect(..) => {
                write!(f, "session connected")
            }
            Debug::SessionDisconnect(..) => {
                write!(f, "session disconnected")
            }
            Debug::LockAcquire => {
                write!(f, "configuration lock acquired")
            }
            Debug::LockRelease => {
                write!(f, "configuration lock released")
            }
            Debug::CandidateLoad(..) => {
                write!(f, "configuration loaded into candidate")
            }
            Debug::CandidateDiscard => {
                write!(f, "candidate configuration discarded")
            }
            Debug::CommitNoChanges => {
                write!(f, "no changes to commit")
            }
            Debug::CommitSuccess(..) => {
                write!(f, "configuration committed")
            }
            Debug::CommitConfirmed(..) => {
                write!(f, "commit confirmation accepted")
            }
            Debug::ConfirmSuperseded(..) => {
                write!(f, "pending confirmed commit superseded by the device")
            }
            Debug::RollbackStage(..) => {
                write!(f, "rollback configuration staged")
            }
            Debug::CommandRun(..) => {
                write!(f, "operational command executed")
            }
            Debug::RpcRun(..) => {
                write!(f, "RPC executed")
            }
            Debug::Resync => {
                write!(f, "session resynchronized")
            }
        }
    }
}
