//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use gantry_session::error::Error;
use serde::Serialize;
use serde_json::Value;

// Uniform result record returned by every state operation.
//
// The shape is stable across all operations so the orchestration layer can
// render success and failure the same way everywhere: `result` plus
// `comment` always reflect the outcome unambiguously, and `changes` carries
// the operation-specific payload (structured or raw text).
#[derive(Clone, Debug, Serialize)]
pub struct StateOutput {
    pub name: String,
    pub changes: Value,
    pub result: bool,
    pub comment: String,
}

// ===== impl StateOutput =====

impl StateOutput {
    pub(crate) fn success(name: &str, changes: Value) -> StateOutput {
        StateOutput {
            name: name.to_owned(),
            changes,
            result: true,
            comment: String::new(),
        }
    }

    pub(crate) fn failure(name: &str, error: &Error) -> StateOutput {
        error.log();
        StateOutput {
            name: name.to_owned(),
            changes: Value::Null,
            result: false,
            comment: error.to_string(),
        }
    }
}
