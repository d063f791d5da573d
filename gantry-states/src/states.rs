//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use gantry_config::{ConfigFormat, MergePolicy};
use gantry_session::commit::{CommitOptions, CommitRecord};
use gantry_session::error::Result;
use gantry_session::session::Session;
use gantry_session::transport::{OutputFormat, Transport};
use serde_json::{Value, json};

use crate::output::StateOutput;

// Each operation describes one desired device state and reports the
// outcome through the uniform result record. Operations never fail with
// an error value: failures fold into `result = false` plus a comment.
//
// `name` is the symbolic resource name supplied by the orchestration
// layer; it is echoed back verbatim. Operations that take configuration
// content receive it fully materialized (file resolution and templating
// happen upstream) along with the declared format.

// Executes an RPC by name and reports the raw reply. A timeout can be
// supplied for requests known to run long.
pub async fn rpc<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    rpc_name: &str,
    args: &[(String, String)],
    timeout: Option<Duration>,
) -> StateOutput {
    match session.execute_rpc(rpc_name, args, timeout).await {
        Ok(reply) => StateOutput::success(name, json!({ "rpc_reply": reply })),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Executes an operational CLI command.
pub async fn cli<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    command: &str,
    format: OutputFormat,
) -> StateOutput {
    match session.run_command(command, format).await {
        Ok(output) => StateOutput::success(name, json!({ "message": output })),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Reports pending changes, or the changes made since a rollback point
// when an index is given.
pub async fn diff<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    index: Option<usize>,
) -> StateOutput {
    let result = match index {
        Some(index) => session.diff_rollback(index).await,
        None => session.diff().await,
    };
    match result {
        Ok(diff) => {
            StateOutput::success(name, json!({ "diff": diff.to_string() }))
        }
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Acquires the exclusive configuration lock. Callers pairing lock with
// unlock must ensure the unlock runs in the same orchestration sequence.
pub async fn lock<T: Transport>(
    session: &mut Session<T>,
    name: &str,
) -> StateOutput {
    match session.lock().await {
        Ok(()) => StateOutput::success(
            name,
            json!({ "message": "configuration locked" }),
        ),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Releases the configuration lock.
pub async fn unlock<T: Transport>(
    session: &mut Session<T>,
    name: &str,
) -> StateOutput {
    match session.unlock().await {
        Ok(()) => StateOutput::success(
            name,
            json!({ "message": "configuration unlocked" }),
        ),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Stages configuration content into the candidate without committing.
pub async fn load<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    content: &str,
    format: ConfigFormat,
    policy: MergePolicy,
) -> StateOutput {
    match session.load(content, format, policy) {
        Ok(()) => StateOutput::success(
            name,
            json!({ "message": "configuration staged" }),
        ),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Validates the staged configuration without applying it.
pub async fn commit_check<T: Transport>(
    session: &mut Session<T>,
    name: &str,
) -> StateOutput {
    match session.commit_check().await {
        Ok(()) => StateOutput::success(name, json!({ "check": true })),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Commits the staged configuration.
pub async fn commit<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    options: &CommitOptions,
) -> StateOutput {
    match session.commit(options).await {
        Ok(Some(record)) => StateOutput::success(name, record_value(&record)),
        Ok(None) => StateOutput::success(
            name,
            json!({ "message": "no changes to commit" }),
        ),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Stages the historical configuration at `index` and commits it, under a
// scoped lock.
pub async fn rollback<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    index: usize,
    options: &CommitOptions,
) -> StateOutput {
    if let Err(error) = session.lock().await {
        return StateOutput::failure(name, &error);
    }
    let changes = rollback_locked(session, index, options).await;
    if changes.is_err() {
        let _ = session.discard();
    }
    let unlocked = session.unlock().await;

    match (changes, unlocked) {
        (Err(error), _) => StateOutput::failure(name, &error),
        (Ok(_), Err(error)) => StateOutput::failure(name, &error),
        (Ok(changes), Ok(())) => StateOutput::success(name, changes),
    }
}

// Changes the device hostname.
pub async fn set_hostname<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    hostname: &str,
    options: &CommitOptions,
) -> StateOutput {
    let content = format!("set system host-name {}", hostname);
    install_config(
        session,
        name,
        &content,
        ConfigFormat::SetCommands,
        MergePolicy::Merge,
        options,
    )
    .await
}

// Loads and commits the given configuration.
//
// The whole change sequence runs under a scoped lock which is released on
// every exit path; a failed load or commit additionally discards whatever
// was staged so no half-applied candidate survives the operation.
pub async fn install_config<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    content: &str,
    format: ConfigFormat,
    policy: MergePolicy,
    options: &CommitOptions,
) -> StateOutput {
    if let Err(error) = session.lock().await {
        return StateOutput::failure(name, &error);
    }
    let changes =
        install_config_locked(session, content, format, policy, options).await;
    if changes.is_err() {
        let _ = session.discard();
    }
    let unlocked = session.unlock().await;

    match (changes, unlocked) {
        (Err(error), _) => StateOutput::failure(name, &error),
        (Ok(_), Err(error)) => StateOutput::failure(name, &error),
        (Ok(changes), Ok(())) => StateOutput::success(name, changes),
    }
}

// Powers the device off, or reboots it.
pub async fn shutdown<T: Transport>(
    session: &mut Session<T>,
    name: &str,
    reboot: bool,
    in_minutes: u32,
) -> StateOutput {
    let rpc_name = if reboot { "request-reboot" } else { "request-power-off" };
    let args = [("in".to_owned(), in_minutes.to_string())];
    match session.execute_rpc(rpc_name, &args, None).await {
        Ok(reply) => StateOutput::success(name, json!({ "message": reply })),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// Resets the device to factory defaults.
pub async fn zeroize<T: Transport>(
    session: &mut Session<T>,
    name: &str,
) -> StateOutput {
    match session.execute_rpc("request-system-zeroize", &[], None).await {
        Ok(reply) => StateOutput::success(name, json!({ "message": reply })),
        Err(error) => StateOutput::failure(name, &error),
    }
}

// ===== helper functions =====

async fn install_config_locked<T: Transport>(
    session: &mut Session<T>,
    content: &str,
    format: ConfigFormat,
    policy: MergePolicy,
    options: &CommitOptions,
) -> Result<Value> {
    session.load(content, format, policy)?;
    let diff = session.diff().await?;
    session.commit_check().await?;
    let record = session.commit(options).await?;
    Ok(json!({
        "diff": diff.to_string(),
        "commit": record.as_ref().map(record_value),
    }))
}

async fn rollback_locked<T: Transport>(
    session: &mut Session<T>,
    index: usize,
    options: &CommitOptions,
) -> Result<Value> {
    session.rollback(index).await?;
    let diff = session.diff().await?;
    let record = session.commit(options).await?;
    Ok(json!({
        "diff": diff.to_string(),
        "commit": record.as_ref().map(record_value),
    }))
}

fn record_value(record: &CommitRecord) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}
