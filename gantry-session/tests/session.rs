//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use gantry_config::tree::{ConfigFormat, ConfigTree, MergePolicy};
use gantry_session::commit::CommitOptions;
use gantry_session::error::Error;
use gantry_session::session::Session;
use gantry_session::stub::StubDevice;
use tokio::time;

//
// Helper functions.
//

const BASE_CONFIG: &str = "\
system {
    host-name gx1;
    location lab-2;
    services {
        ssh;
    }
}
interfaces {
    lo0 {
        unit 0;
    }
}
";

fn base_tree() -> ConfigTree {
    ConfigTree::parse(BASE_CONFIG, ConfigFormat::Text).unwrap()
}

async fn connect() -> Session<StubDevice> {
    Session::connect(StubDevice::new("gx1", base_tree()))
        .await
        .unwrap()
}

async fn connect_with(device: StubDevice) -> Session<StubDevice> {
    Session::connect(device).await.unwrap()
}

fn commit_options(comment: &str, confirm_minutes: u32) -> CommitOptions {
    CommitOptions {
        comment: Some(comment.to_owned()),
        confirm_minutes,
        ..Default::default()
    }
}

//
// Tests.
//

#[tokio::test]
async fn lock_state_machine() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    assert!(matches!(
        session.lock().await.unwrap_err(),
        Error::AlreadyLocked
    ));
    // The failed second acquire left the original lock intact.
    assert!(session.state().is_locked());
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();

    session.discard().unwrap();
    session.unlock().await.unwrap();
    assert!(matches!(
        session.unlock().await.unwrap_err(),
        Error::NotLocked
    ));
}

#[tokio::test]
async fn change_operations_require_lock() {
    let mut session = connect().await;

    assert!(matches!(
        session
            .load("set system host-name gx2", ConfigFormat::SetCommands,
                MergePolicy::Merge)
            .unwrap_err(),
        Error::NotLocked
    ));
    assert!(matches!(session.discard().unwrap_err(), Error::NotLocked));
    assert!(matches!(
        session.rollback(0).await.unwrap_err(),
        Error::NotLocked
    ));
    assert!(matches!(
        session.commit(&CommitOptions::default()).await.unwrap_err(),
        Error::NotLocked
    ));
}

#[tokio::test]
async fn hostname_change_scenario() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    session.commit_check().await.unwrap();

    let record = session
        .commit(&commit_options("hostname change", 0))
        .await
        .unwrap()
        .expect("commit record");
    assert_eq!(session.history().newest().unwrap().id, record.id);
    assert_eq!(session.running().leaf_value(&["system", "host-name"]),
        Some("gx2"));

    session.unlock().await.unwrap();
    assert!(session.diff().await.unwrap().is_empty());
}

#[tokio::test]
async fn discard_leaves_active_unchanged() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    session
        .load("set system location lab-9", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    assert!(!session.diff().await.unwrap().is_empty());

    session.discard().unwrap();
    assert!(session.diff().await.unwrap().is_empty());
    // Discard is idempotent.
    session.discard().unwrap();
    session.unlock().await.unwrap();
}

#[tokio::test]
async fn empty_commit_is_a_noop() {
    let mut session = connect().await;
    let depth_before = session.history().len();

    session.lock().await.unwrap();
    assert!(session.commit(&CommitOptions::default()).await.unwrap().is_none());

    // Staging content identical to the active configuration is also a
    // no-op: no record is fabricated.
    session
        .load(BASE_CONFIG, ConfigFormat::Text, MergePolicy::Overwrite)
        .unwrap();
    assert!(session.commit(&CommitOptions::default()).await.unwrap().is_none());

    assert_eq!(session.history().len(), depth_before);
    session.unlock().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn confirmed_commit_reverts_on_expiry() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    session
        .commit(&commit_options("risky change", 5))
        .await
        .unwrap()
        .expect("commit record");
    assert!(session.pending_confirm().is_some());

    // No reconfirmation arrives before the deadline.
    time::advance(Duration::from_secs(5 * 60 + 1)).await;

    // The reversion is visible as a pending difference against the
    // client's last known configuration.
    let diff = session.diff().await.unwrap();
    assert!(!diff.is_empty());

    // Re-reading the device state reconciles the client view: the pending
    // marker is dropped and the reversion shows up as a commit record.
    session.resync().await.unwrap();
    assert!(session.pending_confirm().is_none());
    assert_eq!(
        session.history().newest().unwrap().comment,
        "confirmed commit rollback"
    );
    assert_eq!(
        session.running().leaf_value(&["system", "host-name"]),
        Some("gx1")
    );

    session.unlock().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn confirmed_commit_reconfirmation() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    session
        .commit(&commit_options("risky change", 5))
        .await
        .unwrap()
        .expect("commit record");

    // An empty commit while a confirmed commit is pending sends the
    // reconfirmation; it still produces no new record.
    let depth = session.history().len();
    assert!(session.commit(&CommitOptions::default()).await.unwrap().is_none());
    assert!(session.pending_confirm().is_none());
    assert!(!session.transport_mut().confirm_pending());
    assert_eq!(session.history().len(), depth);

    // The deadline passing no longer reverts anything.
    time::advance(Duration::from_secs(10 * 60)).await;
    assert!(session.diff().await.unwrap().is_empty());
    assert_eq!(
        session.running().leaf_value(&["system", "host-name"]),
        Some("gx2")
    );

    session.unlock().await.unwrap();
}

#[tokio::test]
async fn rollback_round_trip() {
    let mut session = connect().await;
    let before = session.running().clone();

    session.lock().await.unwrap();
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    session
        .commit(&commit_options("hostname change", 0))
        .await
        .unwrap()
        .expect("commit record");

    // Rollback stages the previous configuration but activates nothing.
    session.rollback(1).await.unwrap();
    assert_eq!(session.candidate(), Some(&before));
    assert_eq!(
        session.running().leaf_value(&["system", "host-name"]),
        Some("gx2")
    );

    // Only the explicit commit makes it active again.
    session
        .commit(&commit_options("revert hostname", 0))
        .await
        .unwrap()
        .expect("commit record");
    assert!(session.diff().await.unwrap().is_empty());
    assert_eq!(session.running(), &before);
    assert!(session.diff_rollback(0).await.unwrap().is_empty());

    session.unlock().await.unwrap();
}

#[tokio::test]
async fn rollback_index_validation() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    // Beyond the addressable window.
    assert!(matches!(
        session.rollback(50).await.unwrap_err(),
        Error::RollbackIndex(50)
    ));
    // Inside the window but beyond the recorded history.
    let len = session.history().len();
    assert!(matches!(
        session.rollback(len).await.unwrap_err(),
        Error::RollbackIndex(..)
    ));
    session.unlock().await.unwrap();
}

#[tokio::test]
async fn history_is_bounded() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    for i in 0..55 {
        session
            .load(
                &format!("set system location site-{}", i),
                ConfigFormat::SetCommands,
                MergePolicy::Merge,
            )
            .unwrap();
        session
            .commit(&commit_options(&format!("move {}", i), 0))
            .await
            .unwrap()
            .expect("commit record");
    }
    session.unlock().await.unwrap();

    assert_eq!(session.history().len(), 50);
    // The oldest records were evicted first.
    assert!(
        session
            .history()
            .iter()
            .all(|record| record.comment != "initial configuration")
    );
    assert_eq!(session.history().newest().unwrap().comment, "move 54");
}

#[tokio::test]
async fn validation_failure_keeps_staged_set() {
    let device =
        StubDevice::new("gx1", base_tree()).with_deny_rule("forbidden-site");
    let mut session = connect_with(device).await;

    session.lock().await.unwrap();
    session
        .load("set system location forbidden-site",
            ConfigFormat::SetCommands, MergePolicy::Merge)
        .unwrap();

    assert!(matches!(
        session.commit_check().await.unwrap_err(),
        Error::Validation(..)
    ));
    // The staged set remains for correction.
    assert!(session.candidate().is_some());

    assert!(matches!(
        session.commit(&CommitOptions::default()).await.unwrap_err(),
        Error::Commit(..)
    ));
    assert!(session.candidate().is_some());

    // Correct the input and commit.
    session.discard().unwrap();
    session
        .load("set system location lab-3", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    session.commit_check().await.unwrap();
    session
        .commit(&CommitOptions::default())
        .await
        .unwrap()
        .expect("commit record");
    session.unlock().await.unwrap();
}

#[tokio::test]
async fn load_rejects_mislabeled_content() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    let error = session
        .load("<configuration/>", ConfigFormat::Text, MergePolicy::Merge)
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Config(gantry_config::Error::FormatMismatch(..))
    ));
    // Nothing was staged.
    assert!(session.candidate().is_none());
    session.unlock().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_lock_state_unchanged() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    session.set_rpc_timeout(Duration::from_secs(1));
    session.transport_mut().set_rpc_delay(Some(Duration::from_secs(5)));

    assert!(matches!(
        session
            .run_command("show version", Default::default())
            .await
            .unwrap_err(),
        Error::Timeout(..)
    ));
    // The lock is not auto-released; recovery is the caller's decision.
    assert!(session.state().is_locked());

    session.transport_mut().set_rpc_delay(None);
    session.unlock().await.unwrap();
}

#[tokio::test]
async fn operational_commands_ignore_candidate_state() {
    let mut session = connect().await;

    // Works without the lock.
    let output = session
        .run_command("show version", Default::default())
        .await
        .unwrap();
    assert!(output.contains("gx9000"));

    // Works with the lock held and changes staged.
    session.lock().await.unwrap();
    session
        .load("set system host-name gx2", ConfigFormat::SetCommands,
            MergePolicy::Merge)
        .unwrap();
    let output = session
        .run_command("show version", gantry_session::transport::OutputFormat::Xml)
        .await
        .unwrap();
    assert!(output.starts_with("<output>"));

    // Unknown commands surface the device error.
    assert!(matches!(
        session
            .run_command("show bogus", Default::default())
            .await
            .unwrap_err(),
        Error::Command(..)
    ));

    session.discard().unwrap();
    session.unlock().await.unwrap();
}

#[tokio::test]
async fn disconnect_requires_released_lock() {
    let mut session = connect().await;

    session.lock().await.unwrap();
    assert!(matches!(
        session.disconnect().await.unwrap_err(),
        Error::LockHeld
    ));

    session.unlock().await.unwrap();
    session.disconnect().await.unwrap();

    assert!(matches!(
        session
            .run_command("show version", Default::default())
            .await
            .unwrap_err(),
        Error::SessionClosed
    ));
    assert!(matches!(
        session.disconnect().await.unwrap_err(),
        Error::SessionClosed
    ));
}
