//
// Copyright (c) The Gantry Core Contributors
//
// SPDX-License-Identifier: MIT
//

use gantry_config::{ConfigFormat, MergePolicy};
use gantry_session::commit::CommitOptions;
use gantry_session::session::Session;
use gantry_session::stub::StubDevice;
use gantry_session::transport::OutputFormat;
use gantry_states::states;

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
";

fn base_device() -> StubDevice {
    let tree = gantry_config::ConfigTree::parse(BASE_CONFIG, ConfigFormat::Text)
        .unwrap();
    StubDevice::new("gx1", tree)
}

async fn connect() -> Session<StubDevice> {
    Session::connect(base_device()).await.unwrap()
}

async fn connect_with(device: StubDevice) -> Session<StubDevice> {
    Session::connect(device).await.unwrap()
}

//
// Tests.
//

#[tokio::test]
async fn failure_produces_uniform_record() {
    let mut session = connect().await;

    // Loading without the lock is an orchestration error; it must fold
    // into the record, not surface as a failure value.
    let output = states::load(
        &mut session,
        "stage interface config",
        "set interfaces lo0 unit 1",
        ConfigFormat::SetCommands,
        MergePolicy::Merge,
    )
    .await;
    assert_eq!(output.name, "stage interface config");
    assert!(!output.result);
    assert!(output.comment.contains("lock"));
    assert!(output.changes.is_null());
}

#[tokio::test]
async fn output_serializes_to_stable_shape() {
    let mut session = connect().await;

    let output =
        states::cli(&mut session, "show version", "show version",
            OutputFormat::Text)
        .await;
    let value = serde_json::to_value(&output).unwrap();
    assert!(value.get("name").is_some());
    assert!(value.get("changes").is_some());
    assert!(value.get("result").is_some());
    assert!(value.get("comment").is_some());
}

#[tokio::test]
async fn set_hostname_commits_and_releases_lock() {
    let mut session = connect().await;

    let output = states::set_hostname(
        &mut session,
        "device name",
        "gx7",
        &CommitOptions::default(),
    )
    .await;
    assert!(output.result, "unexpected failure: {}", output.comment);
    assert!(
        output.changes["diff"]
            .as_str()
            .unwrap()
            .contains("host-name")
    );
    assert_eq!(
        session.running().leaf_value(&["system", "host-name"]),
        Some("gx7")
    );

    // The scoped lock was released: acquiring it again succeeds.
    assert!(states::lock(&mut session, "lock the config").await.result);
    assert!(states::unlock(&mut session, "unlock the config").await.result);
}

#[tokio::test]
async fn install_config_reports_diff_and_record() {
    let mut session = connect().await;

    let output = states::install_config(
        &mut session,
        "install the mentioned config",
        "set system location lab-7",
        ConfigFormat::SetCommands,
        MergePolicy::Merge,
        &CommitOptions {
            comment: Some("relocate".to_owned()),
            ..Default::default()
        },
    )
    .await;
    assert!(output.result, "unexpected failure: {}", output.comment);
    assert!(output.changes["diff"].as_str().unwrap().contains("lab-7"));
    assert_eq!(output.changes["commit"]["comment"], "relocate");
}

#[tokio::test]
async fn install_config_releases_lock_on_failure() {
    let device = base_device().with_deny_rule("forbidden-site");
    let mut session = connect_with(device).await;

    let output = states::install_config(
        &mut session,
        "install the mentioned config",
        "set system location forbidden-site",
        ConfigFormat::SetCommands,
        MergePolicy::Merge,
        &CommitOptions::default(),
    )
    .await;
    assert!(!output.result);
    assert!(output.comment.contains("check"));

    // The lock was released on the error path and nothing stayed staged.
    assert!(session.candidate().is_none());
    assert!(states::lock(&mut session, "lock the config").await.result);
    assert!(states::unlock(&mut session, "unlock the config").await.result);
}

#[tokio::test]
async fn commit_without_changes_reports_noop() {
    let mut session = connect().await;

    assert!(states::lock(&mut session, "lock the config").await.result);
    let output =
        states::commit(&mut session, "commit the changes",
            &CommitOptions::default())
        .await;
    assert!(output.result);
    assert_eq!(output.changes["message"], "no changes to commit");
    assert!(states::unlock(&mut session, "unlock the config").await.result);
}

#[tokio::test]
async fn rollback_restores_previous_configuration() {
    let mut session = connect().await;

    let output = states::set_hostname(
        &mut session,
        "device name",
        "gx7",
        &CommitOptions::default(),
    )
    .await;
    assert!(output.result);

    let output = states::rollback(
        &mut session,
        "rollback the changes",
        1,
        &CommitOptions {
            comment: Some("undo".to_owned()),
            ..Default::default()
        },
    )
    .await;
    assert!(output.result, "unexpected failure: {}", output.comment);
    assert_eq!(
        session.running().leaf_value(&["system", "host-name"]),
        Some("gx1")
    );
}

#[tokio::test]
async fn diff_reports_pending_changes() {
    let mut session = connect().await;

    assert!(states::lock(&mut session, "lock the config").await.result);
    assert!(
        states::load(
            &mut session,
            "stage location change",
            "set system location lab-9",
            ConfigFormat::SetCommands,
            MergePolicy::Merge,
        )
        .await
        .result
    );

    let output = states::diff(&mut session, "get the diff", None).await;
    assert!(output.result);
    assert!(output.changes["diff"].as_str().unwrap().contains("lab-9"));

    // Check, then throw the staged change away.
    assert!(states::commit_check(&mut session, "perform commit check")
        .await
        .result);
    let output = states::diff(&mut session, "get the diff", Some(0)).await;
    assert!(output.result);
    assert_eq!(output.changes["diff"], "");

    session.discard().unwrap();
    assert!(states::unlock(&mut session, "unlock the config").await.result);
}

#[tokio::test]
async fn operational_states_report_replies() {
    let mut session = connect().await;

    let output = states::cli(&mut session, "show version", "show version",
        OutputFormat::Text)
        .await;
    assert!(output.result);
    assert!(output.changes["message"].as_str().unwrap().contains("gx9000"));

    let output = states::rpc(
        &mut session,
        "get-interface-information",
        "get-interface-information",
        &[("interface-name".to_owned(), "lo0".to_owned())],
        None,
    )
    .await;
    // Unknown RPC: folded into the record.
    assert!(!output.result);
    assert!(output.comment.contains("RPC"));

    session
        .transport_mut()
        .insert_rpc_reply("get-interface-information", "<interface>lo0</interface>");
    let output = states::rpc(
        &mut session,
        "get-interface-information",
        "get-interface-information",
        &[],
        None,
    )
    .await;
    assert!(output.result);
    assert_eq!(output.changes["rpc_reply"], "<interface>lo0</interface>");

    let output =
        states::shutdown(&mut session, "shut the device", false, 10).await;
    assert!(output.result);
    assert_eq!(output.changes["message"], "Shutdown initiated");

    let output = states::zeroize(&mut session, "reset my device").await;
    assert!(output.result);
    assert!(
        output.changes["message"]
            .as_str()
            .unwrap()
            .contains("factory defaults")
    );
}
