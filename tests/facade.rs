mod common;
use common::{closed_port, quiet_logger, silent_server};

use serde_json::{json, Value};
use sshlink::facade::{MethodHandler, SftpClientObject, SshClientObject, SSH_CLIENT_METHODS};
use sshlink::{ClientConfig, SshErrorKind};
use std::time::Duration;

fn ssh_object(port: u16) -> SshClientObject {
    SshClientObject::from_args(
        &json!({"host": "127.0.0.1", "port": port, "user": "tester"}),
        ClientConfig::default(),
        quiet_logger("facade"),
    )
    .expect("object")
}

#[tokio::test]
async fn unknown_method_points_at_close_matches() {
    let err = ssh_object(closed_port())
        .handle(json!({"method": "readBlock"}))
        .await
        .expect_err("unknown");
    assert_eq!(err.kind, SshErrorKind::Parameter);
    let details = err.details.expect("details");
    assert_eq!(details["did_you_mean"][0], "read_block");
    assert_eq!(
        details["known_methods"].as_array().map(Vec::len),
        Some(SSH_CLIENT_METHODS.len())
    );
}

#[tokio::test]
async fn missing_method_is_rejected() {
    let err = ssh_object(closed_port())
        .handle(json!({}))
        .await
        .expect_err("no method");
    assert_eq!(err.kind, SshErrorKind::Parameter);
}

#[tokio::test]
async fn bad_parameters_are_reported() {
    let object = ssh_object(closed_port());
    let err = object
        .handle(json!({"method": "connect", "timeout_ms": "soon"}))
        .await
        .expect_err("bad timeout");
    assert_eq!(err.kind, SshErrorKind::Parameter);

    let err = object
        .handle(json!({"method": "read", "channel_id": "x", "stream_id": 7}))
        .await
        .expect_err("bad stream");
    assert_eq!(err.kind, SshErrorKind::ParameterRange);

    let err = object
        .handle(json!({"method": "set_user"}))
        .await
        .expect_err("no user");
    assert_eq!(err.kind, SshErrorKind::Parameter);
}

#[tokio::test]
async fn connect_timeout_surfaces_and_leaves_session_down() {
    let object = ssh_object(silent_server(Duration::from_secs(3)));
    let err = object
        .handle(json!({"method": "connect", "timeout_ms": 200}))
        .await
        .expect_err("timeout");
    assert_eq!(err.kind, SshErrorKind::Timeout);
    let out = object
        .handle(json!({"method": "is_connected"}))
        .await
        .expect("is_connected");
    assert_eq!(out["connected"], Value::Bool(false));
}

#[tokio::test]
async fn channel_listing_starts_empty() {
    let out = ssh_object(closed_port())
        .handle(json!({"method": "list_channels"}))
        .await
        .expect("list");
    assert_eq!(out["channels"], json!([]));
}

#[tokio::test]
async fn warnings_and_stats_are_exposed() {
    let object = ssh_object(closed_port());
    let stats = object.handle(json!({"method": "stats"})).await.expect("stats");
    assert_eq!(stats["usage"]["bytes_read"], 0);
    let warnings = object
        .handle(json!({"method": "take_warnings"}))
        .await
        .expect("warnings");
    assert!(warnings["warnings"].is_array());
}

#[tokio::test]
async fn sftp_object_from_url_and_path_errors() {
    let object = SftpClientObject::from_args(
        &json!({"url": format!("sftp://tester@127.0.0.1:{}/data", closed_port())}),
        ClientConfig::default(),
        quiet_logger("facade"),
    )
    .expect("object");
    let err = object
        .handle(json!({"method": "stat"}))
        .await
        .expect_err("no path");
    assert_eq!(err.kind, SshErrorKind::Parameter);

    let err = object
        .handle(json!({"method": "list", "timeout_ms": 1000}))
        .await
        .expect_err("refused");
    assert_eq!(err.kind, SshErrorKind::Socket);

    let err = object
        .handle(json!({"method": "mkdir", "path": "x", "mode": "0o17777"}))
        .await
        .expect_err("mode range");
    assert_eq!(err.kind, SshErrorKind::ParameterRange);
}
