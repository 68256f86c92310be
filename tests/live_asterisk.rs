//! Integration tests against a live Asterisk instance.
//!
//! These tests require AMI on 127.0.0.1:5038 with a manager user `admin`,
//! secret `amp111`, and read/write permission for `system,call,command`.
//! Run with: cargo test --test live_asterisk -- --ignored

use asterisk_ami_tokio::{
    actions, AmiClient, AmiError, AmiEventStream, AmiSession, Cancellable, Originate, TcpTransport,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const AMI_HOST: &str = "127.0.0.1";
const AMI_PORT: u16 = 5038;
const AMI_USER: &str = "admin";
const AMI_SECRET: &str = "amp111";

async fn connect() -> (AmiClient, AmiEventStream) {
    let (client, events) = AmiClient::connect(AMI_HOST, AMI_PORT, AMI_USER, AMI_SECRET)
        .await
        .expect("failed to connect to Asterisk");
    client.set_command_timeout(Duration::from_secs(10));
    (client, events)
}

#[tokio::test]
#[ignore]
async fn live_connect_and_ping() {
    let (client, _events) = connect().await;
    assert!(client.is_connected());

    let pong = client
        .ping()
        .await
        .unwrap();
    assert_eq!(pong.response(), Some("Success"));
    assert_eq!(pong.get("Ping"), "Pong");
}

#[tokio::test]
#[ignore]
async fn live_wrong_secret_is_rejected() {
    let err = AmiClient::connect(AMI_HOST, AMI_PORT, AMI_USER, "definitely-wrong")
        .await
        .unwrap_err();
    assert!(
        matches!(err, AmiError::AuthFailed { .. }),
        "unexpected error: {}",
        err
    );
}

#[tokio::test]
#[ignore]
async fn live_list_commands() {
    let (client, _events) = connect().await;
    let commands = client
        .list_commands()
        .await
        .unwrap();
    assert!(commands.contains("Ping"), "Ping missing: {}", commands);
}

#[tokio::test]
#[ignore]
async fn live_unknown_action_is_protocol_error() {
    let (client, _events) = connect().await;
    let err = client
        .send_action(asterisk_ami_tokio::Action::new("NoSuchActionAnywhere"))
        .await
        .unwrap_err();
    let resp = err
        .error_response()
        .expect("expected an error response");
    assert!(!resp
        .message()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn live_core_show_channels() {
    let (client, _events) = connect().await;
    let (item, complete) = actions::CORE_SHOW_CHANNELS_EVENTS;
    let channels = client
        .request_list(actions::core_show_channels(), item.as_str(), complete.as_str())
        .await
        .unwrap();
    for channel in &channels {
        assert!(channel.contains("Channel"));
    }
}

#[tokio::test]
#[ignore]
async fn live_originate_local_and_wait_for_hangup() {
    let (client, _events) = connect().await;

    let hangup = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .wait_for_event("Hangup", &["Local/ami-test@"])
                .await
        })
    };

    client
        .originate(&Originate {
            channel: "Local/ami-test@default".into(),
            application: Some("Wait".into()),
            data: Some("1".into()),
            is_async: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(15), hangup)
        .await
        .expect("timeout waiting for Hangup")
        .unwrap()
        .unwrap();
    assert!(event
        .get("Channel")
        .starts_with("Local/ami-test@"));
}

#[tokio::test]
#[ignore]
async fn live_command_output() {
    let (client, _events) = connect().await;
    let reply = client
        .command("core show version")
        .await
        .unwrap();
    assert!(reply
        .raw()
        .unwrap_or("")
        .contains("Asterisk"));
}

#[tokio::test]
#[ignore]
async fn live_session_wait_cancelled() {
    let transport = TcpTransport::connect(AMI_HOST, AMI_PORT, Duration::from_secs(2))
        .await
        .unwrap();
    let token = CancellationToken::new();
    let mut session = AmiSession::new(Cancellable::new(transport, token.clone()));
    session
        .read_banner()
        .await
        .unwrap();
    session
        .login(AMI_USER, AMI_SECRET, "off")
        .await
        .unwrap();

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });
    let err = session
        .wait_for_event("NeverHappens", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AmiError::Cancelled));
    cancel
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn live_logoff_closes_connection() {
    let (client, mut events) = connect().await;
    let goodbye = client
        .logoff()
        .await
        .unwrap();
    assert_eq!(goodbye.response(), Some("Goodbye"));

    while events
        .recv()
        .await
        .is_some()
    {}
    assert!(!client.is_connected());
}
