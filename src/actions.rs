//! Builders for commonly used AMI actions.
//!
//! Each builder returns an [`Action`] without an `ActionID`; the client or
//! session assigns one when the action is sent.
//!
//! ```
//! use asterisk_ami_tokio::actions::{self, Originate};
//!
//! let action = Originate {
//!     channel: "PJSIP/+15551234@trunk".into(),
//!     application: Some("Hangup".into()),
//!     caller_id: Some("+15550000".into()),
//!     is_async: Some(true),
//!     ..Default::default()
//! }
//! .into_action()
//! .unwrap();
//!
//! let wire = action.to_wire_format().unwrap();
//! assert!(wire.starts_with("Action: Originate\r\nChannel: PJSIP/+15551234@trunk\r\n"));
//! assert!(wire.contains("Async: true\r\n"));
//!
//! let hangup = actions::hangup("PJSIP/100-00000001", Some(16));
//! assert!(hangup.to_wire_format().unwrap().contains("Cause: 16\r\n"));
//! ```

use serde::Serialize;

use crate::{command::Action, error::AmiResult, headers::AmiEvent};

/// `Login` with plaintext secret. `events` is the event mask, e.g. `on`,
/// `off` or `system,call,all,user`.
pub fn login(username: &str, secret: &str, events: &str) -> Action {
    Action::new("Login")
        .field("Username", username)
        .field("Secret", secret)
        .field("Events", events)
}

/// `Logoff`. The switch answers `Response: Goodbye` and closes the socket.
pub fn logoff() -> Action {
    Action::new("Logoff")
}

/// `Ping`, answered by `Response: Success` with `Ping: Pong`.
pub fn ping() -> Action {
    Action::new("Ping")
}

/// `ListCommands`: one response listing every action the user may send.
pub fn list_commands() -> Action {
    Action::new("ListCommands")
}

/// `Events`: change the event mask for this connection (`on`, `off`, or a
/// comma-separated class list).
pub fn events(mask: &str) -> Action {
    Action::new("Events").field("EventMask", mask)
}

/// `Hangup` a channel, optionally with a Q.850 cause code.
pub fn hangup(channel: &str, cause: Option<u32>) -> Action {
    Action::new("Hangup")
        .field("Channel", channel)
        .field_opt("Cause", cause.map(|c| c.to_string()))
}

/// `Command`: run a CLI command; output arrives as `Output` fields.
pub fn command(cli: &str) -> Action {
    Action::new("Command").field("Command", cli)
}

/// `CoreShowChannels`: list active channels.
///
/// Collect with [`CORE_SHOW_CHANNELS_EVENTS`].
pub fn core_show_channels() -> Action {
    Action::new("CoreShowChannels")
}

/// Accumulate / complete events of [`core_show_channels`].
pub const CORE_SHOW_CHANNELS_EVENTS: (AmiEvent, AmiEvent) =
    (AmiEvent::CoreShowChannel, AmiEvent::CoreShowChannelsComplete);

/// `Status` of one channel, or all channels when `channel` is `None`.
///
/// Collect with [`STATUS_EVENTS`].
pub fn status(channel: Option<&str>) -> Action {
    Action::new("Status").field_opt("Channel", channel)
}

/// Accumulate / complete events of [`status`].
pub const STATUS_EVENTS: (AmiEvent, AmiEvent) = (AmiEvent::Status, AmiEvent::StatusComplete);

/// `SIPpeers` (chan_sip). Collect with [`SIP_PEERS_EVENTS`].
pub fn sip_peers() -> Action {
    Action::new("SIPpeers")
}

/// Accumulate / complete events of [`sip_peers`].
pub const SIP_PEERS_EVENTS: (AmiEvent, AmiEvent) = (AmiEvent::PeerEntry, AmiEvent::PeerlistComplete);

/// `Originate` parameters.
///
/// Either `exten`/`context`/`priority` or `application`/`data` selects what
/// the answered channel runs. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Originate {
    /// Channel to dial, e.g. `PJSIP/+15551234@trunk`.
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "Exten", skip_serializing_if = "Option::is_none")]
    pub exten: Option<String>,
    #[serde(rename = "Context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "Priority", skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(rename = "Application", skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Milliseconds to wait for answer.
    #[serde(rename = "Timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(rename = "CallerID", skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    /// `name=value` channel variables, one `Variable` line each.
    #[serde(rename = "Variable", skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(rename = "Account", skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(rename = "EarlyMedia", skip_serializing_if = "Option::is_none")]
    pub early_media: Option<bool>,
    /// Reply immediately; the outcome arrives as an `OriginateResponse` event.
    #[serde(rename = "Async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(rename = "Codecs", skip_serializing_if = "Option::is_none")]
    pub codecs: Option<String>,
    #[serde(rename = "ChannelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(rename = "OtherChannelId", skip_serializing_if = "Option::is_none")]
    pub other_channel_id: Option<String>,
}

impl Originate {
    /// Build the `Originate` action.
    pub fn into_action(&self) -> AmiResult<Action> {
        Action::new("Originate").fields(self)
    }
}
