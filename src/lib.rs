//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate speaks the AMI text protocol over any tokio byte stream: it
//! frames and parses `Name: Value` records, encodes actions, correlates
//! responses by `ActionID`, waits for events and collects list responses.
//!
//! # Architecture
//!
//! Two front ends share the same framing, parsing and encoding:
//! - [`AmiClient`] (Clone + Send) with [`AmiEventStream`]: a background reader
//!   task routes every frame to the caller waiting for it, so any number of
//!   tasks can send actions and wait for events at once.
//! - [`AmiSession`]: a sequential engine that reads the stream in place and
//!   drops frames it is not waiting for. Its methods take `&mut self`, so only
//!   one wait can be in progress.
//!
//! # Examples
//!
//! ## Multiplexed client
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let (client, mut events) = AmiClient::connect("localhost", 5038, "admin", "secret").await?;
//!
//!     let pong = client.ping().await?;
//!     println!("Ping: {}", pong.get("Ping"));
//!
//!     while let Some(Ok(event)) = events.recv().await {
//!         println!("Received event: {}", event.get("Event"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## List actions
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{actions, AmiClient, AmiError};
//!
//! # async fn example(client: &AmiClient) -> Result<(), AmiError> {
//! let (item, complete) = actions::CORE_SHOW_CHANNELS_EVENTS;
//! let channels = client
//!     .request_list(actions::core_show_channels(), item.as_str(), complete.as_str())
//!     .await?;
//! for channel in &channels {
//!     println!("{} {}", channel.get("Channel"), channel.get("ChannelStateDesc"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sequential session
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{actions, AmiError, AmiSession, TcpTransport};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), AmiError> {
//! let transport = TcpTransport::connect("localhost", 5038, Duration::from_secs(2)).await?;
//! let mut session = AmiSession::new(transport);
//! session.read_banner().await?;
//! session.login("admin", "secret", "call").await?;
//!
//! let hangup = session.wait_for_event("Hangup", &["PJSIP/100-"]).await?;
//! println!("cause {}", hangup.get("Cause-txt"));
//! session.logoff().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Parsing
//!
//! ```rust
//! use asterisk_ami_tokio::parse_frame;
//!
//! let record = parse_frame("Event: Hangup\r\nChannel: SIP/100-0001\r\nCause: 16\r\n\r\n").unwrap();
//! assert_eq!(record.get("Cause"), "16");
//!
//! let err = parse_frame("Response: Error\r\nActionID: 7\r\n\r\n").unwrap_err();
//! assert_eq!(err.message(), "NOT FOUND");
//! ```

#[macro_use]
mod macros;

pub mod actions;
pub mod buffer;
pub mod connection;
pub mod constants;
pub mod error;
pub mod fields;
pub mod headers;
pub mod protocol;
pub mod record;
pub mod session;
pub mod transport;

pub(crate) mod command;

pub use actions::Originate;
pub use buffer::FrameReader;
pub use command::{Action, ActionIdGenerator};
pub use connection::{
    AmiClient, AmiConnectOptions, AmiEventStream, ConnectionStatus, DisconnectReason,
};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult};
pub use headers::{AmiEvent, AmiHeader, ParseAmiEventError, ParseAmiHeaderError};
pub use protocol::{parse_frame, ErrorResponse};
pub use record::Record;
pub use session::AmiSession;
pub use transport::{Cancellable, StreamTransport, TcpTransport, Transport, TransportRecv, TransportSend};
