//! Sequential AMI engine over one transport.
//!
//! [`AmiSession`] reads the stream in place: every wait consumes frames
//! until it finds the one it wants and drops the rest. All primitives take
//! `&mut self`, so two waits can never race on the same transport. For
//! concurrent waits on one connection use [`AmiClient`](crate::AmiClient),
//! which routes frames from a single reader task.
//!
//! None of the loops here has a bound of its own. A wait for a frame that
//! never comes blocks until the transport fails; bound it by dropping the
//! future (e.g. `tokio::time::timeout`) or by reading through a
//! [`Cancellable`](crate::transport::Cancellable) transport.

use tracing::{debug, info, trace};

use crate::{
    actions,
    buffer::FrameReader,
    command::{Action, ActionIdGenerator},
    connection::{AmiClient, AmiConnectOptions, AmiEventStream},
    constants::RESPONSE_SUCCESS,
    error::{AmiError, AmiResult},
    headers::AmiHeader,
    protocol::{parse_banner, parse_routable},
    record::Record,
    transport::{Transport, TransportRecv, TransportSend},
};

/// How a frame correlated to a list request affects the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListStep {
    Item,
    Done,
    Skip,
}

/// An `accumulate` event is an item. The `complete` event, or any `Response`
/// other than `Success`, ends the list.
pub(crate) fn list_step(record: &Record, accumulate: &str, complete: &str) -> ListStep {
    let event = record.get(AmiHeader::Event);
    let response = record.get(AmiHeader::Response);
    if event == accumulate {
        ListStep::Item
    } else if event == complete || (!response.is_empty() && response != RESPONSE_SUCCESS) {
        ListStep::Done
    } else {
        ListStep::Skip
    }
}

/// Blocking-style AMI engine owning a transport.
#[derive(Debug)]
pub struct AmiSession<T> {
    transport: T,
    reader: FrameReader,
    ids: ActionIdGenerator,
    version: Option<String>,
}

impl<T: TransportRecv + TransportSend> AmiSession<T> {
    /// Session over a connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            reader: FrameReader::new(),
            ids: ActionIdGenerator::new(),
            version: None,
        }
    }

    /// Session that generates `ActionID`s from `ids`.
    pub fn with_id_generator(transport: T, ids: ActionIdGenerator) -> Self {
        Self {
            ids,
            ..Self::new(transport)
        }
    }

    /// Read the `Asterisk Call Manager/<version>` greeting and return the version.
    pub async fn read_banner(&mut self) -> AmiResult<String> {
        let line = loop {
            if let Some(line) = self
                .reader
                .next_line()?
            {
                break line;
            }
            let chunk = self
                .transport
                .recv()
                .await?;
            self.reader
                .push(&chunk)?;
        };
        let version = parse_banner(&line)
            .ok_or_else(|| AmiError::UnexpectedBanner {
                banner: line.clone(),
            })?
            .to_string();
        debug!("[CONNECT] Manager interface version {}", version);
        self.version = Some(version.clone());
        Ok(version)
    }

    /// Protocol version from the greeting, once read.
    pub fn version(&self) -> Option<&str> {
        self.version
            .as_deref()
    }

    /// A fresh `ActionID`.
    pub fn next_action_id(&self) -> String {
        self.ids
            .next_id()
    }

    /// Encode and write `action`. Nothing is written if encoding fails.
    pub async fn send(&mut self, action: &Action) -> AmiResult<()> {
        let wire = action.to_wire_format()?;
        debug!("[SEND] {}", action);
        self.transport
            .send(&wire)
            .await
    }

    /// Read until one complete frame is buffered and return its text.
    ///
    /// Bytes after the frame stay buffered for the next call.
    pub async fn read_frame(&mut self) -> AmiResult<String> {
        loop {
            if let Some(frame) = self
                .reader
                .next_frame()?
            {
                trace!("[RECV] Frame of {} bytes", frame.len());
                return Ok(frame);
            }
            let chunk = self
                .transport
                .recv()
                .await?;
            self.reader
                .push(&chunk)?;
        }
    }

    /// Read frames until one carries `ActionID: action_id`.
    ///
    /// Frames with no fields, and frames whose `ActionID` differs (events,
    /// replies to other actions), are dropped. A matching `Response: Error`
    /// frame is returned as [`AmiError::Protocol`].
    pub async fn read_response(&mut self, action_id: &str) -> AmiResult<Record> {
        loop {
            let text = self
                .read_frame()
                .await?;
            let (record, error) = parse_routable(&text);
            if record.is_empty() {
                trace!("[RECV] Dropping frame without fields");
                continue;
            }
            if record.get(AmiHeader::ActionId) != action_id {
                trace!(
                    "[RECV] Dropping frame for ActionID {:?} while waiting for {:?}",
                    record.action_id(),
                    action_id
                );
                continue;
            }
            return match error {
                Some(err) => Err(err.into()),
                None => Ok(record),
            };
        }
    }

    /// Send `action` and wait for its response.
    ///
    /// The action's own `ActionID` is used; an action without one matches the
    /// first frame that has none either.
    pub async fn send_action(&mut self, action: &Action) -> AmiResult<Record> {
        self.send(action)
            .await?;
        self.read_response(action.id())
            .await
    }

    /// Wait for an `event` whose frame text contains every string in `needles`.
    ///
    /// Every other frame is dropped. There is no correlation filtering: any
    /// frame on the stream can match.
    pub async fn wait_for_event(&mut self, event: &str, needles: &[&str]) -> AmiResult<Record> {
        loop {
            let text = self
                .read_frame()
                .await?;
            let (record, error) = parse_routable(&text);
            let name = record.get(AmiHeader::Event);
            if name == event
                && needles
                    .iter()
                    .all(|n| text.contains(n))
            {
                return match error {
                    Some(err) => Err(err.into()),
                    None => Ok(record),
                };
            }
            debug!("Event did not match: got {:?}, want {:?}", name, event);
        }
    }

    /// Send a list action and collect its `accumulate` events.
    ///
    /// Reads only frames carrying the action's `ActionID`. Stops at the
    /// `complete` event or at a `Response` other than `Success`; neither
    /// terminating frame is included. A `Response: Error` frame fails the
    /// whole call, as does any transport error.
    pub async fn request_list(
        &mut self,
        action: &Action,
        accumulate: &str,
        complete: &str,
    ) -> AmiResult<Vec<Record>> {
        self.send(action)
            .await?;
        let mut items = Vec::new();
        loop {
            let record = self
                .read_response(action.id())
                .await?;
            match list_step(&record, accumulate, complete) {
                ListStep::Item => items.push(record),
                ListStep::Done => {
                    debug!(
                        "[LIST] {} finished with {} items",
                        action.name(),
                        items.len()
                    );
                    return Ok(items);
                }
                ListStep::Skip => {}
            }
        }
    }

    /// Log in with a plaintext secret and the given event mask.
    pub async fn login(&mut self, username: &str, secret: &str, events: &str) -> AmiResult<Record> {
        let action = actions::login(username, secret, events).action_id(self.next_action_id());
        match self
            .send_action(&action)
            .await
        {
            Ok(record) => {
                info!("[AUTH] Logged in as {}", username);
                Ok(record)
            }
            Err(AmiError::Protocol(resp)) => Err(AmiError::auth_failed(resp.message())),
            Err(e) => Err(e),
        }
    }

    /// Send `Logoff` and wait for the `Goodbye` response.
    pub async fn logoff(&mut self) -> AmiResult<Record> {
        let action = actions::logoff().action_id(self.next_action_id());
        self.send_action(&action)
            .await
    }

    /// Hand the transport, and any input already buffered, to a multiplexed
    /// [`AmiClient`] with its own reader task.
    pub fn into_client(self, options: AmiConnectOptions) -> (AmiClient<T::SendHalf>, AmiEventStream)
    where
        T: Transport,
    {
        AmiClient::from_parts(self.transport, self.reader, self.ids, options)
    }

    /// The transport and any bytes buffered but not yet parsed.
    pub fn into_parts(self) -> (T, FrameReader) {
        (self.transport, self.reader)
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
