//! AMI frame parsing and error-response detection

use crate::{
    constants::{ERROR_MARKER, FRAME_TERMINATOR, LINE_TERMINATOR, MESSAGE_NOT_FOUND},
    headers::AmiHeader,
    record::Record,
};
use std::fmt;

/// A frame the switch marked as failed (`Response: Error`).
///
/// Carries the `Message` values, or the `NOT FOUND` sentinel when the frame
/// had none, together with whatever fields were parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    messages: Vec<String>,
    record: Record,
}

impl ErrorResponse {
    /// `Message` values in arrival order, or `["NOT FOUND"]`.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Messages joined with `"; "`.
    pub fn message(&self) -> String {
        self.messages
            .join("; ")
    }

    /// Fields parsed from the failed frame. Has no raw entry.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Take the parsed fields.
    pub fn into_record(self) -> Record {
        self.record
    }

    /// `ActionID` of the failed frame.
    pub fn action_id(&self) -> Option<&str> {
        self.record
            .action_id()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AMI error response: {}", self.message())
    }
}

impl std::error::Error for ErrorResponse {}

/// Parse one frame's text.
///
/// Each `Name: Value` line appends `Value` to `Name`; repeated names keep
/// every value. Parsing stops at the first empty line. Lines without a colon
/// (the greeting banner) are skipped.
///
/// If `Response: Error` occurs anywhere in `text` the result is an
/// [`ErrorResponse`]. Otherwise the record keeps `text` verbatim as its raw
/// entry.
pub fn parse_frame(text: &str) -> Result<Record, ErrorResponse> {
    let mut record = Record::new();

    for line in text.split(LINE_TERMINATOR) {
        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim_matches(|c: char| c == ':' || c.is_whitespace());
            let value = line[colon + 1..].trim();
            record.push(name, value.to_string());
        } else if line.is_empty() || line.contains(FRAME_TERMINATOR) {
            break;
        }
    }

    if text.contains(ERROR_MARKER) {
        let messages = match record.get_all(AmiHeader::Message) {
            [] => vec![MESSAGE_NOT_FOUND.to_string()],
            found => found.to_vec(),
        };
        return Err(ErrorResponse { messages, record });
    }

    record.set_raw(text.to_string());
    Ok(record)
}

/// Parse a frame, treating an error response as a record.
///
/// Routing code needs the `ActionID` and `Event` of failed frames too; the
/// error is kept alongside so it can be surfaced to whoever claims the frame.
pub(crate) fn parse_routable(text: &str) -> (Record, Option<ErrorResponse>) {
    match parse_frame(text) {
        Ok(record) => (record, None),
        Err(err) => (err.record.clone(), Some(err)),
    }
}

/// Split `Asterisk Call Manager/5.0.1` into its version, if it is a greeting.
pub fn parse_banner(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(crate::constants::BANNER_PREFIX)
}
