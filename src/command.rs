//! Outgoing actions and their wire encoding

use crate::{
    constants::LINE_TERMINATOR,
    error::{AmiError, AmiResult},
    fields::to_fields,
    headers::AmiHeader,
};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reject strings that would break out of a single `Name: Value` line.
///
/// AMI frames are line-delimited; an embedded newline would let a value
/// inject extra fields or end the frame early.
fn validate_line(name: &str, value: &str) -> AmiResult<()> {
    if name.is_empty() || name.contains(':') {
        return Err(AmiError::InvalidField {
            name: name.to_string(),
            reason: "field name must be non-empty and contain no colon".into(),
        });
    }
    for s in [name, value] {
        if s.contains('\n') || s.contains('\r') {
            return Err(AmiError::InvalidField {
                name: name.to_string(),
                reason: "must not contain newlines".into(),
            });
        }
    }
    Ok(())
}

/// One AMI action (command) to send.
///
/// ```
/// use asterisk_ami_tokio::Action;
///
/// let wire = Action::new("Hangup")
///     .action_id("42")
///     .field("Channel", "PJSIP/100-00000001")
///     .field("Cause", "16")
///     .to_wire_format()
///     .unwrap();
/// assert_eq!(
///     wire,
///     "Action: Hangup\r\nActionID: 42\r\nChannel: PJSIP/100-00000001\r\nCause: 16\r\n\r\n"
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    action_id: String,
    fields: Vec<(String, String)>,
}

impl Action {
    /// Action named `name`, with no `ActionID`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action_id: String::new(),
            fields: Vec::new(),
        }
    }

    /// Set the correlation identifier. Empty means the reply is not tracked.
    pub fn action_id(mut self, id: impl Into<String>) -> Self {
        self.action_id = id.into();
        self
    }

    /// Append one field. Fields keep insertion order; names may repeat.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), value.into()));
        self
    }

    /// Append one field when `value` is `Some`.
    pub fn field_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self,
        }
    }

    /// Append every field of a serializable payload, see [`fields`](crate::fields).
    pub fn fields<T: Serialize + ?Sized>(mut self, payload: &T) -> AmiResult<Self> {
        self.fields
            .extend(to_fields(payload)?);
        Ok(self)
    }

    /// Action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation identifier, empty if untracked.
    pub fn id(&self) -> &str {
        &self.action_id
    }

    /// Extra fields in order.
    pub fn extra_fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub(crate) fn set_action_id(&mut self, id: String) {
        self.action_id = id;
    }

    /// Encode as one frame: `Action`, `ActionID` (when set), each extra
    /// field, then the blank line.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        use std::fmt::Write;

        if self.name.is_empty() {
            return Err(AmiError::InvalidAction);
        }
        validate_line(AmiHeader::Action.as_str(), &self.name)?;

        let mut out = String::with_capacity(64);
        let _ = write!(out, "{}: {}{}", AmiHeader::Action, self.name, LINE_TERMINATOR);
        if !self.action_id.is_empty() {
            validate_line(AmiHeader::ActionId.as_str(), &self.action_id)?;
            let _ = write!(
                out,
                "{}: {}{}",
                AmiHeader::ActionId,
                self.action_id,
                LINE_TERMINATOR
            );
        }
        for (name, value) in &self.fields {
            validate_line(name, value)?;
            let _ = write!(out, "{}: {}{}", name, value, LINE_TERMINATOR);
        }
        out.push_str(LINE_TERMINATOR);
        Ok(out)
    }

    fn is_secret(name: &str) -> bool {
        name.eq_ignore_ascii_case(AmiHeader::Secret.as_str()) || name.eq_ignore_ascii_case("Key")
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(n, v)| {
                if Self::is_secret(n) {
                    (n.as_str(), "[REDACTED]")
                } else {
                    (n.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("action_id", &self.action_id)
            .field("fields", &fields)
            .finish()
    }
}

impl fmt::Display for Action {
    /// Wire-like rendering for logs, with secrets redacted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.action_id.is_empty() {
            write!(f, " [{}]", self.action_id)?;
        }
        for (name, value) in &self.fields {
            if Self::is_secret(name) {
                write!(f, " {}=[REDACTED]", name)?;
            } else {
                write!(f, " {}={}", name, value)?;
            }
        }
        Ok(())
    }
}

/// Generates `ActionID` values unique within this process.
///
/// Each generator gets a prefix from the process id and start time, followed
/// by a counter, e.g. `1f3a-6b2c91-17`.
#[derive(Debug)]
pub struct ActionIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl ActionIdGenerator {
    /// Generator with a process- and time-derived prefix.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        Self::with_prefix(format!("{:x}-{:x}", std::process::id(), nanos))
    }

    /// Generator producing `<prefix>-<n>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Next identifier.
    pub fn next_id(&self) -> String {
        let n = self
            .next
            .fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

impl Default for ActionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
