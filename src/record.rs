//! Parsed AMI frame: an ordered, multi-valued field map.

use crate::{constants::RAW_FIELD, headers::AmiHeader};
use serde::{Serialize, Serializer};
use std::fmt;

/// One inbound frame, parsed.
///
/// Fields keep the order of their first appearance and a name that repeats
/// (e.g. `Variable` on a `Status` event) keeps every value in arrival order.
/// The verbatim frame text is kept under the reserved [`RAW_FIELD`] name and
/// is only present on frames that parsed without a protocol error.
///
/// Records are built by [`parse_frame`](crate::protocol::parse_frame) and are
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Vec<String>)>,
    raw: Option<String>,
}

impl Record {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: &str, value: String) {
        match self
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
        {
            Some((_, values)) => values.push(value),
            None => self
                .fields
                .push((name.to_string(), vec![value])),
        }
    }

    pub(crate) fn set_raw(&mut self, raw: String) {
        self.raw = Some(raw);
    }

    /// First value for `name`. `RAW_FIELD` resolves to the frame text.
    pub fn first(&self, name: impl AsRef<str>) -> Option<&str> {
        self.get_all(name)
            .first()
            .map(|s| s.as_str())
    }

    /// First value for `name`, or `""` when absent.
    pub fn get(&self, name: impl AsRef<str>) -> &str {
        self.first(name)
            .unwrap_or("")
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all(&self, name: impl AsRef<str>) -> &[String] {
        let name = name.as_ref();
        if name == RAW_FIELD {
            if let Some(raw) = &self.raw {
                return std::slice::from_ref(raw);
            }
        }
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `name` appeared in the frame.
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        !self
            .get_all(name)
            .is_empty()
    }

    /// Verbatim frame text.
    pub fn raw(&self) -> Option<&str> {
        self.raw
            .as_deref()
    }

    /// Number of distinct field names, not counting the raw entry.
    pub fn len(&self) -> usize {
        self.fields
            .len()
    }

    /// `true` if no `name: value` line was recognized.
    pub fn is_empty(&self) -> bool {
        self.fields
            .is_empty()
    }

    /// Fields in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// `Event` field.
    pub fn event(&self) -> Option<&str> {
        self.first(AmiHeader::Event)
    }

    /// `ActionID` field.
    pub fn action_id(&self) -> Option<&str> {
        self.first(AmiHeader::ActionId)
    }

    /// `Response` field (`Success`, `Error`, `Follows`, `Goodbye`).
    pub fn response(&self) -> Option<&str> {
        self.first(AmiHeader::Response)
    }

    /// `Message` field.
    pub fn message(&self) -> Option<&str> {
        self.first(AmiHeader::Message)
    }

    /// Whether the event name equals `name`.
    pub fn is_event(&self, name: &str) -> bool {
        self.event() == Some(name)
    }

    /// `Variable: name=value` entries split into pairs.
    ///
    /// Entries without `=` are returned with an empty value.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.get_all(AmiHeader::Variable)
            .iter()
            .map(|v| {
                v.split_once('=')
                    .unwrap_or((v.as_str(), ""))
            })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in &self.fields {
            for value in values {
                writeln!(f, "{}: {}", name, value)?;
            }
        }
        Ok(())
    }
}

impl Serialize for Record {
    /// Serializes as a map of name to value list, raw entry last.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let extra = usize::from(self.raw.is_some());
        let mut map = serializer.serialize_map(Some(self.fields.len() + extra))?;
        for (name, values) in &self.fields {
            map.serialize_entry(name, values)?;
        }
        if let Some(raw) = &self.raw {
            map.serialize_entry(RAW_FIELD, &[raw])?;
        }
        map.end()
    }
}
