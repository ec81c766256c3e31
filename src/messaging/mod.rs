pub mod event_listener;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// String key/value pairs carried alongside an event's payload.
pub type Metadata = HashMap<String, String>;

/// A named, versioned schema tag attached to every event on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub name: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
}

impl EventType {
    pub fn new(name: impl Into<String>, major: u32, minor: u32, patch: u32) -> Self {
        Self {
            name: name.into(),
            major_version: major,
            minor_version: minor,
            patch_version: patch,
        }
    }

    /// Only the name is compared when filtering inbound events; versions are informational.
    pub fn same_name(&self, other: &EventType) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}.{}.{}",
            self.name, self.major_version, self.minor_version, self.patch_version
        )
    }
}

/// Declared content encoding of an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mimetype {
    ApplicationJson,
    ApplicationMsgPack,
    ApplicationProtobuf,
    TextPlain,
    Unspecified,
}

impl Mimetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mimetype::ApplicationJson => "application/json",
            Mimetype::ApplicationMsgPack => "application/msgpack",
            Mimetype::ApplicationProtobuf => "application/protobuf",
            Mimetype::TextPlain => "text/plain",
            Mimetype::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for Mimetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transport envelope exchanged over a topic.
///
/// The payload is opaque to the stream; `event_type` and `mimetype` tell consumers how to
/// interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub mimetype: Mimetype,
    pub metadata: Metadata,
    pub data: Vec<u8>,
}

impl Event {
    /// Returns the metadata value for `key`, or an empty string when absent.
    pub fn metadata_value(&self, key: &str) -> String {
        self.metadata.get(key).cloned().unwrap_or_default()
    }
}
