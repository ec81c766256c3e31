use crate::messaging::{Event, EventType, Metadata, Mimetype};
use crate::utils::error::{RelayError, RelayResult};
use serde_json::{Map, Value};

/// Name of the schema tag carried by alert events.
pub const ALERT_TYPE_NAME: &str = "Alert";

/// Metadata keys used to carry provenance across the stream.
pub const CORRELATION_ID: &str = "correlation_id";
pub const REQUEST_ID: &str = "request_id";
pub const SERVER_ID: &str = "server_id";
pub const LAST_MODIFIED: &str = "last_modified";
pub const EXPIRES: &str = "expires";

/// The schema tag attached to every published alert.
pub fn alert_type() -> EventType {
    EventType::new(ALERT_TYPE_NAME, 1, 0, 0)
}

/// The only payload encoding alerts are published with and accepted in.
pub const ALERT_MIMETYPE: Mimetype = Mimetype::ApplicationJson;

/// The payload of an alert, either still encoded or decoded into a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertPayload {
    Undecoded(Vec<u8>),
    Decoded {
        raw: Vec<u8>,
        parsed: Map<String, Value>,
    },
}

impl AlertPayload {
    pub fn raw(&self) -> &[u8] {
        match self {
            AlertPayload::Undecoded(raw) => raw,
            AlertPayload::Decoded { raw, .. } => raw,
        }
    }

    pub fn parsed(&self) -> Option<&Map<String, Value>> {
        match self {
            AlertPayload::Undecoded(_) => None,
            AlertPayload::Decoded { parsed, .. } => Some(parsed),
        }
    }
}

/// Decodes raw alert bytes into a JSON object.
///
/// Any valid JSON document that is not an object is rejected.
pub fn decode(raw: &[u8]) -> RelayResult<Map<String, Value>> {
    Ok(serde_json::from_slice::<Map<String, Value>>(raw)?)
}

/// One weather alert, independent of the transport it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub correlation_id: String,
    pub request_id: String,
    pub server_id: String,
    pub last_modified: String,
    pub expires: String,
    pub payload: AlertPayload,
}

impl AlertEvent {
    /// Creates an undecoded alert from raw payload bytes with empty provenance.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            correlation_id: String::new(),
            request_id: String::new(),
            server_id: String::new(),
            last_modified: String::new(),
            expires: String::new(),
            payload: AlertPayload::Undecoded(data),
        }
    }

    /// Builds an undecoded alert from a transport envelope. Missing metadata keys become
    /// empty strings.
    pub fn from_event(event: &Event) -> Self {
        Self {
            correlation_id: event.metadata_value(CORRELATION_ID),
            request_id: event.metadata_value(REQUEST_ID),
            server_id: event.metadata_value(SERVER_ID),
            last_modified: event.metadata_value(LAST_MODIFIED),
            expires: event.metadata_value(EXPIRES),
            payload: AlertPayload::Undecoded(event.data.clone()),
        }
    }

    /// Wraps the alert into the envelope published on the alerts topic.
    pub fn to_event(&self) -> Event {
        let mut metadata = Metadata::with_capacity(5);
        metadata.insert(CORRELATION_ID.into(), self.correlation_id.clone());
        metadata.insert(REQUEST_ID.into(), self.request_id.clone());
        metadata.insert(SERVER_ID.into(), self.server_id.clone());
        metadata.insert(LAST_MODIFIED.into(), self.last_modified.clone());
        metadata.insert(EXPIRES.into(), self.expires.clone());

        Event {
            event_type: alert_type(),
            mimetype: ALERT_MIMETYPE,
            metadata,
            data: self.data().to_vec(),
        }
    }

    pub fn data(&self) -> &[u8] {
        self.payload.raw()
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.payload, AlertPayload::Decoded { .. })
    }

    /// Decodes the payload in place.
    ///
    /// An alert that is already decoded is returned untouched: the raw bytes are not looked at
    /// again. On failure the alert stays undecoded.
    pub fn parse(&mut self) -> RelayResult<&Map<String, Value>> {
        match self.payload {
            AlertPayload::Decoded { ref parsed, .. } => Ok(parsed),
            AlertPayload::Undecoded(ref mut raw) => {
                let parsed = decode(raw)?;
                let raw = std::mem::take(raw);
                self.payload = AlertPayload::Decoded { raw, parsed };
                self.parse()
            }
        }
    }

    /// Returns `properties.headline` of the alert.
    ///
    /// Decoded alerts are read from their parsed form; undecoded alerts are decoded into a
    /// temporary without changing `self`.
    pub fn headline(&self) -> RelayResult<String> {
        match &self.payload {
            AlertPayload::Decoded { parsed, .. } => headline_of(parsed),
            AlertPayload::Undecoded(raw) => headline_of(&decode(raw)?),
        }
    }
}

fn headline_of(parsed: &Map<String, Value>) -> RelayResult<String> {
    let properties = parsed
        .get("properties")
        .and_then(Value::as_object)
        .ok_or(RelayError::MissingProperties)?;

    properties
        .get("headline")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(RelayError::MissingHeadline)
}
