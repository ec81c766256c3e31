use crate::core::domain::alert::AlertEvent;
use crate::utils::error::{RelayError, RelayResult};
use reqwest::header::{HeaderMap, CONTENT_TYPE, EXPIRES, LAST_MODIFIED};
use serde_json::{Map, Value};

/// Media type the alerts endpoint is asked for and must answer with.
pub const GEO_JSON: &str = "application/geo+json";

/// Fetch provenance reported by the weather service in its response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub correlation_id: String,
    pub request_id: String,
    pub server_id: String,
    pub last_modified: String,
    pub expires: String,
}

fn header_value(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

impl Provenance {
    /// Reads the provenance headers; absent or non-ASCII headers become empty strings.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            correlation_id: header_value(headers, "x-correlation-id"),
            request_id: header_value(headers, "x-request-id"),
            server_id: header_value(headers, "x-server-id"),
            last_modified: header_value(headers, LAST_MODIFIED),
            expires: header_value(headers, EXPIRES),
        }
    }

    /// Builds an undecoded alert carrying this provenance.
    pub fn alert(&self, data: Vec<u8>) -> AlertEvent {
        AlertEvent {
            correlation_id: self.correlation_id.clone(),
            request_id: self.request_id.clone(),
            server_id: self.server_id.clone(),
            last_modified: self.last_modified.clone(),
            expires: self.expires.clone(),
            ..AlertEvent::new(data)
        }
    }
}

/// Checks the response announces a GeoJSON body. Parameters such as `charset` are ignored.
pub fn check_content_type(headers: &HeaderMap) -> RelayResult<()> {
    let content_type = header_value(headers, CONTENT_TYPE);
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();

    if essence.eq_ignore_ascii_case(GEO_JSON) {
        Ok(())
    } else {
        Err(RelayError::FetchError(format!(
            "unexpected content type: {content_type:?}"
        )))
    }
}

/// Splits an alerts collection into one alert per feature, in document order.
///
/// Each feature is re-serialized on its own and becomes the raw payload of an undecoded alert.
pub fn alerts_from_body(body: &[u8], provenance: &Provenance) -> RelayResult<Vec<AlertEvent>> {
    let collection: Map<String, Value> = serde_json::from_slice(body).map_err(|e| {
        RelayError::FetchError(format!("could not deserialize response data: {e}"))
    })?;

    let features = match collection.get("features") {
        Some(Value::Array(features)) => features,
        _ => return Err(RelayError::FetchError("no alerts returned".to_string())),
    };

    features
        .iter()
        .map(|feature| Ok(provenance.alert(serde_json::to_vec(feature)?)))
        .collect()
}
