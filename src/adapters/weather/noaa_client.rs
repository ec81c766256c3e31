use crate::adapters::weather::alert_parser::{
    alerts_from_body, check_content_type, Provenance, GEO_JSON,
};
use crate::core::domain::alert::AlertEvent;
use crate::core::ports::alert_source::AlertSource;
use crate::utils::error::{RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

const ACCEPT_LANG: &str = "en-US,en";

/// Adapter for the active alerts endpoint of the National Weather Service API.
///
/// # Fields
///
/// * `client` - Shared HTTP client; connections are reused across ticks.
/// * `alerts_url` - Fully resolved `alerts/active` URL.
/// * `user_agent` - Contact string the weather service requires on every request.
pub struct WeatherApiAdapter {
    client: Client,
    alerts_url: Url,
    user_agent: String,
}

impl WeatherApiAdapter {
    pub fn new(base_url: &str, user_agent: &str) -> RelayResult<Self> {
        let mut base = Url::parse(base_url).map_err(|e| {
            RelayError::ConfigError(format!("invalid weather base url {base_url:?}: {e}"))
        })?;

        // Joining replaces the last path segment unless the base ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let alerts_url = base
            .join("alerts/active")
            .map_err(|e| RelayError::ConfigError(format!("invalid weather base url: {e}")))?;

        let client = Client::builder()
            .build()
            .map_err(|e| RelayError::ConfigError(format!("could not build http client: {e}")))?;

        Ok(Self {
            client,
            alerts_url,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn alerts_url(&self) -> &Url {
        &self.alerts_url
    }
}

#[async_trait]
impl AlertSource for WeatherApiAdapter {
    async fn fetch_active_alerts(&self, timeout: Duration) -> RelayResult<Vec<AlertEvent>> {
        debug!(url = %self.alerts_url, "fetching active alerts");

        let response = self
            .client
            .get(self.alerts_url.clone())
            .timeout(timeout)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, GEO_JSON)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANG)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "could not fetch active alerts");
                RelayError::FetchError(format!("could not execute request: {e}"))
            })?;

        let provenance = Provenance::from_headers(response.headers());
        let status = response.status();

        let checked = if status.is_success() {
            check_content_type(response.headers())
        } else {
            Err(RelayError::FetchError(format!(
                "[{}] {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            )))
        };

        let result = match checked {
            Ok(()) => match response.bytes().await {
                Ok(body) => alerts_from_body(&body, &provenance),
                Err(e) => Err(RelayError::from(e)),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!(
                error = %e,
                correlation_id = %provenance.correlation_id,
                request_id = %provenance.request_id,
                server_id = %provenance.server_id,
                "could not fetch active alerts"
            );
        }
        result
    }
}
