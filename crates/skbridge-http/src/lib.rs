//! # skbridge-http
//!
//! REST client for the upstream Signal K API.
//!
//! The stream carries live updates; this client covers everything else:
//! reading current values when an accessory is queried, fetching the
//! full tree for discovery, and writing switch and dimmer state back.

use serde_json::json;
use skbridge_core::{BridgeConfig, BusPath, RawValue};
use thiserror::Error;
use tracing::debug;

const SWITCHES_PREFIX: &str = "electrical/switches";

/// Errors from REST interactions with the upstream server.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The path does not exist upstream (404). Devices report "not
    /// present" rather than a stale value in this case.
    #[error("path not present upstream")]
    NotPresent,

    /// Authentication rejected (401/403). The configured token is
    /// missing, expired, or lacks write permission.
    #[error("upstream rejected credentials")]
    Unauthorized,

    /// Any other non-success status.
    #[error("unexpected upstream status {0}")]
    UnexpectedStatus(u16),

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// REST client bound to one upstream server.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url(),
            token: config.security_token.clone(),
        }
    }

    /// URL of a single value resource for a bus path.
    fn value_url(&self, path: &BusPath) -> String {
        format!("{}{}/value", self.api_url, path.to_rest())
    }

    /// URL of a writable switch attribute.
    fn put_url(&self, device: &str, attribute: &str) -> String {
        format!("{}{SWITCHES_PREFIX}/{device}/{attribute}/", self.api_url)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("JWT {token}")),
            None => builder,
        }
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), HttpError> {
        match status.as_u16() {
            404 => Err(HttpError::NotPresent),
            401 | 403 => Err(HttpError::Unauthorized),
            _ if status.is_success() => Ok(()),
            s => Err(HttpError::UnexpectedStatus(s)),
        }
    }

    /// Read the current value of a bus path.
    pub async fn get_value(&self, path: &BusPath) -> Result<RawValue, HttpError> {
        let url = self.value_url(path);
        debug!(%url, "GET value");
        let response = self.request(self.client.get(&url)).send().await?;
        Self::check_status(response.status())?;
        Ok(response.json().await?)
    }

    /// Check that a path exists upstream without keeping the value.
    pub async fn check_path(&self, path: &BusPath) -> Result<(), HttpError> {
        self.get_value(path).await.map(|_| ())
    }

    /// Fetch the full self-vessel tree, used by discovery.
    pub async fn full_tree(&self) -> Result<RawValue, HttpError> {
        debug!(url = %self.api_url, "GET full tree");
        let response = self.request(self.client.get(&self.api_url)).send().await?;
        Self::check_status(response.status())?;
        Ok(response.json().await?)
    }

    /// Write a switch attribute. The upstream acknowledges writes with
    /// 200 when applied immediately or 202 when queued; both succeed.
    pub async fn put_value(
        &self,
        device: &str,
        attribute: &str,
        value: &RawValue,
    ) -> Result<(), HttpError> {
        let url = self.put_url(device, attribute);
        debug!(%url, %value, "PUT value");
        let response = self
            .request(self.client.put(&url))
            .json(&json!({ "value": value }))
            .send()
            .await?;
        Self::check_status(response.status())
    }

    /// Set a switch or dimmer on/off. On the wire this is 1/0.
    pub async fn set_on_off(&self, device: &str, on: bool) -> Result<(), HttpError> {
        let value = json!(if on { 1 } else { 0 });
        self.put_value(device, "state", &value).await
    }

    /// Set a dimmer level from a 0..100 percentage; upstream expects a
    /// 0..1 ratio.
    pub async fn set_ratio(&self, device: &str, percent: f64) -> Result<(), HttpError> {
        let value = json!(percent / 100.0);
        self.put_value(device, "dimmingLevel", &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> HttpClient {
        let config = BridgeConfig {
            host: "boat.local:3000".to_string(),
            ..Default::default()
        };
        HttpClient::new(&config)
    }

    #[test]
    fn test_value_url_maps_dots_to_slashes() {
        let url = client().value_url(&BusPath::new("tanks.freshWater.0.currentLevel"));
        assert_eq!(
            url,
            "http://boat.local:3000/signalk/v1/api/vessels/self/tanks/freshWater/0/currentLevel/value"
        );
    }

    #[test]
    fn test_put_url_targets_switch_attribute() {
        let url = client().put_url("empirBusNxt-instance0-dimmer1", "dimmingLevel");
        assert_eq!(
            url,
            "http://boat.local:3000/signalk/v1/api/vessels/self/electrical/switches/empirBusNxt-instance0-dimmer1/dimmingLevel/"
        );
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;

        assert!(HttpClient::check_status(StatusCode::OK).is_ok());
        assert!(HttpClient::check_status(StatusCode::ACCEPTED).is_ok());
        assert!(matches!(
            HttpClient::check_status(StatusCode::NOT_FOUND),
            Err(HttpError::NotPresent)
        ));
        assert!(matches!(
            HttpClient::check_status(StatusCode::UNAUTHORIZED),
            Err(HttpError::Unauthorized)
        ));
        assert!(matches!(
            HttpClient::check_status(StatusCode::FORBIDDEN),
            Err(HttpError::Unauthorized)
        ));
        assert!(matches!(
            HttpClient::check_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(HttpError::UnexpectedStatus(500))
        ));
    }
}
