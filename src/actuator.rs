//! HTTP client for the smart light

use async_trait::async_trait;

use crate::command::LightState;
use crate::config::LightConfig;
use crate::{Error, Result};

/// Something that can switch the light
///
/// Implementations make at most one attempt per call. Any response from the
/// device counts as success; the status code is returned for logging.
#[async_trait]
pub trait LightActuator {
    /// Request the given state
    ///
    /// # Errors
    ///
    /// Returns `Error::Actuator` if the device could not be reached
    async fn set(&self, state: LightState) -> Result<u16>;
}

/// Light controlled by plain `GET /on` and `GET /off` requests
pub struct HttpLight {
    client: reqwest::Client,
    config: LightConfig,
}

impl HttpLight {
    /// Create a client for the configured endpoints
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: LightConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// URL requested for a state
    #[must_use]
    pub fn url_for(&self, state: LightState) -> &str {
        self.config.url_for(state)
    }
}

#[async_trait]
impl LightActuator for HttpLight {
    async fn set(&self, state: LightState) -> Result<u16> {
        let url = self.url_for(state);
        tracing::debug!(%state, url, "sending light request");

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!(%state, url, error = %e, "light request failed");
            Error::Actuator(e.to_string())
        })?;

        let status = response.status();
        tracing::info!(%state, status = status.as_u16(), "light request sent");
        Ok(status.as_u16())
    }
}
