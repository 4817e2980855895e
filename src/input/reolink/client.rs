//! HTTP client for the camera's motion-detection state.

use super::api::{get_md_state, parse_md_state};
use crate::config::CameraConfig;
use crate::error::{BridgeError, Result};
use crate::input::MotionSource;
use crate::motion::MotionState;
use async_trait::async_trait;
use log::trace;
use reqwest::Client;

/// Queries `GetMdState` on one camera channel.
///
/// Credentials travel as plaintext query parameters over plain HTTP; the
/// camera's API offers nothing else on this endpoint.
pub struct ReolinkClient {
    endpoint: String,
    username: String,
    password: String,
    channel: u8,
    client: Client,
}

impl ReolinkClient {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            endpoint: format!("http://{}/cgi-bin/api.cgi", config.host.trim()),
            username: config.username.clone(),
            password: config.password.clone(),
            channel: config.channel,
            client,
        })
    }

    /// CGI endpoint without credentials, safe to log.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// One POST, no retries. Any failure is returned as an error.
    pub async fn query_motion_state(&self) -> Result<MotionState> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("user", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .json(&get_md_state(self.channel))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        trace!("[Reolink] GetMdState response: {}", String::from_utf8_lossy(&body));
        parse_md_state(&body)
    }
}

#[async_trait]
impl MotionSource for ReolinkClient {
    async fn query_motion_state(&self) -> Result<MotionState> {
        ReolinkClient::query_motion_state(self).await
    }
}
