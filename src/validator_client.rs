//! Client for the internal validator API.
//!
//! Accepted submissions are posted to `{url}:{port}/pow-request`. Only a
//! `200 OK` counts as accepted.

use crate::error::{GatewayError, GatewayResult};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest downstream body echoed back in an error detail
const MAX_ERROR_BODY_LEN: usize = 1024;

pub struct ValidatorClient {
    pow_request_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ValidatorClient {
    pub fn new(pow_request_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pow_request_url: pow_request_url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn pow_request_url(&self) -> &str {
        &self.pow_request_url
    }

    /// Post `inputs` to the validator. Transport errors, timeouts and any
    /// status other than 200 become `ForwardingFailed`.
    pub async fn submit_pow_request(&self, inputs: &Value) -> GatewayResult<()> {
        debug!("Forwarding inputs to {}", self.pow_request_url);

        let response = self
            .client
            .post(&self.pow_request_url)
            .timeout(self.timeout)
            .json(inputs)
            .send()
            .await
            .map_err(|e| {
                warn!("Validator API unreachable at {}: {}", self.pow_request_url, e);
                GatewayError::ForwardingFailed(format!("validator unreachable: {}", e))
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!("Validator API rejected inputs with {}: {}", status, body);
            return Err(GatewayError::ForwardingFailed(format!(
                "validator returned {}: {}",
                status,
                truncate(&body, MAX_ERROR_BODY_LEN)
            )));
        }

        info!("Inputs forwarded to validator ({})", status);
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
