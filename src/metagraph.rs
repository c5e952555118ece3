//! Metagraph Membership
//!
//! Decides whether a submission sender holds a validator permit on the subnet
//! it claims. The gateway only sees the narrow [`MembershipOracle`] trait; the
//! HTTP [`MetagraphClient`] is one implementation and [`AllowAllMembership`]
//! backs the default configuration where the check is switched off.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// True when `sender` is registered on `netuid` with a validator permit.
    ///
    /// Lookup failures are reported as `false`.
    async fn check_membership(&self, netuid: u16, sender: &str) -> bool;
}

/// Oracle used when membership enforcement is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllMembership;

#[async_trait]
impl MembershipOracle for AllowAllMembership {
    async fn check_membership(&self, _netuid: u16, _sender: &str) -> bool {
        true
    }
}

/// Subnet metagraph as returned by the metagraph service.
///
/// `hotkeys` and `validator_permit` are indexed by uid.
#[derive(Debug, Clone, Deserialize)]
pub struct MetagraphSnapshot {
    #[serde(default)]
    pub netuid: u16,
    pub hotkeys: Vec<String>,
    pub validator_permit: Vec<bool>,
}

impl MetagraphSnapshot {
    pub fn uid_of(&self, hotkey: &str) -> Option<usize> {
        self.hotkeys.iter().position(|h| h == hotkey)
    }

    pub fn has_validator_permit(&self, hotkey: &str) -> bool {
        self.uid_of(hotkey)
            .and_then(|uid| self.validator_permit.get(uid).copied())
            .unwrap_or(false)
    }
}

/// Fetches subnet metagraphs over HTTP
pub struct MetagraphClient {
    /// Metagraph service URL
    base_url: String,
    /// Network name, for logs
    network: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl MetagraphClient {
    pub fn new(base_url: impl Into<String>, network: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            network: network.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the current metagraph of `netuid`
    pub async fn fetch(&self, netuid: u16) -> Result<MetagraphSnapshot, String> {
        let url = format!(
            "{}/api/v1/metagraph/{}",
            self.base_url.trim_end_matches('/'),
            netuid
        );
        debug!("Fetching {} metagraph for netuid {} from {}", self.network, netuid, url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Failed to connect to metagraph service: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Metagraph service returned error: {}",
                response.status()
            ));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse metagraph: {}", e))
    }
}

#[async_trait]
impl MembershipOracle for MetagraphClient {
    async fn check_membership(&self, netuid: u16, sender: &str) -> bool {
        match self.fetch(netuid).await {
            Ok(metagraph) => {
                let permitted = metagraph.has_validator_permit(sender);
                if !permitted {
                    debug!(
                        "Sender {} has no validator permit on netuid {} (metagraph netuid {}, {} hotkeys)",
                        sender,
                        netuid,
                        metagraph.netuid,
                        metagraph.hotkeys.len()
                    );
                }
                permitted
            }
            Err(e) => {
                warn!("Membership lookup for netuid {} failed: {}", netuid, e);
                false
            }
        }
    }
}
