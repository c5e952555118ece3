//! Gateway Configuration
//!
//! Settings are read once at startup from flags or environment variables and
//! frozen into a `GatewayConfig`. Nothing here changes while the server runs.

use clap::builder::FalseyValueParser;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_VALIDATOR_API_URL: &str = "http://localhost";
pub const DEFAULT_VALIDATOR_API_PORT: u16 = 8080;
pub const DEFAULT_METAGRAPH_URL: &str = "http://localhost:9946";
pub const DEFAULT_BITTENSOR_NETWORK: &str = "finney";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Command line / environment settings for the gateway binary
#[derive(Parser, Debug, Clone)]
#[command(name = "pow-gateway")]
#[command(about = "Serves proof-of-weights artifacts and forwards signed inputs to the validator")]
pub struct GatewayArgs {
    /// Server host
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Validator checkout root (proofs live under neurons/_validator/proof_of_weights)
    #[arg(long, env = "VALIDATOR_PATH")]
    pub validator_path: PathBuf,

    /// Internal validator API base URL (scheme and host)
    #[arg(long, default_value = DEFAULT_VALIDATOR_API_URL, env = "VALIDATOR_API_URL")]
    pub validator_api_url: String,

    /// Internal validator API port
    #[arg(long, default_value_t = DEFAULT_VALIDATOR_API_PORT, env = "VALIDATOR_API_PORT")]
    pub validator_api_port: u16,

    /// Validate submissions but never forward them
    #[arg(long, env = "LAZY_RUN", value_parser = FalseyValueParser::new())]
    pub lazy_run: bool,

    /// Require senders to hold a validator permit on the claimed subnet
    #[arg(
        long,
        env = "VERIFY_EXTERNAL_VALIDATOR_SUBNET",
        value_parser = FalseyValueParser::new()
    )]
    pub verify_external_validator_subnet: bool,

    /// Metagraph service base URL
    #[arg(long, default_value = DEFAULT_METAGRAPH_URL, env = "METAGRAPH_URL")]
    pub metagraph_url: String,

    /// Bittensor network name
    #[arg(long, default_value = DEFAULT_BITTENSOR_NETWORK, env = "BITTENSOR_NETWORK")]
    pub bittensor_network: String,

    /// Timeout for the forwarding call, in seconds
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "FORWARD_TIMEOUT_SECS")]
    pub forward_timeout_secs: u64,

    /// Timeout for the metagraph lookup, in seconds
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "METAGRAPH_TIMEOUT_SECS")]
    pub metagraph_timeout_secs: u64,

    /// Maximum accepted request body size
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: usize,
}

/// Immutable gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// `{VALIDATOR_PATH}/neurons/_validator/proof_of_weights`
    pub proof_weights_dir: PathBuf,
    /// `{proof_weights_dir}/receipts`
    pub receipts_dir: PathBuf,
    pub validator_api_url: String,
    pub validator_api_port: u16,
    pub lazy_run: bool,
    pub verify_external_validator_subnet: bool,
    pub metagraph_url: String,
    pub bittensor_network: String,
    pub forward_timeout: Duration,
    pub metagraph_timeout: Duration,
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    /// Default configuration for a validator checkout at `validator_path`
    pub fn from_validator_path(validator_path: impl AsRef<Path>) -> Self {
        let proof_weights_dir = validator_path
            .as_ref()
            .join("neurons")
            .join("_validator")
            .join("proof_of_weights");
        let receipts_dir = proof_weights_dir.join("receipts");

        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            proof_weights_dir,
            receipts_dir,
            validator_api_url: DEFAULT_VALIDATOR_API_URL.to_string(),
            validator_api_port: DEFAULT_VALIDATOR_API_PORT,
            lazy_run: false,
            verify_external_validator_subnet: false,
            metagraph_url: DEFAULT_METAGRAPH_URL.to_string(),
            bittensor_network: DEFAULT_BITTENSOR_NETWORK.to_string(),
            forward_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            metagraph_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Endpoint of the internal validator that accepts proof-of-weights requests
    pub fn pow_request_url(&self) -> String {
        format!(
            "{}:{}/pow-request",
            self.validator_api_url.trim_end_matches('/'),
            self.validator_api_port
        )
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<GatewayArgs> for GatewayConfig {
    fn from(args: GatewayArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            validator_api_url: args.validator_api_url,
            validator_api_port: args.validator_api_port,
            lazy_run: args.lazy_run,
            verify_external_validator_subnet: args.verify_external_validator_subnet,
            metagraph_url: args.metagraph_url,
            bittensor_network: args.bittensor_network,
            forward_timeout: Duration::from_secs(args.forward_timeout_secs),
            metagraph_timeout: Duration::from_secs(args.metagraph_timeout_secs),
            max_body_bytes: args.max_body_bytes,
            ..Self::from_validator_path(&args.validator_path)
        }
    }
}
