//! Proof-of-Weights Gateway
//!
//! Small HTTP façade in front of a subnet validator:
//! - serves proof-of-weights artifacts and receipts written by the validator
//! - accepts sr25519-signed inputs, optionally checks the sender's validator
//!   permit on the metagraph, and forwards them to the validator API
//!
//! ## Module Structure
//!
//! - `config`: startup configuration (flags and environment)
//! - `error`: error taxonomy and HTTP mapping
//! - `auth`: SS58 / sr25519 verification and transaction hashes
//! - `artifacts`: file lookups in the proof-of-weights directory
//! - `metagraph`: validator permit checks
//! - `validator_client`: forwarding to the validator API
//! - `submission`: the signed submission pipeline
//! - `server`: axum router and startup

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod error;
pub mod metagraph;
pub mod server;
pub mod submission;
pub mod validator_client;

pub use artifacts::{is_safe_identifier, Artifact, ArtifactStore};
pub use auth::{is_valid_sender, parse_sender, transaction_hash, verify_signature};
pub use config::{GatewayArgs, GatewayConfig};
pub use error::{ArtifactKind, GatewayError, GatewayResult};
pub use metagraph::{AllowAllMembership, MembershipOracle, MetagraphClient, MetagraphSnapshot};
pub use server::{router, run_server, GatewayState};
pub use submission::{SubmissionPipeline, SubmitInputsRequest, SubmitInputsResponse};
pub use validator_client::ValidatorClient;
