//! Gateway HTTP Server
//!
//! ```text
//! client ──► pow-gateway ──┬── proof_of_weights/ (read-only files)
//!                          ├── validator API  POST /pow-request
//!                          └── metagraph API  (validator permit, optional)
//! ```
//!
//! Requests share only the immutable `GatewayState`.

use crate::artifacts::{Artifact, ArtifactStore};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::metagraph::{AllowAllMembership, MembershipOracle, MetagraphClient};
use crate::submission::{SubmissionPipeline, SubmitInputsRequest, SubmitInputsResponse};
use crate::validator_client::ValidatorClient;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const ROOT_MESSAGE: &str = "To get a proof, use /proofs/{block_number}/{hotkey}/{miner_uid} endpoint. \
To get a receipt, use /receipts/{transaction_hash} endpoint.";

// ============================================================================
// SERVER STATE
// ============================================================================

pub struct GatewayState {
    pub config: GatewayConfig,
    pub artifacts: ArtifactStore,
    pub submissions: SubmissionPipeline,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, membership: Arc<dyn MembershipOracle>) -> Self {
        let validator = ValidatorClient::new(config.pow_request_url(), config.forward_timeout);
        let submissions = SubmissionPipeline::new(
            validator,
            membership,
            config.verify_external_validator_subnet,
            config.lazy_run,
        );
        Self {
            artifacts: ArtifactStore::from_config(&config),
            submissions,
            config,
        }
    }

    /// State with the membership oracle the configuration asks for
    pub fn from_config(config: GatewayConfig) -> Self {
        let membership: Arc<dyn MembershipOracle> = if config.verify_external_validator_subnet {
            Arc::new(MetagraphClient::new(
                config.metagraph_url.clone(),
                config.bittensor_network.clone(),
                config.metagraph_timeout,
            ))
        } else {
            Arc::new(AllowAllMembership)
        };
        Self::new(config, membership)
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": ROOT_MESSAGE }))
}

fn artifact_response(artifact: Artifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// GET /receipts/:transaction_hash
pub async fn get_receipt(
    State(state): State<Arc<GatewayState>>,
    Path(transaction_hash): Path<String>,
) -> Result<Response, GatewayError> {
    let artifact = state.artifacts.receipt(&transaction_hash).await?;
    Ok(artifact_response(artifact))
}

/// GET /proofs/:block_number/:hotkey/:miner_uid
pub async fn get_proof(
    State(state): State<Arc<GatewayState>>,
    Path((block_number, hotkey, miner_uid)): Path<(u64, String, u64)>,
) -> Result<Response, GatewayError> {
    let artifact = state
        .artifacts
        .proof(block_number, &hotkey, miner_uid)
        .await?;
    Ok(artifact_response(artifact))
}

#[derive(Debug, Deserialize)]
pub struct ProofOfWeightsQuery {
    pub transaction_hash: String,
}

/// GET /get_proof_of_weights/:transaction_hash
pub async fn get_proof_of_weights(
    State(state): State<Arc<GatewayState>>,
    Path(transaction_hash): Path<String>,
) -> Result<Response, GatewayError> {
    let artifact = state.artifacts.proof_of_weights(&transaction_hash).await?;
    Ok(artifact_response(artifact))
}

/// GET /get_proof_of_weights?transaction_hash=...
pub async fn get_proof_of_weights_by_query(
    state: State<Arc<GatewayState>>,
    query: Result<Query<ProofOfWeightsQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(|rejection| {
        debug!("Malformed get_proof_of_weights query: {}", rejection.body_text());
        GatewayError::InvalidInput(rejection.body_text())
    })?;
    get_proof_of_weights(state, Path(query.transaction_hash)).await
}

/// POST /submit_inputs
pub async fn submit_inputs(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<SubmitInputsRequest>, JsonRejection>,
) -> Result<Json<SubmitInputsResponse>, GatewayError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Malformed submit_inputs body: {}", rejection.body_text());
        GatewayError::InvalidInput(rejection.body_text())
    })?;

    info!(
        "Received inputs from {} for netuid {}",
        request.sender, request.netuid
    );

    match state.submissions.submit(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            warn!("Submission rejected: {}", e);
            Err(e)
        }
    }
}

// ============================================================================
// SERVER STARTUP
// ============================================================================

pub fn router(state: Arc<GatewayState>) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/", get(root))
        .route("/receipts/:transaction_hash", get(get_receipt))
        .route("/proofs/:block_number/:hotkey/:miner_uid", get(get_proof))
        .route("/get_proof_of_weights", get(get_proof_of_weights_by_query))
        .route(
            "/get_proof_of_weights/:transaction_hash",
            get(get_proof_of_weights),
        )
        .route("/submit_inputs", post(submit_inputs))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let state = Arc::new(GatewayState::from_config(config));
    let config = &state.config;

    if !config.proof_weights_dir.is_dir() {
        warn!(
            "Proof-of-weights directory {} does not exist yet",
            config.proof_weights_dir.display()
        );
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║              Proof-of-Weights Gateway                        ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Listening on:  {:44} ║", addr);
    info!("║  Proofs dir:    {:44} ║", config.proof_weights_dir.display().to_string());
    info!(
        "║  Validator API: {:44} ║",
        state.submissions.validator().pow_request_url()
    );
    info!("║  Lazy run:      {:44} ║", state.submissions.is_lazy_run());
    info!(
        "║  Verify subnet: {:44} ║",
        format!(
            "{} ({})",
            state.submissions.enforces_membership(),
            config.bittensor_network
        )
    );
    info!("╠══════════════════════════════════════════════════════════════╣");
    info!("║  Endpoints:                                                  ║");
    info!("║    GET  /                                  - Usage help      ║");
    info!("║    GET  /receipts/:hash                    - Receipt file    ║");
    info!("║    GET  /proofs/:block/:hotkey/:uid        - Proof file      ║");
    info!("║    GET  /get_proof_of_weights/:hash        - Proof of weights║");
    info!("║    POST /submit_inputs                     - Signed inputs   ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
