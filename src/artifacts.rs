//! Artifact Store
//!
//! Read-only access to the proof-of-weights directory written by the
//! validator. Filenames are built from request fields, so every caller-supplied
//! segment goes through [`is_safe_identifier`] before a path is constructed.

use crate::config::GatewayConfig;
use crate::error::{ArtifactKind, GatewayError, GatewayResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Longest identifier accepted in a filename segment
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// A file read from the artifact directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Check that an identifier can be used verbatim as part of a filename.
///
/// Allowed: non-empty, at most [`MAX_IDENTIFIER_LEN`] chars of `[A-Za-z0-9_.-]`,
/// and not `.` or `..`.
pub fn is_safe_identifier(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        return false;
    }
    if id == "." || id == ".." {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub fn proof_filename(block_number: u64, hotkey: &str, miner_uid: u64) -> String {
    format!("{}_{}_{}.json", block_number, hotkey, miner_uid)
}

pub fn proof_of_weights_filename(transaction_hash: &str) -> String {
    format!("{}.json", transaction_hash)
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    proof_weights_dir: PathBuf,
    receipts_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(proof_weights_dir: impl Into<PathBuf>, receipts_dir: impl Into<PathBuf>) -> Self {
        Self {
            proof_weights_dir: proof_weights_dir.into(),
            receipts_dir: receipts_dir.into(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(&config.proof_weights_dir, &config.receipts_dir)
    }

    pub fn proof_weights_dir(&self) -> &Path {
        &self.proof_weights_dir
    }

    pub fn receipts_dir(&self) -> &Path {
        &self.receipts_dir
    }

    /// Proof for a miner at a block: `{block}_{hotkey}_{uid}.json`
    pub async fn proof(
        &self,
        block_number: u64,
        hotkey: &str,
        miner_uid: u64,
    ) -> GatewayResult<Artifact> {
        let kind = ArtifactKind::Proof;
        ensure_safe(hotkey, kind)?;
        let filename = proof_filename(block_number, hotkey, miner_uid);
        read_artifact(&self.proof_weights_dir, filename, kind).await
    }

    /// Receipt for a transaction: `receipts/{transaction_hash}`
    pub async fn receipt(&self, transaction_hash: &str) -> GatewayResult<Artifact> {
        let kind = ArtifactKind::Receipt;
        ensure_safe(transaction_hash, kind)?;
        read_artifact(&self.receipts_dir, transaction_hash.to_string(), kind).await
    }

    /// Computed proof of weights for a transaction: `{transaction_hash}.json`
    pub async fn proof_of_weights(&self, transaction_hash: &str) -> GatewayResult<Artifact> {
        let kind = ArtifactKind::ProofOfWeights;
        ensure_safe(transaction_hash, kind)?;
        let filename = proof_of_weights_filename(transaction_hash);
        read_artifact(&self.proof_weights_dir, filename, kind).await
    }
}

fn ensure_safe(id: &str, kind: ArtifactKind) -> GatewayResult<()> {
    if is_safe_identifier(id) {
        return Ok(());
    }
    let preview: String = id.chars().take(64).collect();
    warn!("Rejected unsafe {:?} identifier: {:?}", kind, preview);
    Err(GatewayError::NotFound(kind))
}

async fn read_artifact(dir: &Path, filename: String, kind: ArtifactKind) -> GatewayResult<Artifact> {
    let path = dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Serving {} ({} bytes)", path.display(), bytes.len());
            Ok(Artifact { filename, bytes })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(GatewayError::NotFound(kind)),
        // A directory with the same name is not an artifact either
        Err(e) if path.is_dir() => {
            debug!("{} is a directory: {}", path.display(), e);
            Err(GatewayError::NotFound(kind))
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            Err(GatewayError::Internal(e.to_string()))
        }
    }
}
