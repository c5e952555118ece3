//! Signed Input Submission
//!
//! ```text
//! decode base64 ──► verify sr25519 ──► validator permit? ──► parse JSON
//!                                                               │
//!           response ◄── forward to validator ◄── attach transaction_hash
//! ```
//!
//! Each stage short-circuits with its own `GatewayError`. Nothing is forwarded
//! unless every earlier stage passed, and at most one forwarding call is made.

use crate::auth::{is_valid_sender, transaction_hash, verify_signature};
use crate::error::{GatewayError, GatewayResult};
use crate::metagraph::MembershipOracle;
use crate::validator_client::ValidatorClient;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key under which the derived transaction hash is attached to forwarded inputs
pub const TRANSACTION_HASH_KEY: &str = "transaction_hash";

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Inputs submitted successfully";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitInputsRequest {
    /// Base64 encoded JSON payload
    pub inputs: String,
    /// Base64 encoded sr25519 signature over the decoded payload
    pub signature: String,
    /// SS58 address of the signer
    pub sender: String,
    pub netuid: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitInputsResponse {
    pub message: String,
    pub transaction_hash: String,
}

/// Payload and signature after base64 decoding
#[derive(Debug, Clone)]
pub struct DecodedSubmission {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl DecodedSubmission {
    pub fn decode(request: &SubmitInputsRequest) -> GatewayResult<Self> {
        let payload = BASE64
            .decode(request.inputs.trim())
            .map_err(|e| GatewayError::InvalidInput(format!("inputs is not valid base64: {}", e)))?;
        let signature = BASE64.decode(request.signature.trim()).map_err(|e| {
            GatewayError::InvalidInput(format!("signature is not valid base64: {}", e))
        })?;
        Ok(Self { payload, signature })
    }

    pub fn transaction_hash(&self) -> String {
        transaction_hash(&self.payload, &self.signature)
    }

    /// Parse the payload as a JSON object
    pub fn inputs(&self) -> GatewayResult<Map<String, Value>> {
        match serde_json::from_slice::<Value>(&self.payload) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(GatewayError::InvalidInput(
                "inputs must be a JSON object".to_string(),
            )),
            Err(e) => Err(GatewayError::InvalidInput(format!(
                "inputs is not valid JSON: {}",
                e
            ))),
        }
    }
}

pub struct SubmissionPipeline {
    validator: ValidatorClient,
    membership: Arc<dyn MembershipOracle>,
    enforce_membership: bool,
    lazy_run: bool,
}

impl SubmissionPipeline {
    pub fn new(
        validator: ValidatorClient,
        membership: Arc<dyn MembershipOracle>,
        enforce_membership: bool,
        lazy_run: bool,
    ) -> Self {
        Self {
            validator,
            membership,
            enforce_membership,
            lazy_run,
        }
    }

    pub fn validator(&self) -> &ValidatorClient {
        &self.validator
    }

    pub fn is_lazy_run(&self) -> bool {
        self.lazy_run
    }

    pub fn enforces_membership(&self) -> bool {
        self.enforce_membership
    }

    pub async fn submit(&self, request: SubmitInputsRequest) -> GatewayResult<SubmitInputsResponse> {
        let decoded = DecodedSubmission::decode(&request)?;

        // An unparseable sender can never have signed anything
        if !is_valid_sender(&request.sender) {
            debug!("Rejected submission: malformed sender address");
            return Err(GatewayError::InvalidSignature);
        }

        if !verify_signature(&request.sender, &decoded.payload, &decoded.signature) {
            debug!("Rejected submission from {}: invalid signature", request.sender);
            return Err(GatewayError::InvalidSignature);
        }

        if self.enforce_membership
            && !self
                .membership
                .check_membership(request.netuid, &request.sender)
                .await
        {
            warn!(
                "Rejected submission from {}: not a validator on netuid {}",
                request.sender, request.netuid
            );
            return Err(GatewayError::UnauthorizedSender);
        }

        let mut inputs = decoded.inputs()?;
        let tx_hash = decoded.transaction_hash();
        inputs.insert(
            TRANSACTION_HASH_KEY.to_string(),
            Value::String(tx_hash.clone()),
        );

        if self.lazy_run {
            info!("Lazy run: accepted {} without forwarding", tx_hash);
        } else {
            self.validator
                .submit_pow_request(&Value::Object(inputs))
                .await?;
            info!(
                "Forwarded {} from {} (netuid {})",
                tx_hash, request.sender, request.netuid
            );
        }

        Ok(SubmitInputsResponse {
            message: SUBMIT_SUCCESS_MESSAGE.to_string(),
            transaction_hash: tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;
    use sp_core::crypto::Ss58Codec;
    use sp_core::{sr25519, Pair};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Oracle stub that counts lookups
    struct StubOracle {
        permitted: Vec<String>,
        calls: AtomicUsize,
    }

    impl StubOracle {
        fn new(permitted: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                permitted: permitted.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MembershipOracle for StubOracle {
        async fn check_membership(&self, _netuid: u16, sender: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.permitted.iter().any(|p| p == sender)
        }
    }

    fn alice() -> sr25519::Pair {
        sr25519::Pair::from_string("//Alice", None).expect("valid dev keypair")
    }

    fn signed_request(pair: &sr25519::Pair, payload: &[u8], netuid: u16) -> (SubmitInputsRequest, Vec<u8>) {
        let sig = pair.sign(payload);
        let sig_bytes: Vec<u8> = AsRef::<[u8]>::as_ref(&sig).to_vec();
        let request = SubmitInputsRequest {
            inputs: BASE64.encode(payload),
            signature: BASE64.encode(&sig_bytes),
            sender: pair.public().to_ss58check(),
            netuid,
        };
        (request, sig_bytes)
    }

    fn pipeline(
        server: &MockServer,
        oracle: Arc<dyn MembershipOracle>,
        enforce_membership: bool,
        lazy_run: bool,
    ) -> SubmissionPipeline {
        SubmissionPipeline::new(
            ValidatorClient::new(server.url("/pow-request"), Duration::from_secs(5)),
            oracle,
            enforce_membership,
            lazy_run,
        )
    }

    #[tokio::test]
    async fn test_submit_forwards_with_transaction_hash() {
        let pair = alice();
        let (request, sig) = signed_request(&pair, b"{}", 1);
        let expected_hash = transaction_hash(b"{}", &sig);

        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST)
                .path("/pow-request")
                .json_body(json!({ "transaction_hash": expected_hash }));
            then.status(200).json_body(json!({}));
        });

        let oracle = StubOracle::new(&[]);
        let response = pipeline(&server, oracle.clone(), false, false)
            .submit(request)
            .await
            .unwrap();

        assert_eq!(response.message, "Inputs submitted successfully");
        assert_eq!(response.transaction_hash, expected_hash);
        assert_eq!(response.transaction_hash.len(), 64);
        pow_request.assert_hits(1);
        // Enforcement off: the oracle is never consulted
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lazy_run_makes_no_outbound_call() {
        let (request, _) = signed_request(&alice(), br#"{"query": 1}"#, 1);

        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(200);
        });

        let response = pipeline(&server, StubOracle::new(&[]), false, true)
            .submit(request)
            .await
            .unwrap();

        assert_eq!(response.message, SUBMIT_SUCCESS_MESSAGE);
        pow_request.assert_hits(0);
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let (mut request, _) = signed_request(&alice(), b"{}", 1);
        request.inputs = "%%% not base64 %%%".to_string();

        let server = MockServer::start();
        let err = pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));

        let (mut request, _) = signed_request(&alice(), b"{}", 1);
        request.signature = "***".to_string();
        let err = pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected_before_forwarding() {
        let (mut request, _) = signed_request(&alice(), br#"{"amount": 1}"#, 1);
        request.inputs = BASE64.encode(br#"{"amount": 9}"#);

        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(200);
        });

        let err = pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature));
        pow_request.assert_hits(0);
    }

    #[tokio::test]
    async fn test_malformed_sender_is_invalid_signature() {
        let (mut request, _) = signed_request(&alice(), b"{}", 1);
        request.sender = "not-an-ss58-address".to_string();

        let server = MockServer::start();
        let err = pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_malformed_sender_skips_membership_lookup() {
        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(200);
        });

        for sender in ["", "0x1234", "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQZ"] {
            let (mut request, _) = signed_request(&alice(), b"{}", 1);
            request.sender = sender.to_string();

            let oracle = StubOracle::new(&[sender]);
            let err = pipeline(&server, oracle.clone(), true, false)
                .submit(request)
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidSignature), "sender {:?}", sender);
            assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
        }
        pow_request.assert_hits(0);
    }

    #[tokio::test]
    async fn test_membership_enforced() {
        let pair = alice();
        let sender = pair.public().to_ss58check();
        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(200);
        });

        // Not in the permitted list
        let (request, _) = signed_request(&pair, b"{}", 3);
        let oracle = StubOracle::new(&[]);
        let err = pipeline(&server, oracle.clone(), true, false)
            .submit(request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnauthorizedSender));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        pow_request.assert_hits(0);

        // Same sender with enforcement disabled
        let (request, _) = signed_request(&pair, b"{}", 3);
        pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap();

        // Permitted sender with enforcement enabled
        let (request, _) = signed_request(&pair, b"{}", 3);
        pipeline(&server, StubOracle::new(&[sender.as_str()]), true, false)
            .submit(request)
            .await
            .unwrap();
        pow_request.assert_hits(2);
    }

    #[tokio::test]
    async fn test_signed_non_json_is_invalid_input() {
        let server = MockServer::start();
        let pow_request = server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(200);
        });

        for payload in [&b"not json"[..], &b"[1, 2, 3]"[..]] {
            let (request, _) = signed_request(&alice(), payload, 1);
            let err = pipeline(&server, StubOracle::new(&[]), false, false)
                .submit(request)
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidInput(_)));
        }
        pow_request.assert_hits(0);
    }

    #[tokio::test]
    async fn test_forwarding_failure() {
        let (request, _) = signed_request(&alice(), b"{}", 1);
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/pow-request");
            then.status(500).body("queue full");
        });

        let err = pipeline(&server, StubOracle::new(&[]), false, false)
            .submit(request)
            .await
            .unwrap_err();
        match err {
            GatewayError::ForwardingFailed(detail) => assert!(detail.contains("queue full")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_reports_its_settings() {
        let server = MockServer::start();
        let pipeline = pipeline(&server, StubOracle::new(&[]), true, false);
        assert!(pipeline.enforces_membership());
        assert!(!pipeline.is_lazy_run());
        assert_eq!(
            pipeline.validator().pow_request_url(),
            server.url("/pow-request")
        );
    }

    #[test]
    fn test_decoded_inputs_keep_fields() {
        let decoded = DecodedSubmission {
            payload: br#"{"inputs": [1, 2], "model_id": "abc"}"#.to_vec(),
            signature: vec![0u8; 64],
        };
        let inputs = decoded.inputs().unwrap();
        assert_eq!(inputs["model_id"], "abc");
        assert_eq!(inputs["inputs"], json!([1, 2]));
    }
}
