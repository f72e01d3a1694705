//! Client for the remote signing service.
//!
//! The wallet holds no key material. Every signature comes from one round trip
//! to a signer that either returns the finished transaction or just `(r, s,
//! recovery_id)`, depending on the configured [`SignerProtocol`].

use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use chain_eth::address::pubkey_to_address;
use chain_eth::assembler::SignatureOutcome;
use chain_eth::signature::{complete_signature, RawSignature};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{decode_public_key, SignerConfig, SignerProtocol};
use crate::error::{SignerError, WalletError};

/// A signing backend reachable over some transport.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// The result form this signer produces. Fixed for the signer's lifetime.
    fn protocol(&self) -> SignerProtocol;

    /// SEC1 public key of the signing identity.
    async fn public_key(&self) -> Result<Vec<u8>, SignerError>;

    /// Signs `payload` (the exact signing bytes, not a hash) for `chain_id`.
    ///
    /// Exactly one attempt is made.
    async fn sign(&self, payload: &[u8], chain_id: u64) -> Result<SignatureOutcome, SignerError>;
}

#[derive(Serialize)]
struct SignRequest<'a> {
    identity: &'a str,
    chain_id: u64,
    payload: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SignReply {
    #[serde(default)]
    signed_tx: Option<String>,
    #[serde(default)]
    r: Option<String>,
    #[serde(default)]
    s: Option<String>,
    #[serde(default)]
    recovery_id: Option<u8>,
    /// 65-byte `r || s || v` or bare 64-byte `r || s`.
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
struct PublicKeyReply {
    public_key: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// A reply that still needs the public key to become a [`SignatureOutcome`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ParsedReply {
    Complete(SignatureOutcome),
    Compact(Vec<u8>),
}

/// [`RemoteSigner`] speaking JSON over HTTP.
///
/// `POST {endpoint}/sign` with `{identity, chain_id, payload}` and
/// `GET {endpoint}/public_key?identity=..`.
pub struct HttpSigner {
    http: reqwest::Client,
    endpoint: Url,
    identity: String,
    protocol: SignerProtocol,
    auth_token: Option<SecretString>,
    public_key: OnceCell<Vec<u8>>,
}

impl HttpSigner {
    pub fn new(config: &SignerConfig) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut endpoint = config.endpoint.clone();
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let pinned = match &config.public_key {
            Some(key) => Some(decode_public_key(key)?),
            None => None,
        };

        Ok(Self {
            http,
            endpoint,
            identity: config.identity.clone(),
            protocol: config.protocol,
            auth_token: config
                .auth_token
                .as_ref()
                .map(|t| SecretString::from(t.expose_secret().to_owned())),
            public_key: OnceCell::new_with(pinned),
        })
    }

    fn url(&self, path: &str) -> Result<Url, SignerError> {
        self.endpoint
            .join(path)
            .map_err(|e| SignerError::Unreachable(format!("invalid signer url: {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn fetch_public_key(&self) -> Result<Vec<u8>, SignerError> {
        let mut url = self.url("public_key")?;
        url.query_pairs_mut().append_pair("identity", &self.identity);

        let body = self.round_trip(self.http.get(url)).await?;
        let reply: PublicKeyReply = serde_json::from_str(&body)
            .map_err(|e| SignerError::InvalidResponse(format!("public key reply: {e}")))?;
        let key = decode_hex("public_key", &reply.public_key)?;
        pubkey_to_address(&key).map_err(|e| SignerError::InvalidResponse(e.to_string()))?;

        debug!("Fetched signer public key: identity={}", self.identity);
        Ok(key)
    }

    /// Sends one request and returns the body of a successful response.
    async fn round_trip(&self, request: RequestBuilder) -> Result<String, SignerError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SignerError::Indeterminate(format!("failed to read signer reply: {e}")))?;

        if !status.is_success() {
            let err = classify_status(status, &body);
            warn!("Signer request failed: identity={}, status={}, error={}", self.identity, status, err);
            return Err(err);
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteSigner for HttpSigner {
    fn protocol(&self) -> SignerProtocol {
        self.protocol
    }

    async fn public_key(&self) -> Result<Vec<u8>, SignerError> {
        self.public_key
            .get_or_try_init(|| self.fetch_public_key())
            .await
            .cloned()
    }

    async fn sign(&self, payload: &[u8], chain_id: u64) -> Result<SignatureOutcome, SignerError> {
        let request = SignRequest {
            identity: &self.identity,
            chain_id,
            payload: format!("0x{}", hex::encode(payload)),
        };
        debug!(
            "Requesting signature: identity={}, chain_id={}, payload_len={}",
            self.identity,
            chain_id,
            payload.len()
        );

        // A compact reply is completed with this key, so it must be known
        // before the signer is asked to sign anything.
        let public_key = match self.protocol {
            SignerProtocol::RawSignature => Some(self.public_key().await?),
            SignerProtocol::SignedTransaction => None,
        };

        let body = self.round_trip(self.http.post(self.url("sign")?).json(&request)).await?;
        let reply: SignReply = serde_json::from_str(&body)
            .map_err(|e| SignerError::InvalidResponse(format!("sign reply: {e}")))?;

        let outcome = match parse_reply(self.protocol, reply)? {
            ParsedReply::Complete(outcome) => outcome,
            ParsedReply::Compact(compact) => {
                let public_key = public_key.ok_or_else(|| {
                    SignerError::Indeterminate("signer public key unavailable after signing".into())
                })?;
                let signature = complete_signature(payload, &compact, &public_key)
                    .map_err(|e| SignerError::InvalidResponse(e.to_string()))?;
                SignatureOutcome::Signature(signature)
            }
        };

        info!(
            "Signature received: identity={}, chain_id={}, protocol={:?}",
            self.identity, chain_id, self.protocol
        );
        Ok(outcome)
    }
}

/// Interprets a successful reply according to the declared protocol.
pub(crate) fn parse_reply(
    protocol: SignerProtocol,
    reply: SignReply,
) -> Result<ParsedReply, SignerError> {
    match protocol {
        SignerProtocol::SignedTransaction => {
            let signed = reply.signed_tx.ok_or_else(|| {
                SignerError::InvalidResponse("expected signed_tx in signer reply".into())
            })?;
            let raw = decode_hex("signed_tx", &signed)?;
            if raw.is_empty() {
                return Err(SignerError::InvalidResponse("signed_tx is empty".into()));
            }
            Ok(ParsedReply::Complete(SignatureOutcome::Signed(Bytes::from(raw))))
        }
        SignerProtocol::RawSignature => {
            if let (Some(r), Some(s), Some(v)) = (&reply.r, &reply.s, reply.recovery_id) {
                let recovery_id = if v >= 27 { v - 27 } else { v };
                let signature = RawSignature::from_slices(
                    &decode_hex("r", r)?,
                    &decode_hex("s", s)?,
                    recovery_id,
                )
                .map_err(|e| SignerError::InvalidResponse(e.to_string()))?;
                return Ok(ParsedReply::Complete(SignatureOutcome::Signature(signature)));
            }

            let Some(sig) = &reply.signature else {
                return Err(SignerError::InvalidResponse(
                    "expected r, s and recovery_id or signature in signer reply".into(),
                ));
            };
            let bytes = decode_hex("signature", sig)?;
            match bytes.len() {
                65 => RawSignature::from_rsv(&bytes)
                    .map(|s| ParsedReply::Complete(SignatureOutcome::Signature(s)))
                    .map_err(|e| SignerError::InvalidResponse(e.to_string())),
                64 => Ok(ParsedReply::Compact(bytes)),
                n => Err(SignerError::InvalidResponse(format!(
                    "signature must be 64 or 65 bytes, got {n}"
                ))),
            }
        }
    }
}

/// Maps a non-success HTTP status to a [`SignerError`].
pub(crate) fn classify_status(status: StatusCode, body: &str) -> SignerError {
    let reason = serde_json::from_str::<ErrorReply>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_owned());
    let reason = if reason.is_empty() {
        status.to_string()
    } else {
        reason
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SignerError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            SignerError::Indeterminate(reason)
        }
        StatusCode::SERVICE_UNAVAILABLE => SignerError::Unreachable(reason),
        _ => SignerError::Rejected(reason),
    }
}

fn classify_transport(e: reqwest::Error) -> SignerError {
    // A failed connect never delivered the request; anything later might have.
    if e.is_connect() || e.is_builder() {
        SignerError::Unreachable(e.to_string())
    } else {
        SignerError::Indeterminate(e.to_string())
    }
}

fn decode_hex(field: &str, input: &str) -> Result<Vec<u8>, SignerError> {
    let hex_str = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(hex_str).map_err(|e| SignerError::InvalidResponse(format!("{field}: invalid hex: {e}")))
}
