//! Issuer key set (JWKS): wire types, usable-key conversion and the fetch source.
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Key-set fetch failures. The resolver surfaces all of them as `KeySetUnavailable`.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set request timed out")]
    Timeout,
    #[error("key set request failed: {0}")]
    Transport(String),
    #[error("key set endpoint returned status {0}")]
    Status(u16),
    #[error("key set body is not a valid jwks document: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for KeySetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// JWKS document as published at `/.well-known/jwks.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A single published key. Only the members we need are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    // RSA
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,

    // OKP (Ed25519)
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
}

/// A key ready for signature verification.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub algorithm: Algorithm,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl SigningKey {
    /// Convert a published JWK into a verification key.
    ///
    /// Returns `None` for keys we cannot or must not use (no kid, encryption
    /// keys, unsupported kty/alg, broken key material).
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let kid = jwk.kid.as_deref().filter(|k| !k.is_empty())?;

        if let Some(key_use) = jwk.key_use.as_deref()
            && key_use != "sig"
        {
            return None;
        }

        let (algorithm, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let algorithm = match jwk.alg.as_deref() {
                    None => Algorithm::RS256,
                    Some(alg) => Algorithm::from_str(alg).ok()?,
                };
                if !matches!(
                    algorithm,
                    Algorithm::RS256
                        | Algorithm::RS384
                        | Algorithm::RS512
                        | Algorithm::PS256
                        | Algorithm::PS384
                        | Algorithm::PS512
                ) {
                    return None;
                }
                let key =
                    DecodingKey::from_rsa_components(jwk.n.as_deref()?, jwk.e.as_deref()?).ok()?;
                (algorithm, key)
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return None;
                }
                if let Some(alg) = jwk.alg.as_deref()
                    && alg != "EdDSA"
                {
                    return None;
                }
                let key = DecodingKey::from_ed_components(jwk.x.as_deref()?).ok()?;
                (Algorithm::EdDSA, key)
            }
            _ => return None,
        };

        Some(Self {
            kid: kid.to_string(),
            algorithm,
            decoding_key,
        })
    }
}

/// Immutable snapshot of the usable keys, indexed by kid.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
}

impl KeySet {
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Some(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                None => {
                    tracing::debug!(kid = ?jwk.kid, kty = %jwk.kty, alg = ?jwk.alg, "skipping unusable jwk");
                }
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Where the key set comes from.
///
/// Implementations must be safe to call concurrently; the resolver already
/// collapses concurrent refreshes into one call.
#[async_trait]
pub trait KeySetSource: Send + Sync + 'static {
    // Human-readable origin (for logging).
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches the key set over HTTP GET (no auth, no body).
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpKeySetSource {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Transport(e.to_string()))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let jwks = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;

        Ok(jwks)
    }
}
