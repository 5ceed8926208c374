//! Test fixtures: RSA issuer keys, token minting, an in-memory key-set source
//! and an in-memory SQLite pool.
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, get_current_timestamp};
use serde_json::{Value, json};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use url::Url;

use crate::{
    config::Config,
    repos::drink_repo,
    services::auth::{
        AuthGuard,
        factory::build_with_source,
        jwks::{JwkSet, KeySet, KeySetError, KeySetSource, SigningKey},
        key_resolver::{KeyCache, KeyResolver},
        verifier::ClaimsVerifier,
    },
    state::AppState,
};

pub const ISSUER: &str = "https://coffee-test.us.auth0.com/";
pub const AUDIENCE: &str = "drinks";
pub const ISSUER_KID: &str = "issuer-key-1";
pub const ROTATED_KID: &str = "issuer-key-2";

const ISSUER_PEM: &str = include_str!("../tests/fixtures/issuer_rsa_private.pem");
const ROGUE_PEM: &str = include_str!("../tests/fixtures/rogue_rsa_private.pem");

/// Modulus of `issuer_rsa_private.pem` (base64url, no padding).
pub const ISSUER_N: &str = "tBwm3rk9tgzu4F_T1slmEMXh_zdebcWXaurWcHTqm28M43vZs1Ux63PCqdoG4S2E0c7Y_v-_V_UfA25OXk61vlDLBc5DlyaY6gLUQdFnf9fjbhuRaQV0gdhV0gDpaj9V29BghSYcoS3J8-Psih_iWmKp2-Th5C48Bkx7OGTybJWnw5OpeHrRps-ewe_dr9eNvqurvL3gZt0mFrrFhy-OPH3qIPuDrfirpDt4BIS9kCBQNY1PpN07EZDOmh__eWg-yedyWDn6M2YelPVko5mR5mWR2lrqhFutFr9C88Bbet0HbrdZ_IIPc3YNFeeRRUpwMNjsG4hEfzwE0wutjslKFQ";
/// Modulus of `rogue_rsa_private.pem`.
pub const ROGUE_N: &str = "s5LeVJWmi-Tbr3Wk9b_Tre_qD817kuCfxFFyfvgPvkTRLlhWCLq61Ihe42fQkJuSVqSrKhMu9kVFnrLvHI77XwV9bhUW0Vyrw9o6Pzaz6AivbxJMCWotFGK_Lxe3i6_KhPlG_MX50_O17ZxPOz3Pe5vW0cXRvniVPnV4Zm5IaPywBHo_0sddkQ_WWJacqjBmCHhHtdnDTr8DBc4sVweVyw7Ck0ao0mTLapIkd6rEnLJRxELgMqAQF5l_9HK-4x_f5dej4zABFrGRcgNV4-A7wr68Cy4jCEjt-I1M4Q8Nfng_zS6V5N_kQK-dJYUDZBTn4VPmFW6FrV2I9xqZybxHFw";

fn rsa_jwks(keys: &[(&str, &str)]) -> JwkSet {
    let keys: Vec<Value> = keys
        .iter()
        .map(|(kid, n)| {
            json!({"kid": kid, "kty": "RSA", "alg": "RS256", "use": "sig", "n": n, "e": "AQAB"})
        })
        .collect();
    serde_json::from_value(json!({ "keys": keys })).expect("jwks")
}

/// The issuer's key set as served on the wire.
pub fn issuer_jwks_body() -> String {
    json!({"keys": [{"kid": ISSUER_KID, "kty": "RSA", "alg": "RS256", "use": "sig", "n": ISSUER_N, "e": "AQAB"}]})
        .to_string()
}

pub fn issuer_jwks() -> JwkSet {
    rsa_jwks(&[(ISSUER_KID, ISSUER_N)])
}

/// The issuer rotated to a new key and dropped the old one.
pub fn rotated_jwks() -> JwkSet {
    rsa_jwks(&[(ROTATED_KID, ROGUE_N)])
}

pub fn issuer_signing_key() -> SigningKey {
    let set = KeySet::from_jwks(&issuer_jwks());
    SigningKey::clone(&set.get(ISSUER_KID).expect("issuer key"))
}

/// Claims for a valid token from `ISSUER` to `AUDIENCE`, expiring in an hour.
pub fn claims(permissions: &[&str]) -> Value {
    let now = get_current_timestamp();
    json!({
        "iss": ISSUER,
        "sub": "auth0|barista",
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 3600,
        "permissions": permissions,
    })
}

fn encode(claims: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("rsa pem");
    jsonwebtoken::encode(&header, claims, &key).expect("sign")
}

pub fn sign(claims: &Value) -> String {
    encode(claims, Some(ISSUER_KID), ISSUER_PEM)
}

pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    encode(claims, Some(kid), ISSUER_PEM)
}

pub fn sign_without_kid(claims: &Value) -> String {
    encode(claims, None, ISSUER_PEM)
}

/// Signed with a key the issuer never published, but labelled with the issuer's kid.
pub fn sign_with_rogue_key(claims: &Value) -> String {
    encode(claims, Some(ISSUER_KID), ROGUE_PEM)
}

pub fn issuer_token(permissions: &[&str]) -> String {
    sign(&claims(permissions))
}

/// In-memory key set that counts fetches. `None` makes every fetch fail.
pub struct StaticKeySetSource {
    jwks: Mutex<Option<JwkSet>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl StaticKeySetSource {
    pub fn new(jwks: JwkSet) -> Self {
        Self {
            jwks: Mutex::new(Some(jwks)),
            fetches: AtomicUsize::new(0),
            // widen the window for concurrent callers
            delay: Duration::from_millis(10),
        }
    }

    pub fn failing() -> Self {
        Self {
            jwks: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            delay: Duration::from_millis(10),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, jwks: JwkSet) {
        *self.jwks.lock().expect("lock") = Some(jwks);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    fn describe(&self) -> String {
        "static".to_string()
    }

    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        self.jwks
            .lock()
            .expect("lock")
            .clone()
            .ok_or(KeySetError::Status(503))
    }
}

pub fn guard() -> (AuthGuard, Arc<StaticKeySetSource>) {
    let source = Arc::new(StaticKeySetSource::new(issuer_jwks()));
    let resolver = KeyResolver::new(source.clone(), Arc::new(KeyCache::new()), Duration::ZERO);
    let verifier = ClaimsVerifier::new(ISSUER, AUDIENCE, 60);
    (AuthGuard::new(resolver, verifier), source)
}

pub fn config() -> Config {
    Config::from_vars(|key| match key {
        "AUTH_ISSUER" => Some(ISSUER.to_string()),
        "AUTH_AUDIENCE" => Some(AUDIENCE.to_string()),
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "JWKS_REFRESH_COOLDOWN_SECONDS" => Some("0".to_string()),
        _ => None,
    })
    .expect("test config")
}

/// Single-connection pool: every `:memory:` connection is its own database.
pub async fn memory_pool() -> SqlitePool {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("sqlite memory pool");
    drink_repo::ensure_schema(&db).await.expect("schema");
    db
}

pub async fn app_state() -> (AppState, Arc<StaticKeySetSource>) {
    let source = Arc::new(StaticKeySetSource::new(issuer_jwks()));
    let auth = build_with_source(&config(), source.clone(), Arc::new(KeyCache::new()));
    (AppState::new(memory_pool().await, Arc::new(auth)), source)
}

pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Single-connection HTTP stub for the key-set endpoint.
/// `None` accepts the connection and never answers.
pub async fn key_set_server(response: Option<String>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        // request head only; GET has no body
        let mut buf = vec![0u8; 4096];
        let mut read = 0;
        while read < buf.len() && !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf[read..]).await {
                Ok(0) | Err(_) => return,
                Ok(n) => read += n,
            }
        }

        match response {
            Some(response) => {
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
            None => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            }
        }
    });

    Url::parse(&format!("http://{addr}/.well-known/jwks.json")).expect("url")
}
