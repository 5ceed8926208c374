use jsonwebtoken::{Validation, errors::ErrorKind};
use serde_json::{Map, Value};

use crate::services::auth::{error::AuthError, jwks::SigningKey};

/// Verified token payload.
///
/// Only produced by `ClaimsVerifier::verify`, so holding one means the
/// signature, `exp`, `aud` and `iss` checks passed.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// `None` when the token carries no `permissions` array at all.
    pub fn permissions(&self) -> Option<impl Iterator<Item = &str>> {
        let arr = self.0.get("permissions")?.as_array()?;
        Some(arr.iter().filter_map(Value::as_str))
    }

    #[cfg(test)]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Signature + standard claim checks for access tokens from one issuer.
#[derive(Debug, Clone)]
pub struct ClaimsVerifier {
    issuer: String,
    audience: String,
    leeway_seconds: u64,
}

impl ClaimsVerifier {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, leeway_seconds: u64) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds,
        }
    }

    /// Verify `token` against `key` and return its claims.
    ///
    /// `jsonwebtoken` checks, in order: header `alg` matches the key's
    /// algorithm, the signature, then `exp` (with leeway), `iss` and `aud`.
    /// All three claims are required.
    pub fn verify(&self, token: &str, key: &SigningKey) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(key.algorithm);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.leeway_seconds;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key.decoding_key, &validation)
            .map_err(|e| {
                let err = map_jwt_error(e.kind());
                tracing::debug!(error = %e, kid = %key.kid, "token verification failed");
                err
            })?;

        Ok(Claims(data.claims))
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "aud" => AuthError::InvalidAudience,
            "iss" => AuthError::InvalidIssuer,
            // exp missing: the token can never be considered fresh
            _ => AuthError::TokenExpired,
        },
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::MalformedToken,
        // InvalidSignature, InvalidAlgorithm, key/crypto failures
        _ => AuthError::InvalidSignature,
    }
}
