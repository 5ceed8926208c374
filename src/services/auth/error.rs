/*
 * Responsibility
 * - 認可レイヤーの失敗理由 (AuthError) を 1 つの enum に集約する
 * - 失敗した stage / HTTP status / 説明文 の対応表をここに固定する
 * - HTTP レスポンスへの変換は error.rs (AppError) 側で行う
 */
use axum::http::StatusCode;
use thiserror::Error;

/// Guard の進行段階。`AuthError::stage()` は失敗直前に到達していた段階を返す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Start,
    HeaderExtracted,
    KeyResolved,
    ClaimsVerified,
    PermissionChecked,
    Authorized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header malformed")]
    MalformedHeader,
    #[error("token could not be parsed")]
    MalformedToken,
    #[error("no signing key for kid {kid:?}")]
    KeyNotFound { kid: String },
    #[error("signing key set unavailable: {reason}")]
    KeySetUnavailable { reason: String },
    #[error("token signature invalid")]
    InvalidSignature,
    #[error("token expired")]
    TokenExpired,
    #[error("token audience invalid")]
    InvalidAudience,
    #[error("token issuer invalid")]
    InvalidIssuer,
    #[error("permissions claim missing")]
    PermissionsClaimMissing,
    #[error("permission {required:?} not granted")]
    PermissionDenied { required: String },
}

impl AuthError {
    /// The stage the guard was in when this error rejected the request.
    pub fn stage(&self) -> AuthStage {
        match self {
            Self::MissingHeader | Self::MalformedHeader => AuthStage::Start,
            Self::MalformedToken | Self::KeyNotFound { .. } | Self::KeySetUnavailable { .. } => {
                AuthStage::HeaderExtracted
            }
            Self::InvalidSignature
            | Self::TokenExpired
            | Self::InvalidAudience
            | Self::InvalidIssuer => AuthStage::KeyResolved,
            Self::PermissionsClaimMissing | Self::PermissionDenied { .. } => {
                AuthStage::ClaimsVerified
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::KeySetUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::PermissionsClaimMissing => StatusCode::BAD_REQUEST,
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader => "authorization_header_missing",
            Self::MalformedHeader => "invalid_header",
            Self::MalformedToken => "invalid_token",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::KeySetUnavailable { .. } => "key_set_unavailable",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidAudience | Self::InvalidIssuer | Self::PermissionsClaimMissing => {
                "invalid_claims"
            }
            Self::PermissionDenied { .. } => "unauthorized",
        }
    }

    /// Description returned to the caller in the error envelope.
    ///
    /// Never includes token contents or key-set fetch details.
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingHeader => "Authorization header is expected.",
            Self::MalformedHeader => "Authorization header must be a bearer token.",
            Self::MalformedToken => "Unable to parse authentication token.",
            Self::KeyNotFound { .. } => "Unable to find the appropriate key.",
            Self::KeySetUnavailable { .. } => "Unable to fetch the signing key set.",
            Self::InvalidSignature => "Token signature is invalid.",
            Self::TokenExpired => "Token expired.",
            Self::InvalidAudience => "Incorrect claims. Please, check the audience.",
            Self::InvalidIssuer => "Incorrect claims. Please, check the issuer.",
            Self::PermissionsClaimMissing => "Permissions not included in JWT.",
            Self::PermissionDenied { .. } => "Permission not found.",
        }
    }
}
