use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::{AuthError, Claims};

/// Handler で、検証済み Claims を受け取るための extractor
/// `require_permission` が Claims を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 を返す（permission が掛かっていない route）
pub struct VerifiedClaims(pub Claims);

impl<S> FromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(VerifiedClaims)
            .ok_or(AppError::Auth(AuthError::MissingHeader))
    }
}
