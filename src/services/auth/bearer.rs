//! `Authorization: Bearer <token>` ヘッダからトークン文字列だけを取り出す。
//!
//! payload の decode はここでは行わない (key_resolver / verifier の責務)。

use crate::services::auth::error::AuthError;

/// Extract the raw token from an `Authorization` header value.
///
/// - `None` means the header was not sent at all.
/// - The value must be exactly `<scheme> <token>` with a single space and a
///   case-insensitive `Bearer` scheme.
pub fn extract_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let value = authorization.ok_or(AuthError::MissingHeader)?;

    let mut parts = value.split(' ');
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedHeader);
    };

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}
