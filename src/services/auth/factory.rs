/// Factory: build `AuthGuard` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::{
    AuthGuard,
    jwks::{HttpKeySetSource, KeySetSource},
    key_resolver::{KeyCache, KeyResolver},
    verifier::ClaimsVerifier,
};

/// `cache` is owned by the caller so its lifetime is explicit (process-wide in `app::run`).
pub fn build_auth_guard(config: &Config, cache: Arc<KeyCache>) -> Result<Arc<AuthGuard>, AppError> {
    let source = HttpKeySetSource::new(config.auth_jwks_url.clone(), config.jwks_fetch_timeout)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to build key set http client");
            AppError::Internal
        })?;

    Ok(Arc::new(build_with_source(config, Arc::new(source), cache)))
}

pub fn build_with_source(
    config: &Config,
    source: Arc<dyn KeySetSource>,
    cache: Arc<KeyCache>,
) -> AuthGuard {
    let resolver = KeyResolver::new(source, cache, config.jwks_refresh_cooldown);
    let verifier = ClaimsVerifier::new(
        &config.auth_issuer,
        &config.auth_audience,
        config.access_token_leeway_seconds,
    );

    AuthGuard::new(resolver, verifier)
}
