//! Auth Guard: header → key → claims → permission, then the downstream operation.
//!
//! `Start → HeaderExtracted → KeyResolved → ClaimsVerified → PermissionChecked → Authorized`
//!
//! Each stage fails fast with an `AuthError`; nothing is retried.

use std::future::Future;

use crate::services::auth::{
    bearer,
    error::{AuthError, AuthStage},
    key_resolver::KeyResolver,
    permissions,
    verifier::{Claims, ClaimsVerifier},
};

#[derive(Debug)]
pub struct AuthGuard {
    resolver: KeyResolver,
    verifier: ClaimsVerifier,
}

impl AuthGuard {
    pub fn new(resolver: KeyResolver, verifier: ClaimsVerifier) -> Self {
        Self { resolver, verifier }
    }

    /// Run every stage and return the verified claims on `Authorized`.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        required: &str,
    ) -> Result<Claims, AuthError> {
        let token = bearer::extract_token(authorization)?;
        tracing::trace!(stage = ?AuthStage::HeaderExtracted);

        let key = self.resolver.resolve(token).await?;
        tracing::trace!(stage = ?AuthStage::KeyResolved, kid = %key.kid);

        let claims = self.verifier.verify(token, &key)?;
        tracing::trace!(stage = ?AuthStage::ClaimsVerified);

        permissions::check_permission(&claims, required)?;
        tracing::trace!(stage = ?AuthStage::PermissionChecked);

        tracing::debug!(stage = ?AuthStage::Authorized, permission = %required, sub = ?claims.subject());
        Ok(claims)
    }

    /// Wrap `op` with a permission requirement.
    ///
    /// `op` runs at most once, only after authorization succeeded, and its
    /// output is returned untouched.
    pub async fn guard<F, Fut, T>(
        &self,
        authorization: Option<&str>,
        required: &str,
        op: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(Claims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self
            .authorize(authorization, required)
            .await
            .inspect_err(|err| {
                tracing::warn!(
                    code = err.code(),
                    stage = ?err.stage(),
                    permission = %required,
                    error = %err,
                    "request rejected"
                );
            })?;

        Ok(op(claims).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::test_support;
    use jsonwebtoken::get_current_timestamp;
    use serde_json::json;

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn missing_header_rejects_before_any_fetch() {
        let (guard, source) = test_support::guard();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let res = guard
            .guard(None, "get:drinks", |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(res, Err(AuthError::MissingHeader));
        assert_eq!(source.fetch_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_header_rejects() {
        let (guard, source) = test_support::guard();
        let token = test_support::issuer_token(&["get:drinks"]);

        for header in [format!("Token {token}"), format!("Bearer {token} extra")] {
            let res = guard.authorize(Some(&header), "get:drinks").await;
            assert_eq!(res, Err(AuthError::MalformedHeader));
        }
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn denied_permission_never_invokes_downstream() {
        let (guard, _) = test_support::guard();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let header = bearer(&test_support::issuer_token(&["get:drinks"]));

        let res = guard
            .guard(Some(&header), "delete:drinks", |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(matches!(res, Err(AuthError::PermissionDenied { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authorized_invokes_downstream_once_and_passes_result_through() {
        let (guard, _) = test_support::guard();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let header = bearer(&test_support::issuer_token(&["patch:drinks"]));

        let res: Result<Result<u32, &str>, AuthError> = guard
            .guard(Some(&header), "patch:drinks", |claims| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(claims.subject(), Some("auth0|barista"));
                Err("downstream failure")
            })
            .await;

        assert_eq!(res, Ok(Err("downstream failure")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_token_twice_yields_same_outcome() {
        let (guard, source) = test_support::guard();
        let header = bearer(&test_support::issuer_token(&["get:drinks"]));

        let first = guard.authorize(Some(&header), "get:drinks").await;
        let second = guard.authorize(Some(&header), "get:drinks").await;
        assert!(first.is_ok());
        assert_eq!(first, second);

        let first = guard.authorize(Some(&header), "post:drinks").await;
        let second = guard.authorize(Some(&header), "post:drinks").await;
        assert!(first.is_err());
        assert_eq!(first, second);

        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_but_fresh_one_proceeds() {
        let (guard, _) = test_support::guard();

        let mut claims = test_support::claims(&["get:drinks"]);
        claims["exp"] = json!(get_current_timestamp() - 3600);
        let expired = bearer(&test_support::sign(&claims));
        assert_eq!(
            guard.authorize(Some(&expired), "get:drinks").await,
            Err(AuthError::TokenExpired)
        );

        claims["exp"] = json!(get_current_timestamp() + 3600);
        let fresh = bearer(&test_support::sign(&claims));
        assert!(guard.authorize(Some(&fresh), "get:drinks").await.is_ok());
    }

    #[tokio::test]
    async fn foreign_key_is_key_not_found() {
        let (guard, _) = test_support::guard();
        let header = bearer(&test_support::sign_with_kid(
            &test_support::claims(&["get:drinks"]),
            "rogue",
        ));

        assert!(matches!(
            guard.authorize(Some(&header), "get:drinks").await,
            Err(AuthError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn token_without_permissions_claim() {
        let (guard, _) = test_support::guard();
        let mut claims = test_support::claims(&[]);
        claims.as_object_mut().expect("object").remove("permissions");
        let header = bearer(&test_support::sign(&claims));

        assert_eq!(
            guard.authorize(Some(&header), "get:drinks").await,
            Err(AuthError::PermissionsClaimMissing)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_guards_share_one_key_set_fetch() {
        let (guard, source) = test_support::guard();
        let guard = Arc::new(guard);
        let header = Arc::new(bearer(&test_support::issuer_token(&["get:drinks"])));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let guard = guard.clone();
                let header = header.clone();
                tokio::spawn(async move { guard.authorize(Some(&header), "get:drinks").await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.expect("join").is_ok());
        }
        assert_eq!(source.fetch_count(), 1);
    }
}
