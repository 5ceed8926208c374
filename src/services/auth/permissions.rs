use crate::services::auth::{error::AuthError, verifier::Claims};

/// Ensure the verified claims grant `required`.
pub fn check_permission(claims: &Claims, required: &str) -> Result<(), AuthError> {
    // A token without the array is misconfigured (RBAC not enabled for the API),
    // not merely under-privileged.
    let mut granted = claims
        .permissions()
        .ok_or(AuthError::PermissionsClaimMissing)?;

    if granted.any(|p| p == required) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied {
            required: required.to_string(),
        })
    }
}
