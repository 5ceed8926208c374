pub mod bearer;
pub mod error;
pub mod factory;
pub mod guard;
pub mod jwks;
pub mod key_resolver;
pub mod permissions;
pub mod verifier;

pub use error::AuthError;
pub use factory::build_auth_guard;
pub use guard::AuthGuard;
pub use verifier::Claims;
