/*!
 * Request extractors
 *
 * Public API:
 * - VerifiedClaims (require_permission が検証した Claims)
 */

mod claims;

pub use claims::VerifiedClaims;
