/*!
 * Identity extractors
 *
 * Responsibility:
 * - hand the identity attached by the authentication gate to handlers
 *
 * Public API:
 * - CurrentIdentity: routes behind required-mode authentication
 * - MaybeIdentity: routes behind optional-mode authentication
 */

mod core;

pub use self::core::{CurrentIdentity, MaybeIdentity};
