use tracing::warn;

use shared_models::{AppError, Role, Session};

use crate::services::identity::IdentityProvider;

/// Admit only a signed-in viewer of `role`; anyone else is sent to the
/// sign-in route for that role.
pub fn require_role(provider: &IdentityProvider, role: Role) -> Result<Session, AppError> {
    match provider.current() {
        Some(session) if session.role() == role => Ok(session),
        Some(session) => {
            warn!("Viewer with role {} cannot open a {} view", session.role(), role);
            Err(AppError::auth_required(role.sign_in_route()))
        }
        None => Err(AppError::auth_required(role.sign_in_route())),
    }
}
