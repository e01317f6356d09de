//! Best-effort email notifications.

use crate::server::state::AppState;
use edumarket_core::UserId;

/// Email `user_id`. Failures are logged, never returned.
pub(crate) async fn user(state: &AppState, user_id: UserId, subject: &str, message: &str) {
    let email = match state.users.find_user(user_id).await {
        Ok(Some(user)) => user.email,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(user_id = %user_id, error = %error, "Could not load notification recipient");
            return;
        }
    };
    if let Err(error) = state.auth.email().send_notification(&email, subject, message).await {
        tracing::warn!(user_id = %user_id, subject, error = %error, "Notification email failed");
    }
}
