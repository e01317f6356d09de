//! REST endpoints under `/api`.
//!
//! Handlers stay thin: validate input, check the caller's rights, call one
//! repository method per workflow, record metrics. Every workflow that
//! writes more than one row is a single repository call.

pub mod admin;
pub mod cart;
pub mod comments;
pub mod contents;
pub mod guardians;
pub mod orders;
pub mod payments;
pub mod quizzes;
pub mod reviews;
pub mod withdrawals;

mod notify;

use crate::server::state::AppState;
use edumarket_core::ContentId;
use edumarket_core::access::{self, Viewer};
use edumarket_core::model::Content;
use edumarket_web::{AppError, WebResult};

/// Load an item regardless of who asks.
async fn load_content(state: &AppState, id: ContentId) -> WebResult<Content> {
    state
        .catalog
        .get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", id))
}

/// Whether the viewer is enrolled in the item or its course.
async fn owns(state: &AppState, viewer: Viewer, id: ContentId) -> WebResult<bool> {
    match viewer.id() {
        Some(user_id) => Ok(state.commerce.owns(user_id, id).await?),
        None => Ok(false),
    }
}

/// Load an item the viewer may see; hidden items look missing.
async fn visible_content(state: &AppState, viewer: Viewer, id: ContentId) -> WebResult<(Content, bool)> {
    let content = load_content(state, id).await?;
    let owned = owns(state, viewer, id).await?;
    if !access::can_view(viewer, &content, owned) {
        return Err(AppError::not_found("Content", id));
    }
    Ok((content, owned))
}

/// Load an item whose protected material the viewer may read.
async fn accessible_content(state: &AppState, viewer: Viewer, id: ContentId) -> WebResult<Content> {
    let (content, owned) = visible_content(state, viewer, id).await?;
    if !access::can_access(viewer, &content, owned) {
        return Err(AppError::forbidden("Purchase this content to access it"));
    }
    Ok(content)
}

/// Load an item the viewer may edit.
async fn managed_content(state: &AppState, viewer: Viewer, id: ContentId) -> WebResult<Content> {
    let content = load_content(state, id).await?;
    if !access::can_manage(viewer, &content) {
        if access::can_view(viewer, &content, false) {
            return Err(AppError::forbidden("Only the owning teacher can change this content"));
        }
        return Err(AppError::not_found("Content", id));
    }
    Ok(content)
}
