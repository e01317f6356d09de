//! Threaded comments on content.

use super::{accessible_content, load_content};
use crate::auth::CurrentUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use edumarket_core::access;
use edumarket_core::model::{Comment, CommentThread};
use edumarket_core::{CommentId, ContentId, validation};
use edumarket_web::{AppError, WebResult};
use serde::Deserialize;

/// New comment or reply.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    /// Comment text
    pub body: String,
    /// Comment being replied to
    pub parent_id: Option<CommentId>,
}

/// `POST /api/contents/:id/comments`
///
/// # Errors
///
/// - 403 without access to the item
/// - 422 for a blank body or a parent on another item
pub async fn add_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(content_id): Path<ContentId>,
    Json(request): Json<CommentRequest>,
) -> WebResult<(StatusCode, Json<Comment>)> {
    accessible_content(&state, current.viewer(), content_id).await?;
    let body = request.body.trim();
    validation::body(body)?;

    if let Some(parent_id) = request.parent_id {
        let parent = state
            .engagement
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::validation(format!("Comment {parent_id} does not exist")))?;
        if parent.content_id != content_id {
            return Err(AppError::validation("A reply must be posted on the same content"));
        }
    }

    let comment = state
        .engagement
        .add_comment(content_id, current.user.id, request.parent_id, body, state.now())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET /api/contents/:id/comments`: top-level comments with nested replies.
///
/// # Errors
///
/// Returns 403 without access to the item.
pub async fn list_comments(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(content_id): Path<ContentId>,
) -> WebResult<Json<Vec<CommentThread>>> {
    accessible_content(&state, current.viewer(), content_id).await?;
    let comments = state.engagement.comments(content_id).await?;
    Ok(Json(CommentThread::build(comments)))
}

/// `DELETE /api/comments/:id`: removes the comment and its replies.
///
/// # Errors
///
/// Returns 403 unless the caller wrote it, owns the content or is an admin.
pub async fn delete_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<CommentId>,
) -> WebResult<StatusCode> {
    let comment = state
        .engagement
        .get_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment", id))?;

    if comment.user_id != current.user.id {
        let content = load_content(&state, comment.content_id).await?;
        if !access::can_manage(current.viewer(), &content) {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }
    }

    state.engagement.delete_comment(id).await?;
    tracing::info!(comment_id = %id, user_id = %current.user.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
