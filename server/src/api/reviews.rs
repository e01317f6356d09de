//! Reviews: one per enrolled student and item.

use super::visible_content;
use crate::auth::{CurrentUser, OptionalUser};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use edumarket_core::model::{Review, ReviewPage};
use edumarket_core::{ContentId, PageRequest, ReviewId, validation};
use edumarket_web::{AppError, WebResult};
use serde::Deserialize;

/// Review body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    /// 1 to 5 stars
    pub rating: u8,
    /// Optional text
    #[serde(default)]
    pub body: String,
}

/// `PUT /api/contents/:id/reviews`: create or replace the caller's review.
///
/// # Errors
///
/// - 403 for the item's teacher and for callers not enrolled in it
/// - 422 for a rating outside 1..=5 or an overlong body
pub async fn upsert_review(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(content_id): Path<ContentId>,
    Json(request): Json<ReviewRequest>,
) -> WebResult<Json<Review>> {
    let (content, owned) = visible_content(&state, current.viewer(), content_id).await?;
    if content.teacher_id == current.user.id {
        return Err(AppError::forbidden("You cannot review your own content"));
    }
    if !owned {
        return Err(AppError::forbidden("Only enrolled students can review this content"));
    }

    validation::rating(request.rating)?;
    let body = request.body.trim();
    validation::optional_text("body", body, validation::MAX_BODY_LEN)?;

    let review = state
        .engagement
        .upsert_review(content_id, current.user.id, request.rating, body, state.now())
        .await?;
    tracing::info!(content_id = %content_id, user_id = %current.user.id, rating = request.rating, "Review saved");
    Ok(Json(review))
}

/// `GET /api/contents/:id/reviews`: newest first, with the rating summary.
///
/// # Errors
///
/// Returns 404 for items the caller may not see.
pub async fn list_reviews(
    State(state): State<AppState>,
    caller: OptionalUser,
    Path(content_id): Path<ContentId>,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<ReviewPage>> {
    visible_content(&state, caller.viewer(), content_id).await?;
    let summary = state.engagement.rating_summary(content_id).await?;
    let reviews = state.engagement.list_reviews(content_id, page.clamped()).await?;
    Ok(Json(ReviewPage { summary, reviews }))
}

/// `DELETE /api/reviews/:id`: by its author or an admin.
///
/// # Errors
///
/// Returns 403 for anyone else.
pub async fn delete_review(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<ReviewId>,
) -> WebResult<StatusCode> {
    let review = state
        .engagement
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review", id))?;
    if review.user_id != current.user.id && !current.is_admin() {
        return Err(AppError::forbidden("You can only delete your own reviews"));
    }
    state.engagement.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
