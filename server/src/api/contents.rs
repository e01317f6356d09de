//! Content management endpoints.
//!
//! - POST /api/contents - Create a draft (teacher)
//! - GET /api/contents - Browse published content
//! - GET /api/contents/:id - Content details
//! - PATCH /api/contents/:id - Edit or change status (owner/admin)
//! - DELETE /api/contents/:id - Archive (owner/admin)
//! - GET /api/teachers/me/contents - The teacher's own content

use super::{managed_content, visible_content};
use crate::auth::{CurrentUser, OptionalUser, RequireTeacher};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use edumarket_core::access;
use edumarket_core::model::{Content, ContentFilter, ContentListing, ContentPatch, NewContent, RatingSummary};
use edumarket_core::{ContentId, ContentKind, ContentStatus, MarketError, Page, PageRequest, validation};
use edumarket_web::{AppError, WebResult};
use serde::Serialize;

/// Content details.
#[derive(Debug, Serialize)]
pub struct ContentDetail {
    /// The item
    #[serde(flatten)]
    pub content: Content,
    /// Lectures and quizzes of a course visible to the caller
    pub children: Vec<Content>,
    /// Review average and count
    pub rating: RatingSummary,
    /// Whether the caller is enrolled, directly or through the course
    pub owned: bool,
}

fn validate_fields(title: Option<&str>, description: Option<&str>, subject: Option<&str>) -> WebResult<()> {
    if let Some(title) = title {
        validation::title(title)?;
    }
    if let Some(description) = description {
        validation::optional_text("description", description, validation::MAX_DESCRIPTION_LEN)?;
    }
    if let Some(subject) = subject {
        validation::optional_text("subject", subject, validation::MAX_NAME_LEN)?;
    }
    Ok(())
}

/// Create a draft.
///
/// # Errors
///
/// - 403 unless the caller is a teacher
/// - 422 for invalid fields or a disallowed parent
pub async fn create_content(
    State(state): State<AppState>,
    RequireTeacher(teacher): RequireTeacher,
    Json(mut request): Json<NewContent>,
) -> WebResult<(StatusCode, Json<Content>)> {
    request.title = request.title.trim().to_string();
    request.subject = request.subject.trim().to_lowercase();
    validate_fields(Some(&request.title), Some(&request.description), Some(&request.subject))?;

    let parent = match request.parent_id {
        Some(parent_id) => Some(
            state
                .catalog
                .get_content(parent_id)
                .await?
                .ok_or_else(|| AppError::validation(format!("Parent course {parent_id} does not exist")))?,
        ),
        None => None,
    };
    validation::hierarchy(request.kind, teacher.id, parent.as_ref())?;

    let content = state.catalog.create_content(teacher.id, request, state.now()).await?;
    tracing::info!(content_id = %content.id, teacher_id = %teacher.id, kind = %content.kind, "Content created");
    Ok((StatusCode::CREATED, Json(content)))
}

/// Browse the published catalog.
///
/// ```text
/// GET /api/contents?kind=course&subject=math&q=algebra&max_price=5000&page=1
/// ```
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_contents(
    State(state): State<AppState>,
    Query(filter): Query<ContentFilter>,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<ContentListing>>> {
    Ok(Json(state.catalog.list_published(filter, page.clamped()).await?))
}

/// Content details with the course outline.
///
/// # Errors
///
/// Returns 404 for unknown items and for drafts the caller may not see.
pub async fn get_content(
    State(state): State<AppState>,
    caller: OptionalUser,
    Path(id): Path<ContentId>,
) -> WebResult<Json<ContentDetail>> {
    let viewer = caller.viewer();
    let (content, owned) = visible_content(&state, viewer, id).await?;

    let children = if content.kind == ContentKind::Course {
        state
            .catalog
            .children(id)
            .await?
            .into_iter()
            .filter(|child| access::can_view(viewer, child, owned))
            .collect()
    } else {
        Vec::new()
    };
    let rating = state.engagement.rating_summary(id).await?;

    Ok(Json(ContentDetail {
        content,
        children,
        rating,
        owned,
    }))
}

/// Edit an item or move it between draft, published and archived.
///
/// # Errors
///
/// - 403 unless the caller owns the item or is an admin
/// - 409 for a disallowed status change
/// - 422 for invalid fields, an empty patch, or publishing an incomplete item
pub async fn update_content(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<ContentId>,
    Json(mut patch): Json<ContentPatch>,
) -> WebResult<Json<Content>> {
    if patch.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }
    let content = managed_content(&state, current.viewer(), id).await?;

    if let Some(title) = patch.title.as_mut() {
        *title = title.trim().to_string();
    }
    if let Some(subject) = patch.subject.as_mut() {
        *subject = subject.trim().to_lowercase();
    }
    validate_fields(patch.title.as_deref(), patch.description.as_deref(), patch.subject.as_deref())?;

    match patch.status {
        Some(next) if next == content.status => patch.status = None,
        Some(next) => check_transition(&state, &content, next, &patch).await?,
        None => {}
    }

    let updated = state.catalog.update_content(id, patch, state.now()).await?;
    if updated.status != content.status {
        tracing::info!(content_id = %id, from = %content.status, to = %updated.status, "Content status changed");
    }
    Ok(Json(updated))
}

async fn check_transition(state: &AppState, content: &Content, next: ContentStatus, patch: &ContentPatch) -> WebResult<()> {
    if !content.status.can_transition_to(next) {
        return Err(MarketError::InvalidTransition {
            entity: "Content",
            from: content.status.to_string(),
            to: next.to_string(),
        }
        .into());
    }
    if next != ContentStatus::Published {
        return Ok(());
    }

    let description = patch.description.as_deref().unwrap_or(&content.description);
    if description.trim().is_empty() {
        return Err(AppError::validation("Add a description before publishing"));
    }
    if content.kind == ContentKind::Quiz && state.catalog.questions(content.id).await?.is_empty() {
        return Err(AppError::validation("A quiz needs at least one question before publishing"));
    }
    Ok(())
}

/// Archive an item. Owners keep their access.
///
/// # Errors
///
/// Returns 403 unless the caller owns the item or is an admin.
pub async fn delete_content(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<ContentId>,
) -> WebResult<StatusCode> {
    let content = managed_content(&state, current.viewer(), id).await?;
    if content.status != ContentStatus::Archived {
        let patch = ContentPatch {
            status: Some(ContentStatus::Archived),
            ..ContentPatch::default()
        };
        state.catalog.update_content(id, patch, state.now()).await?;
        tracing::info!(content_id = %id, user_id = %current.user.id, "Content archived");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The teacher's own items in every status.
///
/// # Errors
///
/// Returns 403 unless the caller is a teacher.
pub async fn my_contents(
    State(state): State<AppState>,
    RequireTeacher(teacher): RequireTeacher,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<Content>>> {
    Ok(Json(state.catalog.list_by_teacher(teacher.id, page.clamped()).await?))
}

