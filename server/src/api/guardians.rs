//! Guardian links.
//!
//! A guardian asks to be linked to a student by email; once the student
//! accepts, the guardian may buy content for them and follow their library
//! and quiz results.

use super::notify;
use crate::auth::{CurrentUser, RequireGuardian};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use edumarket_core::model::{GuardianLink, LibraryEntry, QuizAttempt, User};
use edumarket_core::{GuardianLinkId, Role, UserId, validation};
use edumarket_web::{AppError, WebResult};
use serde::Deserialize;

/// Link request.
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    /// Email of the student account
    pub student_email: String,
}

/// `POST /api/guardians/links`
///
/// # Errors
///
/// - 404 if no account has that email
/// - 409 if a pending or accepted link already exists
/// - 422 if the account is not a student
pub async fn create_link(
    State(state): State<AppState>,
    RequireGuardian(guardian): RequireGuardian,
    Json(request): Json<LinkRequest>,
) -> WebResult<(StatusCode, Json<GuardianLink>)> {
    let email = validation::normalize_email(&request.student_email);
    let student = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("Student", &email))?;
    if student.role != Role::Student {
        return Err(AppError::validation("Guardians can only link to student accounts"));
    }

    let link = state.users.create_link(guardian.id, student.id, state.now()).await?;
    tracing::info!(link_id = %link.id, guardian_id = %guardian.id, student_id = %student.id, "Guardian link requested");

    notify::user(
        &state,
        student.id,
        "A guardian wants to link to your account",
        &format!("{} asked to be your guardian on Edumarket.", guardian.name),
    )
    .await;
    Ok((StatusCode::CREATED, Json(link)))
}

/// `GET /api/guardians/links`: outgoing for guardians, incoming for students.
///
/// # Errors
///
/// Returns 403 for teachers and admins.
pub async fn list_links(State(state): State<AppState>, current: CurrentUser) -> WebResult<Json<Vec<GuardianLink>>> {
    let links = match current.user.role {
        Role::Guardian => state.users.links_for_guardian(current.user.id).await?,
        Role::Student => state.users.links_for_student(current.user.id).await?,
        Role::Teacher | Role::Admin => {
            return Err(AppError::forbidden("Only guardians and students have links"));
        }
    };
    Ok(Json(links))
}

async fn respond(state: &AppState, current: &CurrentUser, id: GuardianLinkId, accept: bool) -> WebResult<GuardianLink> {
    let link = state
        .users
        .get_link(id)
        .await?
        .filter(|l| l.student_id == current.user.id || l.guardian_id == current.user.id)
        .ok_or_else(|| AppError::not_found("Guardian link", id))?;
    if link.student_id != current.user.id {
        return Err(AppError::forbidden("Only the student can answer a guardian request"));
    }

    let link = state.users.respond_link(id, accept, state.now()).await?;
    tracing::info!(link_id = %id, status = %link.status, "Guardian link answered");
    Ok(link)
}

/// `POST /api/guardians/links/:id/accept`
///
/// # Errors
///
/// - 403 for the guardian
/// - 409 unless the link is pending
pub async fn accept_link(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<GuardianLinkId>,
) -> WebResult<Json<GuardianLink>> {
    Ok(Json(respond(&state, &current, id, true).await?))
}

/// `POST /api/guardians/links/:id/decline`
///
/// # Errors
///
/// - 403 for the guardian
/// - 409 unless the link is pending
pub async fn decline_link(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<GuardianLinkId>,
) -> WebResult<Json<GuardianLink>> {
    Ok(Json(respond(&state, &current, id, false).await?))
}

/// `GET /api/guardians/students`
///
/// # Errors
///
/// Returns 403 unless the caller is a guardian.
pub async fn students(
    State(state): State<AppState>,
    RequireGuardian(guardian): RequireGuardian,
) -> WebResult<Json<Vec<User>>> {
    Ok(Json(state.users.students_of(guardian.id).await?))
}

async fn ensure_linked(state: &AppState, guardian: &User, student_id: UserId) -> WebResult<()> {
    if state.users.is_guardian_of(guardian.id, student_id).await? {
        Ok(())
    } else {
        Err(AppError::forbidden("This student has not accepted your guardian request"))
    }
}

/// `GET /api/guardians/students/:id/library`
///
/// # Errors
///
/// Returns 403 without an accepted link.
pub async fn student_library(
    State(state): State<AppState>,
    RequireGuardian(guardian): RequireGuardian,
    Path(student_id): Path<UserId>,
) -> WebResult<Json<Vec<LibraryEntry>>> {
    ensure_linked(&state, &guardian, student_id).await?;
    Ok(Json(state.commerce.library(student_id).await?))
}

/// `GET /api/guardians/students/:id/attempts`
///
/// # Errors
///
/// Returns 403 without an accepted link.
pub async fn student_attempts(
    State(state): State<AppState>,
    RequireGuardian(guardian): RequireGuardian,
    Path(student_id): Path<UserId>,
) -> WebResult<Json<Vec<QuizAttempt>>> {
    ensure_linked(&state, &guardian, student_id).await?;
    Ok(Json(state.engagement.attempts(student_id, None).await?))
}
