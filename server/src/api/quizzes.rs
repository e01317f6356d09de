//! Quiz questions and attempts.
//!
//! - POST /api/quizzes/:id/questions - Add a question (owner)
//! - GET /api/quizzes/:id/questions - Questions, answers hidden from takers
//! - DELETE /api/questions/:id - Remove a question (owner/admin)
//! - POST /api/quizzes/:id/attempts - Submit answers
//! - GET /api/quizzes/:id/attempts - The caller's attempts

use super::{accessible_content, managed_content};
use crate::auth::CurrentUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use edumarket_core::access;
use edumarket_core::model::{Content, NewQuestion, QuizAttempt, QuizQuestion};
use edumarket_core::{AttemptId, ContentId, ContentKind, QuestionId, quiz, validation};
use edumarket_web::{AppError, WebResult};
use serde::{Deserialize, Serialize};

/// A question as shown to the caller.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    /// Question id
    pub id: QuestionId,
    /// Question text
    pub prompt: String,
    /// Answer options
    pub options: Vec<String>,
    /// Display position
    pub position: u32,
    /// Correct option, only for the quiz's managers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<u32>,
}

impl QuestionView {
    fn new(question: QuizQuestion, reveal: bool) -> Self {
        Self {
            id: question.id,
            prompt: question.prompt,
            options: question.options,
            position: question.position,
            correct_index: reveal.then_some(question.correct_index),
        }
    }
}

/// Answers to a quiz, one per question in display order.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Chosen option per question; `null` skips it
    pub answers: Vec<Option<u32>>,
}

/// A graded attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    /// The stored attempt
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    /// Rounded-down score percentage
    pub percent: u32,
}

fn ensure_quiz(content: &Content) -> WebResult<()> {
    if content.kind == ContentKind::Quiz {
        Ok(())
    } else {
        Err(AppError::validation(format!("{} is a {}, not a quiz", content.id, content.kind)))
    }
}

/// Append a question.
///
/// # Errors
///
/// - 403 unless the caller owns the quiz or is an admin
/// - 422 if the item is not a quiz or the question is invalid
pub async fn add_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(quiz_id): Path<ContentId>,
    Json(mut request): Json<NewQuestion>,
) -> WebResult<(StatusCode, Json<QuizQuestion>)> {
    let quiz = managed_content(&state, current.viewer(), quiz_id).await?;
    ensure_quiz(&quiz)?;

    request.prompt = request.prompt.trim().to_string();
    for option in &mut request.options {
        *option = option.trim().to_string();
    }
    validation::question(&request.prompt, &request.options, request.correct_index)?;

    let question = state.catalog.add_question(quiz_id, request).await?;
    tracing::debug!(quiz_id = %quiz_id, question_id = %question.id, "Question added");
    Ok((StatusCode::CREATED, Json(question)))
}

/// Questions in display order.
///
/// # Errors
///
/// - 403 unless the caller owns, bought or manages the quiz
/// - 404 for hidden or unknown quizzes
pub async fn list_questions(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(quiz_id): Path<ContentId>,
) -> WebResult<Json<Vec<QuestionView>>> {
    let viewer = current.viewer();
    let quiz = accessible_content(&state, viewer, quiz_id).await?;
    ensure_quiz(&quiz)?;

    let reveal = access::can_manage(viewer, &quiz);
    let questions = state.catalog.questions(quiz_id).await?;
    Ok(Json(questions.into_iter().map(|q| QuestionView::new(q, reveal)).collect()))
}

/// Remove a question.
///
/// # Errors
///
/// Returns 403 unless the caller owns the quiz or is an admin.
pub async fn delete_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<QuestionId>,
) -> WebResult<StatusCode> {
    let question = state
        .catalog
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::not_found("Question", id))?;
    managed_content(&state, current.viewer(), question.quiz_id).await?;

    state.catalog.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grade and store a submission.
///
/// # Errors
///
/// - 403 without access to the quiz
/// - 422 if the quiz has no questions or the answer count is wrong
pub async fn submit_attempt(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(quiz_id): Path<ContentId>,
    Json(request): Json<SubmitAttemptRequest>,
) -> WebResult<(StatusCode, Json<AttemptResult>)> {
    let quiz = accessible_content(&state, current.viewer(), quiz_id).await?;
    ensure_quiz(&quiz)?;

    let questions = state.catalog.questions(quiz_id).await?;
    let grade = quiz::grade(&questions, &request.answers)?;
    let attempt = state
        .engagement
        .record_attempt(QuizAttempt {
            id: AttemptId::new(),
            quiz_id,
            user_id: current.user.id,
            answers: request.answers,
            score: grade.score,
            max_score: grade.max_score,
            passed: grade.passed,
            created_at: state.now(),
        })
        .await?;

    tracing::info!(
        quiz_id = %quiz_id,
        user_id = %current.user.id,
        score = grade.score,
        max_score = grade.max_score,
        passed = grade.passed,
        "Quiz attempt graded"
    );
    Ok((
        StatusCode::CREATED,
        Json(AttemptResult {
            attempt,
            percent: grade.percent,
        }),
    ))
}

/// The caller's attempts at a quiz, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_attempts(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(quiz_id): Path<ContentId>,
) -> WebResult<Json<Vec<QuizAttempt>>> {
    Ok(Json(state.engagement.attempts(current.user.id, Some(quiz_id)).await?))
}
