//! Ready-made accounts and catalog items.
//!
//! Every helper goes through the repository traits, so the fixtures work
//! against any backend. Display names default to the local part of the
//! email address.

use chrono::{DateTime, Utc};
use edumarket_core::model::{Content, ContentPatch, NewContent, NewQuestion, NewUser, QuizQuestion, User};
use edumarket_core::repository::{CatalogRepository, UserRepository};
use edumarket_core::{ContentKind, ContentStatus, Result, Role};

fn display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Create a user with the given role.
///
/// # Errors
///
/// Propagates repository errors, e.g. a duplicate email.
pub async fn user<R>(store: &R, email: &str, role: Role, now: DateTime<Utc>) -> Result<User>
where
    R: UserRepository + ?Sized,
{
    store
        .create_user(
            NewUser {
                email: email.to_string(),
                name: display_name(email),
                role,
            },
            now,
        )
        .await
}

/// Create a student account.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn student<R: UserRepository + ?Sized>(store: &R, email: &str, now: DateTime<Utc>) -> Result<User> {
    user(store, email, Role::Student, now).await
}

/// Create a teacher account.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn teacher<R: UserRepository + ?Sized>(store: &R, email: &str, now: DateTime<Utc>) -> Result<User> {
    user(store, email, Role::Teacher, now).await
}

/// Create a guardian account.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn guardian<R: UserRepository + ?Sized>(store: &R, email: &str, now: DateTime<Utc>) -> Result<User> {
    user(store, email, Role::Guardian, now).await
}

/// Create (or promote) an admin account.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn admin<R: UserRepository + ?Sized>(store: &R, email: &str, now: DateTime<Utc>) -> Result<User> {
    store.ensure_admin(email, &display_name(email), now).await
}

/// Create a published item of `kind`, optionally nested under `parent`.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn published<R: CatalogRepository + ?Sized>(
    store: &R,
    teacher: &User,
    kind: ContentKind,
    title: &str,
    price_cents: u64,
    parent: Option<&Content>,
    now: DateTime<Utc>,
) -> Result<Content> {
    let draft = store
        .create_content(
            teacher.id,
            NewContent {
                kind,
                title: title.to_string(),
                description: format!("All about {title}"),
                subject: "general".to_string(),
                price_cents,
                parent_id: parent.map(|p| p.id),
            },
            now,
        )
        .await?;
    store
        .update_content(
            draft.id,
            ContentPatch {
                status: Some(ContentStatus::Published),
                ..ContentPatch::default()
            },
            now,
        )
        .await
}

/// Create a published course.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn published_course<R: CatalogRepository + ?Sized>(
    store: &R,
    teacher: &User,
    title: &str,
    price_cents: u64,
    now: DateTime<Utc>,
) -> Result<Content> {
    published(store, teacher, ContentKind::Course, title, price_cents, None, now).await
}

/// Create a published quiz with one question per `(prompt, options, correct)`
/// entry.
///
/// # Errors
///
/// Propagates repository errors.
pub async fn published_quiz<R: CatalogRepository + ?Sized>(
    store: &R,
    teacher: &User,
    title: &str,
    questions: &[(&str, &[&str], u32)],
    now: DateTime<Utc>,
) -> Result<(Content, Vec<QuizQuestion>)> {
    let quiz = published(store, teacher, ContentKind::Quiz, title, 0, None, now).await?;
    let mut added = Vec::with_capacity(questions.len());
    for (prompt, options, correct_index) in questions {
        added.push(
            store
                .add_question(
                    quiz.id,
                    NewQuestion {
                        prompt: (*prompt).to_string(),
                        options: options.iter().map(ToString::to_string).collect(),
                        correct_index: *correct_index,
                    },
                )
                .await?,
        );
    }
    Ok((quiz, added))
}
