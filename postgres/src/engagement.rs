//! Reviews, comments and quiz attempts.

use crate::PgMarketplace;
use crate::error::storage;
use crate::rows::{self, count, get, signed};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{Comment, QuizAttempt, RatingSummary, Review};
use edumarket_core::repository::EngagementRepository;
use edumarket_core::{CommentId, ContentId, MarketError, Page, PageRequest, Result, ReviewId, UserId};
use sqlx::types::Json;

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.content_id, r.user_id, u.name AS author_name, r.rating, r.body, r.created_at, r.updated_at
    FROM reviews r JOIN users u ON u.id = r.user_id
";

const COMMENT_SELECT: &str = r"
    SELECT m.id, m.content_id, m.user_id, u.name AS author_name, m.parent_id, m.body, m.created_at
    FROM comments m JOIN users u ON u.id = m.user_id
";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, answers, score, max_score, passed, created_at";

#[async_trait]
impl EngagementRepository for PgMarketplace {
    async fn upsert_review(
        &self,
        content_id: ContentId,
        user_id: UserId,
        rating: u8,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        let row = sqlx::query(
            r"
            WITH saved AS (
                INSERT INTO reviews (id, content_id, user_id, rating, body, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (content_id, user_id)
                DO UPDATE SET rating = EXCLUDED.rating, body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
                RETURNING *
            )
            SELECT s.id, s.content_id, s.user_id, u.name AS author_name, s.rating, s.body, s.created_at, s.updated_at
            FROM saved s JOIN users u ON u.id = s.user_id
            ",
        )
        .bind(ReviewId::new().as_uuid())
        .bind(content_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(i16::from(rating))
        .bind(body)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to save review"))?;

        let review = rows::review(&row)?;
        tracing::info!(review_id = %review.id, content_id = %content_id, rating, "Review saved");
        Ok(review)
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>> {
        let sql = format!("{REVIEW_SELECT} WHERE r.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load review"))?
            .as_ref()
            .map(rows::review)
            .transpose()
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to delete review"))?;
        if result.rows_affected() == 0 {
            return Err(MarketError::not_found("Review", id));
        }
        Ok(())
    }

    async fn list_reviews(&self, content_id: ContentId, page: PageRequest) -> Result<Page<Review>> {
        let sql = format!("{REVIEW_SELECT} WHERE r.content_id = $1 ORDER BY r.updated_at DESC, r.id LIMIT $2 OFFSET $3");
        let reviews = sqlx::query(&sql)
            .bind(content_id.as_uuid())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list reviews"))?
            .iter()
            .map(rows::review)
            .collect::<Result<Vec<_>>>()?;

        let summary = self.rating_summary(content_id).await?;
        Ok(Page::new(reviews, summary.count, page))
    }

    async fn rating_summary(&self, content_id: ContentId) -> Result<RatingSummary> {
        let row = sqlx::query(
            r"
            SELECT ROUND(AVG(rating)::numeric, 2)::float8 AS average, COUNT(*) AS reviews
            FROM reviews
            WHERE content_id = $1
            ",
        )
        .bind(content_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to summarize ratings"))?;

        Ok(RatingSummary {
            average: get(&row, "average")?,
            count: count(get(&row, "reviews")?),
        })
    }

    async fn add_comment(
        &self,
        content_id: ContentId,
        user_id: UserId,
        parent_id: Option<CommentId>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let row = sqlx::query(
            r"
            WITH saved AS (
                INSERT INTO comments (id, content_id, user_id, parent_id, body, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT s.id, s.content_id, s.user_id, u.name AS author_name, s.parent_id, s.body, s.created_at
            FROM saved s JOIN users u ON u.id = s.user_id
            ",
        )
        .bind(CommentId::new().as_uuid())
        .bind(content_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(parent_id.map(|p| *p.as_uuid()))
        .bind(body)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to add comment"))?;

        rows::comment(&row)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE m.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load comment"))?
            .as_ref()
            .map(rows::comment)
            .transpose()
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        // Replies go with their parent through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to delete comment"))?;
        if result.rows_affected() == 0 {
            return Err(MarketError::not_found("Comment", id));
        }
        Ok(())
    }

    async fn comments(&self, content_id: ContentId) -> Result<Vec<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE m.content_id = $1 ORDER BY m.created_at, m.id");
        sqlx::query(&sql)
            .bind(content_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to load comments"))?
            .iter()
            .map(rows::comment)
            .collect()
    }

    async fn record_attempt(&self, attempt: QuizAttempt) -> Result<QuizAttempt> {
        let sql = format!(
            r"
            INSERT INTO quiz_attempts ({ATTEMPT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ATTEMPT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(attempt.id.as_uuid())
            .bind(attempt.quiz_id.as_uuid())
            .bind(attempt.user_id.as_uuid())
            .bind(Json(&attempt.answers))
            .bind(signed(attempt.score)?)
            .bind(signed(attempt.max_score)?)
            .bind(attempt.passed)
            .bind(attempt.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to record attempt"))?;

        let saved = rows::attempt(&row)?;
        tracing::info!(
            attempt_id = %saved.id,
            quiz_id = %saved.quiz_id,
            score = saved.score,
            max_score = saved.max_score,
            passed = saved.passed,
            "Quiz attempt recorded"
        );
        Ok(saved)
    }

    async fn attempts(&self, user_id: UserId, quiz_id: Option<ContentId>) -> Result<Vec<QuizAttempt>> {
        let sql = format!(
            r"
            SELECT {ATTEMPT_COLUMNS}
            FROM quiz_attempts
            WHERE user_id = $1 AND ($2::uuid IS NULL OR quiz_id = $2)
            ORDER BY created_at DESC, id
            "
        );
        sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(quiz_id.map(|q| *q.as_uuid()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list attempts"))?
            .iter()
            .map(rows::attempt)
            .collect()
    }
}
