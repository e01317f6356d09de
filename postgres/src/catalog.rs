//! Catalog and quiz questions.

use crate::PgMarketplace;
use crate::error::storage;
use crate::rows::{self, CONTENT_COLUMNS, cents, count, get, signed};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{
    Content, ContentFilter, ContentListing, ContentPatch, NewContent, NewQuestion, QuizQuestion, RatingSummary,
};
use edumarket_core::repository::CatalogRepository;
use edumarket_core::{
    ContentId, ContentStatus, MarketError, Money, Page, PageRequest, QuestionId, Result, UserId,
};

/// Published-catalog predicate shared by the listing and its count.
const PUBLISHED_FILTER: &str = r"
    WHERE c.status = 'published'
      AND ($1::text IS NULL OR c.kind = $1)
      AND ($2::text IS NULL OR lower(c.subject) = lower($2))
      AND ($3::uuid IS NULL OR c.teacher_id = $3)
      AND ($4::text IS NULL OR c.title ILIKE $4 OR c.description ILIKE $4)
      AND ($5::bigint IS NULL OR c.price_cents >= $5)
      AND ($6::bigint IS NULL OR c.price_cents <= $6)
";

/// `%term%` with `LIKE` wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn price_bound(cents: Option<u64>) -> Option<i64> {
    cents.map(|c| i64::try_from(c).unwrap_or(i64::MAX))
}

#[async_trait]
impl CatalogRepository for PgMarketplace {
    async fn create_content(&self, teacher_id: UserId, content: NewContent, now: DateTime<Utc>) -> Result<Content> {
        let sql = format!(
            r"
            INSERT INTO contents AS c
                (id, teacher_id, kind, title, description, subject, price_cents, status, parent_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {CONTENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(ContentId::new().as_uuid())
            .bind(teacher_id.as_uuid())
            .bind(content.kind.as_str())
            .bind(&content.title)
            .bind(&content.description)
            .bind(&content.subject)
            .bind(cents(Money::from_cents(content.price_cents))?)
            .bind(ContentStatus::Draft.as_str())
            .bind(content.parent_id.map(|p| *p.as_uuid()))
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to create content"))?;

        let created = rows::content(&row)?;
        tracing::info!(content_id = %created.id, teacher_id = %teacher_id, kind = %created.kind, "Content created");
        Ok(created)
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load content"))?
            .as_ref()
            .map(rows::content)
            .transpose()
    }

    async fn update_content(&self, id: ContentId, patch: ContentPatch, now: DateTime<Utc>) -> Result<Content> {
        let price = patch
            .price_cents
            .map(|p| cents(Money::from_cents(p)))
            .transpose()?;
        let sql = format!(
            r"
            UPDATE contents AS c
            SET title = COALESCE($2, c.title),
                description = COALESCE($3, c.description),
                subject = COALESCE($4, c.subject),
                price_cents = COALESCE($5, c.price_cents),
                status = COALESCE($6, c.status),
                updated_at = $7
            WHERE c.id = $1
            RETURNING {CONTENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(patch.title)
            .bind(patch.description)
            .bind(patch.subject)
            .bind(price)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to update content"))?
            .ok_or_else(|| MarketError::not_found("Content", id))?;

        rows::content(&row)
    }

    async fn list_published(&self, filter: ContentFilter, page: PageRequest) -> Result<Page<ContentListing>> {
        let kind = filter.kind.map(|k| k.as_str());
        let teacher = filter.teacher_id.map(|t| *t.as_uuid());
        let pattern = filter.q.as_deref().map(like_pattern);
        let (min_price, max_price) = (price_bound(filter.min_price), price_bound(filter.max_price));

        let sql = format!(
            r"
            SELECT {CONTENT_COLUMNS},
                   ROUND(rs.average::numeric, 2)::float8 AS rating_average,
                   rs.reviews AS rating_count
            FROM contents c
            LEFT JOIN LATERAL (
                SELECT AVG(r.rating) AS average, COUNT(*) AS reviews
                FROM reviews r WHERE r.content_id = c.id
            ) rs ON TRUE
            {PUBLISHED_FILTER}
            ORDER BY c.created_at DESC, c.id
            LIMIT $7 OFFSET $8
            "
        );
        let listings = sqlx::query(&sql)
            .bind(kind)
            .bind(filter.subject.as_deref())
            .bind(teacher)
            .bind(pattern.as_deref())
            .bind(min_price)
            .bind(max_price)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list catalog"))?
            .iter()
            .map(|row| -> Result<ContentListing> {
                Ok(ContentListing {
                    content: rows::content(row)?,
                    rating: RatingSummary {
                        average: get(row, "rating_average")?,
                        count: count(get(row, "rating_count")?),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let count_sql = format!("SELECT COUNT(*) FROM contents c {PUBLISHED_FILTER}");
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(kind)
            .bind(filter.subject.as_deref())
            .bind(teacher)
            .bind(pattern.as_deref())
            .bind(min_price)
            .bind(max_price)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to count catalog"))?;

        Ok(Page::new(listings, count(total), page))
    }

    async fn list_by_teacher(&self, teacher_id: UserId, page: PageRequest) -> Result<Page<Content>> {
        let sql = format!(
            r"
            SELECT {CONTENT_COLUMNS}
            FROM contents c
            WHERE c.teacher_id = $1
            ORDER BY c.created_at DESC, c.id
            LIMIT $2 OFFSET $3
            "
        );
        let items = sqlx::query(&sql)
            .bind(teacher_id.as_uuid())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list teacher content"))?
            .iter()
            .map(rows::content)
            .collect::<Result<Vec<_>>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contents WHERE teacher_id = $1")
            .bind(teacher_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to count teacher content"))?;

        Ok(Page::new(items, count(total), page))
    }

    async fn children(&self, parent_id: ContentId) -> Result<Vec<Content>> {
        let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents c WHERE c.parent_id = $1 ORDER BY c.created_at, c.id");
        sqlx::query(&sql)
            .bind(parent_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list course items"))?
            .iter()
            .map(rows::content)
            .collect()
    }

    async fn add_question(&self, quiz_id: ContentId, question: NewQuestion) -> Result<QuizQuestion> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;

        // Serializes position assignment per quiz.
        let locked: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM contents WHERE id = $1 FOR UPDATE")
            .bind(quiz_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage("Failed to lock quiz"))?;
        if locked.is_none() {
            return Err(MarketError::not_found("Content", quiz_id));
        }

        let row = sqlx::query(
            r"
            INSERT INTO quiz_questions (id, quiz_id, prompt, options, correct_index, position)
            SELECT $1, $2, $3, $4, $5, COALESCE(MAX(position) + 1, 0)
            FROM quiz_questions WHERE quiz_id = $2
            RETURNING id, quiz_id, prompt, options, correct_index, position
            ",
        )
        .bind(QuestionId::new().as_uuid())
        .bind(quiz_id.as_uuid())
        .bind(&question.prompt)
        .bind(&question.options)
        .bind(signed(question.correct_index)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage("Failed to add question"))?;

        let added = rows::question(&row)?;
        tx.commit().await.map_err(storage("Failed to commit question"))?;
        Ok(added)
    }

    async fn questions(&self, quiz_id: ContentId) -> Result<Vec<QuizQuestion>> {
        sqlx::query(
            r"
            SELECT id, quiz_id, prompt, options, correct_index, position
            FROM quiz_questions
            WHERE quiz_id = $1
            ORDER BY position
            ",
        )
        .bind(quiz_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to load questions"))?
        .iter()
        .map(rows::question)
        .collect()
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<QuizQuestion>> {
        sqlx::query("SELECT id, quiz_id, prompt, options, correct_index, position FROM quiz_questions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load question"))?
            .as_ref()
            .map(rows::question)
            .transpose()
    }

    async fn delete_question(&self, id: QuestionId) -> Result<()> {
        let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to delete question"))?;
        if result.rows_affected() == 0 {
            return Err(MarketError::not_found("Question", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_price_bound_saturates() {
        assert_eq!(price_bound(None), None);
        assert_eq!(price_bound(Some(500)), Some(500));
        assert_eq!(price_bound(Some(u64::MAX)), Some(i64::MAX));
    }
}
