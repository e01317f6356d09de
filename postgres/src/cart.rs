//! Shopping carts.

use crate::PgMarketplace;
use crate::error::storage;
use crate::rows;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::CartLine;
use edumarket_core::repository::CartRepository;
use edumarket_core::{ContentId, MarketError, Result, UserId};

#[async_trait]
impl CartRepository for PgMarketplace {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        sqlx::query(
            r"
            SELECT c.id, c.title, c.kind, c.teacher_id, c.price_cents, c.status, ci.added_at
            FROM cart_items ci
            JOIN contents c ON c.id = ci.content_id
            WHERE ci.user_id = $1
            ORDER BY ci.added_at, c.id
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to load cart"))?
        .iter()
        .map(rows::cart_line)
        .collect()
    }

    async fn add_to_cart(&self, user_id: UserId, content_id: ContentId, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO cart_items (user_id, content_id, added_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, content_id) DO NOTHING
            ",
        )
        .bind(user_id.as_uuid())
        .bind(content_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage("Failed to add to cart"))?;

        if result.rows_affected() == 0 {
            return Err(MarketError::conflict("item is already in the cart"));
        }
        tracing::debug!(user_id = %user_id, content_id = %content_id, "Added to cart");
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: UserId, content_id: ContentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND content_id = $2")
            .bind(user_id.as_uuid())
            .bind(content_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to remove from cart"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to clear cart"))?;
        Ok(())
    }
}
