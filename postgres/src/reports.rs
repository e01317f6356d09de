//! Admin reporting: raw aggregate SQL.
//!
//! The dashboard runs inside one `REPEATABLE READ` read-only transaction
//! so every number comes from the same snapshot.

use crate::PgMarketplace;
use crate::error::storage;
use crate::rows::{count, get, money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{DashboardSummary, KindCount, RevenueBucket, RoleCount, TopContent, TopTeacher};
use edumarket_core::repository::ReportRepository;
use edumarket_core::{ContentId, Result, UserId};
use uuid::Uuid;

#[async_trait]
impl ReportRepository for PgMarketplace {
    async fn dashboard(&self) -> Result<DashboardSummary> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(storage("Failed to set snapshot isolation"))?;

        let totals = sqlx::query(
            r"
            SELECT
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM orders) AS order_count,
                (SELECT COALESCE(SUM(total_cents), 0)::bigint FROM orders) AS gross_revenue,
                (SELECT COALESCE(SUM(platform_fee_cents), 0)::bigint FROM orders) AS platform_fees,
                (SELECT COALESCE(SUM(teacher_share_cents), 0)::bigint FROM order_items) AS teacher_earnings,
                (SELECT COUNT(*) FROM withdrawals WHERE status = 'pending') AS pending_withdrawals,
                (SELECT COALESCE(SUM(amount_cents), 0)::bigint FROM withdrawals WHERE status = 'pending')
                    AS pending_withdrawal_amount,
                (SELECT COALESCE(SUM(balance_cents), 0)::bigint FROM users) AS wallet_liability
            ",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(storage("Failed to aggregate dashboard totals"))?;

        let by_role: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
                .fetch_all(&mut *tx)
                .await
                .map_err(storage("Failed to count users by role"))?;

        let by_kind: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM contents WHERE status = 'published' GROUP BY kind ORDER BY kind",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(storage("Failed to count published content"))?;

        tx.commit().await.map_err(storage("Failed to finish dashboard snapshot"))?;

        Ok(DashboardSummary {
            users_by_role: by_role
                .into_iter()
                .map(|(role, n)| -> Result<RoleCount> { Ok(RoleCount { role: role.parse()?, count: count(n) }) })
                .collect::<Result<Vec<_>>>()?,
            active_users: count(get(&totals, "active_users")?),
            published_by_kind: by_kind
                .into_iter()
                .map(|(kind, n)| -> Result<KindCount> { Ok(KindCount { kind: kind.parse()?, count: count(n) }) })
                .collect::<Result<Vec<_>>>()?,
            order_count: count(get(&totals, "order_count")?),
            gross_revenue: money(get(&totals, "gross_revenue")?)?,
            platform_fees: money(get(&totals, "platform_fees")?)?,
            teacher_earnings: money(get(&totals, "teacher_earnings")?)?,
            pending_withdrawals: count(get(&totals, "pending_withdrawals")?),
            pending_withdrawal_amount: money(get(&totals, "pending_withdrawal_amount")?)?,
            wallet_liability: money(get(&totals, "wallet_liability")?)?,
        })
    }

    async fn revenue_by_month(&self, months: u32, now: DateTime<Utc>) -> Result<Vec<RevenueBucket>> {
        let since = RevenueBucket::window_start(now, months);
        let rows: Vec<(DateTime<Utc>, i64, i64, i64)> = sqlx::query_as(
            r"
            SELECT date_trunc('month', created_at, 'UTC') AS month,
                   COUNT(*),
                   SUM(total_cents)::bigint,
                   SUM(platform_fee_cents)::bigint
            FROM orders
            WHERE created_at >= $1 AND created_at <= $2
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(since)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to aggregate monthly revenue"))?;

        rows.into_iter()
            .map(|(month, orders, gross, fees)| -> Result<RevenueBucket> {
                Ok(RevenueBucket {
                    month,
                    order_count: count(orders),
                    gross_revenue: money(gross)?,
                    platform_fees: money(fees)?,
                })
            })
            .collect()
    }

    async fn top_content(&self, limit: u32) -> Result<Vec<TopContent>> {
        let rows: Vec<(Uuid, String, String, Uuid, i64, i64)> = sqlx::query_as(
            r"
            SELECT c.id, c.title, c.kind, c.teacher_id, COUNT(*) AS sales, SUM(oi.price_cents)::bigint AS revenue
            FROM order_items oi
            JOIN contents c ON c.id = oi.content_id
            GROUP BY c.id
            ORDER BY revenue DESC, sales DESC, c.title
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to rank content"))?;

        rows.into_iter()
            .map(|(id, title, kind, teacher_id, sales, revenue)| -> Result<TopContent> {
                Ok(TopContent {
                    content_id: ContentId::from_uuid(id),
                    title,
                    kind: kind.parse()?,
                    teacher_id: UserId::from_uuid(teacher_id),
                    sales: count(sales),
                    revenue: money(revenue)?,
                })
            })
            .collect()
    }

    async fn top_teachers(&self, limit: u32) -> Result<Vec<TopTeacher>> {
        let rows: Vec<(Uuid, String, i64, i64)> = sqlx::query_as(
            r"
            SELECT u.id, u.name, COUNT(*) AS sales, SUM(oi.teacher_share_cents)::bigint AS earnings
            FROM order_items oi
            JOIN users u ON u.id = oi.teacher_id
            GROUP BY u.id
            ORDER BY earnings DESC, sales DESC, u.name
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to rank teachers"))?;

        rows.into_iter()
            .map(|(id, name, sales, earnings)| -> Result<TopTeacher> {
                Ok(TopTeacher {
                    teacher_id: UserId::from_uuid(id),
                    name,
                    sales: count(sales),
                    earnings: money(earnings)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage("Database ping failed"))?;
        Ok(())
    }
}
