//! Accounts and guardian links.

use crate::PgMarketplace;
use crate::error::{conflict_or_storage, storage};
use crate::rows::{self, LINK_COLUMNS, LINK_JOINS, USER_COLUMNS, count};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{GuardianLink, NewUser, ProfilePatch, User, UserFilter};
use edumarket_core::repository::UserRepository;
use edumarket_core::{
    GuardianLinkId, GuardianLinkStatus, MarketError, Page, PageRequest, Result, Role, UserId,
};
use sqlx::PgConnection;

impl PgMarketplace {
    async fn link_by_id(conn: &mut PgConnection, id: GuardianLinkId) -> Result<Option<GuardianLink>> {
        let sql = format!("SELECT {LINK_COLUMNS} {LINK_JOINS} WHERE l.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage("Failed to load guardian link"))?
            .as_ref()
            .map(rows::guardian_link)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for PgMarketplace {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let sql = format!(
            r"
            INSERT INTO users AS u (id, email, name, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(UserId::new().as_uuid())
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_or_storage("email is already registered", "Failed to create user"))?;

        rows::user(&row)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load user"))?
            .as_ref()
            .map(rows::user)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load user"))?
            .as_ref()
            .map(rows::user)
            .transpose()
    }

    async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> Result<User> {
        let sql = format!(
            r"
            UPDATE users AS u
            SET name = COALESCE($2, u.name),
                bio = CASE WHEN $3::text IS NULL THEN u.bio
                           WHEN $3 = '' THEN NULL
                           ELSE $3 END
            WHERE u.id = $1
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(patch.name)
            .bind(patch.bio)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to update profile"))?
            .ok_or_else(|| MarketError::not_found("User", id))?;

        rows::user(&row)
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage("Failed to verify email"))?;
        Ok(())
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User> {
        let sql = format!("UPDATE users AS u SET is_active = $2 WHERE u.id = $1 RETURNING {USER_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(active)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to update account status"))?
            .ok_or_else(|| MarketError::not_found("User", id))?;

        tracing::info!(user_id = %id, active, "Account status changed");
        rows::user(&row)
    }

    async fn list_users(&self, filter: UserFilter, page: PageRequest) -> Result<Page<User>> {
        let role = filter.role.map(|r| r.as_str());
        let sql = format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users u
            WHERE ($1::text IS NULL OR u.role = $1)
            ORDER BY u.created_at DESC, u.id
            LIMIT $2 OFFSET $3
            "
        );
        let users = sqlx::query(&sql)
            .bind(role)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list users"))?
            .iter()
            .map(rows::user)
            .collect::<Result<Vec<_>>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)")
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to count users"))?;

        Ok(Page::new(users, count(total), page))
    }

    async fn ensure_admin(&self, email: &str, name: &str, now: DateTime<Utc>) -> Result<User> {
        let sql = format!(
            r"
            INSERT INTO users AS u (id, email, name, role, email_verified, created_at)
            VALUES ($1, $2, $3, 'admin', TRUE, $4)
            ON CONFLICT (email) DO UPDATE SET role = 'admin', is_active = TRUE
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(UserId::new().as_uuid())
            .bind(email)
            .bind(name)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to ensure admin account"))?;

        rows::user(&row)
    }

    async fn create_link(&self, guardian_id: UserId, student_id: UserId, now: DateTime<Utc>) -> Result<GuardianLink> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        let id = GuardianLinkId::new();

        sqlx::query(
            r"
            INSERT INTO guardian_links (id, guardian_id, student_id, status, created_at)
            VALUES ($1, $2, $3, 'pending', $4)
            ",
        )
        .bind(id.as_uuid())
        .bind(guardian_id.as_uuid())
        .bind(student_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_storage(
            "a link to this student already exists",
            "Failed to create guardian link",
        ))?;

        let link = Self::link_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| MarketError::Internal("guardian link vanished after insert".into()))?;
        tx.commit().await.map_err(storage("Failed to commit guardian link"))?;
        Ok(link)
    }

    async fn get_link(&self, id: GuardianLinkId) -> Result<Option<GuardianLink>> {
        let mut conn = self.pool.acquire().await.map_err(storage("Failed to acquire connection"))?;
        Self::link_by_id(&mut conn, id).await
    }

    async fn respond_link(&self, id: GuardianLinkId, accept: bool, now: DateTime<Utc>) -> Result<GuardianLink> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;

        let status: Option<(String,)> = sqlx::query_as("SELECT status FROM guardian_links WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage("Failed to lock guardian link"))?;
        let current: GuardianLinkStatus = status.ok_or_else(|| MarketError::not_found("GuardianLink", id))?.0.parse()?;

        let next = if accept {
            GuardianLinkStatus::Accepted
        } else {
            GuardianLinkStatus::Declined
        };
        if current != GuardianLinkStatus::Pending {
            return Err(MarketError::InvalidTransition {
                entity: "GuardianLink",
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        sqlx::query("UPDATE guardian_links SET status = $2, responded_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(next.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage("Failed to update guardian link"))?;

        let link = Self::link_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| MarketError::not_found("GuardianLink", id))?;
        tx.commit().await.map_err(storage("Failed to commit guardian link"))?;

        tracing::info!(link_id = %id, status = %next, "Guardian link answered");
        Ok(link)
    }

    async fn links_for_guardian(&self, guardian_id: UserId) -> Result<Vec<GuardianLink>> {
        let sql = format!("SELECT {LINK_COLUMNS} {LINK_JOINS} WHERE l.guardian_id = $1 ORDER BY l.created_at DESC");
        sqlx::query(&sql)
            .bind(guardian_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list guardian links"))?
            .iter()
            .map(rows::guardian_link)
            .collect()
    }

    async fn links_for_student(&self, student_id: UserId) -> Result<Vec<GuardianLink>> {
        let sql = format!("SELECT {LINK_COLUMNS} {LINK_JOINS} WHERE l.student_id = $1 ORDER BY l.created_at DESC");
        sqlx::query(&sql)
            .bind(student_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list guardian links"))?
            .iter()
            .map(rows::guardian_link)
            .collect()
    }

    async fn is_guardian_of(&self, guardian_id: UserId, student_id: UserId) -> Result<bool> {
        let (linked,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM guardian_links
                WHERE guardian_id = $1 AND student_id = $2 AND status = 'accepted'
            )
            ",
        )
        .bind(guardian_id.as_uuid())
        .bind(student_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to check guardian link"))?;
        Ok(linked)
    }

    async fn students_of(&self, guardian_id: UserId) -> Result<Vec<User>> {
        let sql = format!(
            r"
            SELECT {USER_COLUMNS}
            FROM guardian_links l
            JOIN users u ON u.id = l.student_id
            WHERE l.guardian_id = $1 AND l.status = 'accepted' AND u.role = $2
            ORDER BY u.name, u.id
            "
        );
        sqlx::query(&sql)
            .bind(guardian_id.as_uuid())
            .bind(Role::Student.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list students"))?
            .iter()
            .map(rows::user)
            .collect()
    }
}
