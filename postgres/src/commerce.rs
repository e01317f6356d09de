//! Purchases, gateway payments, wallets and withdrawals.

use crate::PgMarketplace;
use crate::error::storage;
use crate::ledger::{fulfill, load_items, lock_balance, lock_wallets, order_wallets, owned_among, post};
use crate::rows::{self, CONTENT_COLUMNS, PAYMENT_COLUMNS, WITHDRAWAL_COLUMNS, cents, count, get, signed};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{
    FulfillmentOutcome, LibraryEntry, NewPayment, Order, Payment, PaymentConfirmation, PurchaseRequest, WalletView,
    Withdrawal,
};
use edumarket_core::pricing::order_items;
use edumarket_core::repository::CommerceRepository;
use edumarket_core::{
    ContentId, LedgerKind, MarketError, Money, OrderId, Page, PageRequest, PaymentId, PaymentPurpose, PaymentStatus,
    Result, UserId, WithdrawalId, WithdrawalStatus,
};
use sqlx::PgConnection;
use sqlx::types::Json;
use uuid::Uuid;

async fn lock_payment(conn: &mut PgConnection, id: PaymentId) -> Result<Payment> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("Failed to lock payment"))?
        .ok_or_else(|| MarketError::not_found("Payment", id))?;
    rows::payment(&row)
}

/// Remember a gateway event; returns `false` if it was seen before.
async fn record_event(
    conn: &mut PgConnection,
    event_id: &str,
    payment_id: PaymentId,
    event_type: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO payment_events (event_id, payment_id, event_type, received_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (event_id) DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(payment_id.as_uuid())
    .bind(event_type)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(storage("Failed to record payment event"))?;
    Ok(result.rows_affected() > 0)
}

async fn lock_withdrawal(conn: &mut PgConnection, id: WithdrawalId) -> Result<Withdrawal> {
    let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w WHERE w.id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("Failed to lock withdrawal"))?
        .ok_or_else(|| MarketError::not_found("Withdrawal", id))?;
    rows::withdrawal(&row)
}

/// Pending withdrawals are the only ones an admin may decide on.
fn ensure_pending(withdrawal: &Withdrawal, next: WithdrawalStatus) -> Result<()> {
    if withdrawal.status == WithdrawalStatus::Pending {
        Ok(())
    } else {
        Err(MarketError::InvalidTransition {
            entity: "Withdrawal",
            from: withdrawal.status.to_string(),
            to: next.to_string(),
        })
    }
}

async fn decide_withdrawal(
    conn: &mut PgConnection,
    id: WithdrawalId,
    status: WithdrawalStatus,
    admin_id: UserId,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Withdrawal> {
    let sql = format!(
        r"
        UPDATE withdrawals AS w
        SET status = $2, processed_by = $3, note = $4, processed_at = $5
        WHERE w.id = $1
        RETURNING {WITHDRAWAL_COLUMNS}
        "
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(admin_id.as_uuid())
        .bind(note)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(storage("Failed to update withdrawal"))?;
    rows::withdrawal(&row)
}

#[async_trait]
impl CommerceRepository for PgMarketplace {
    async fn owns(&self, user_id: UserId, content_id: ContentId) -> Result<bool> {
        let (owned,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM enrollments e
                WHERE e.user_id = $1
                  AND (e.content_id = $2
                       OR e.content_id = (SELECT parent_id FROM contents WHERE id = $2))
            )
            ",
        )
        .bind(user_id.as_uuid())
        .bind(content_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to check ownership"))?;
        Ok(owned)
    }

    async fn owned_among(&self, user_id: UserId, content_ids: &[ContentId]) -> Result<Vec<ContentId>> {
        let mut conn = self.pool.acquire().await.map_err(storage("Failed to acquire connection"))?;
        owned_among(&mut conn, user_id, content_ids).await
    }

    async fn purchase_with_wallet(&self, request: PurchaseRequest, now: DateTime<Utc>) -> Result<Order> {
        if request.lines.is_empty() {
            return Err(MarketError::validation("nothing to purchase"));
        }
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;

        let ids: Vec<ContentId> = request.lines.iter().map(|l| l.content_id).collect();
        let owned = owned_among(&mut tx, request.beneficiary_id, &ids).await?;
        if let Some(id) = owned.first() {
            return Err(MarketError::conflict(format!("content {id} is already owned")));
        }

        let items = order_items(&request.lines, request.commission_bps);
        let order = fulfill(&mut tx, request.buyer_id, request.beneficiary_id, items, None, now).await?;

        tx.commit().await.map_err(storage("Failed to commit purchase"))?;
        Ok(order)
    }

    async fn create_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment> {
        let sql = format!(
            r"
            INSERT INTO payments AS p
                (id, user_id, beneficiary_id, purpose, amount_cents, status, lines, commission_bps,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {PAYMENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(PaymentId::new().as_uuid())
            .bind(payment.user_id.as_uuid())
            .bind(payment.beneficiary_id.as_uuid())
            .bind(payment.purpose.as_str())
            .bind(cents(payment.amount)?)
            .bind(PaymentStatus::Pending.as_str())
            .bind(Json(&payment.lines))
            .bind(signed(payment.commission_bps)?)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to create payment"))?;

        let created = rows::payment(&row)?;
        tracing::info!(
            payment_id = %created.id,
            user_id = %created.user_id,
            purpose = %created.purpose,
            amount_cents = created.amount.cents(),
            "Payment created"
        );
        Ok(created)
    }

    async fn attach_checkout_session(
        &self,
        id: PaymentId,
        gateway_reference: &str,
        checkout_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let sql = format!(
            r"
            UPDATE payments AS p
            SET gateway_reference = $2, checkout_url = $3, updated_at = $4
            WHERE p.id = $1
            RETURNING {PAYMENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(gateway_reference)
            .bind(checkout_url)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to attach checkout session"))?
            .ok_or_else(|| MarketError::not_found("Payment", id))?;
        rows::payment(&row)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments p WHERE p.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load payment"))?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }

    async fn list_payments(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>> {
        let sql = format!(
            r"
            SELECT {PAYMENT_COLUMNS}
            FROM payments p
            WHERE p.user_id = $1
            ORDER BY p.created_at DESC, p.id
            LIMIT $2 OFFSET $3
            "
        );
        let payments = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list payments"))?
            .iter()
            .map(rows::payment)
            .collect::<Result<Vec<_>>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to count payments"))?;

        Ok(Page::new(payments, count(total), page))
    }

    async fn confirm_payment(&self, confirmation: PaymentConfirmation, now: DateTime<Utc>) -> Result<FulfillmentOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        let payment = lock_payment(&mut tx, confirmation.payment_id).await?;

        let first_delivery = record_event(
            &mut tx,
            &confirmation.event_id,
            payment.id,
            "payment.succeeded",
            now,
        )
        .await?;
        if !first_delivery || payment.status == PaymentStatus::Succeeded {
            tx.commit().await.map_err(storage("Failed to commit payment event"))?;
            tracing::info!(
                payment_id = %payment.id,
                event_id = %confirmation.event_id,
                "Payment confirmation already processed"
            );
            return Ok(FulfillmentOutcome::AlreadyProcessed { payment });
        }
        if payment.status == PaymentStatus::Failed {
            return Err(MarketError::InvalidTransition {
                entity: "Payment",
                from: payment.status.to_string(),
                to: PaymentStatus::Succeeded.to_string(),
            });
        }
        if confirmation.amount != payment.amount {
            return Err(MarketError::validation(format!(
                "captured amount {} does not match payment amount {}",
                confirmation.amount, payment.amount
            )));
        }

        let wallets = order_wallets(payment.user_id, payment.lines.iter().map(|l| l.teacher_id));
        lock_wallets(&mut tx, &wallets).await?;

        post(
            &mut tx,
            payment.user_id,
            LedgerKind::TopUp,
            payment.amount,
            &payment.id.to_string(),
            now,
        )
        .await?;

        let mut order = None;
        if payment.purpose == PaymentPurpose::Checkout {
            let ids: Vec<ContentId> = payment.lines.iter().map(|l| l.content_id).collect();
            let owned = owned_among(&mut tx, payment.beneficiary_id, &ids).await?;
            let lines: Vec<_> = payment
                .lines
                .iter()
                .filter(|l| !owned.contains(&l.content_id))
                .cloned()
                .collect();
            if !owned.is_empty() {
                tracing::warn!(
                    payment_id = %payment.id,
                    skipped = owned.len(),
                    "Skipping items the beneficiary already owns; their value stays in the wallet"
                );
            }
            if !lines.is_empty() {
                let items = order_items(&lines, payment.commission_bps);
                order = Some(
                    fulfill(
                        &mut tx,
                        payment.user_id,
                        payment.beneficiary_id,
                        items,
                        Some(payment.id),
                        now,
                    )
                    .await?,
                );
            }
        }

        let sql = format!(
            r"
            UPDATE payments AS p
            SET status = $2, gateway_reference = $3, order_id = $4, updated_at = $5
            WHERE p.id = $1
            RETURNING {PAYMENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(payment.id.as_uuid())
            .bind(PaymentStatus::Succeeded.as_str())
            .bind(&confirmation.gateway_reference)
            .bind(order.as_ref().map(|o| *o.id.as_uuid()))
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage("Failed to mark payment succeeded"))?;
        let payment = rows::payment(&row)?;

        tx.commit().await.map_err(storage("Failed to commit payment"))?;
        tracing::info!(
            payment_id = %payment.id,
            order_id = ?order.as_ref().map(|o| o.id),
            amount_cents = payment.amount.cents(),
            "Payment fulfilled"
        );
        Ok(FulfillmentOutcome::Fulfilled { payment, order })
    }

    async fn fail_payment(&self, id: PaymentId, event_id: &str, reason: &str, now: DateTime<Utc>) -> Result<Payment> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        let payment = lock_payment(&mut tx, id).await?;
        let first_delivery = record_event(&mut tx, event_id, id, "payment.failed", now).await?;

        if !first_delivery || payment.status.is_final() {
            tx.commit().await.map_err(storage("Failed to commit payment event"))?;
            return Ok(payment);
        }

        let sql = format!(
            r"
            UPDATE payments AS p
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE p.id = $1
            RETURNING {PAYMENT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(PaymentStatus::Failed.as_str())
            .bind(reason)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage("Failed to mark payment failed"))?;
        let failed = rows::payment(&row)?;

        tx.commit().await.map_err(storage("Failed to commit payment"))?;
        tracing::warn!(payment_id = %id, reason, "Payment failed");
        Ok(failed)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(storage("Failed to acquire connection"))?;
        let row = sqlx::query(
            r"
            SELECT id, buyer_id, beneficiary_id, total_cents, platform_fee_cents, payment_id, created_at
            FROM orders WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("Failed to load order"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = vec![rows::order(&row)?];
        load_items(&mut conn, &mut orders).await?;
        Ok(orders.pop())
    }

    async fn list_orders(&self, buyer_id: UserId, page: PageRequest) -> Result<Page<Order>> {
        let mut conn = self.pool.acquire().await.map_err(storage("Failed to acquire connection"))?;
        let mut orders = sqlx::query(
            r"
            SELECT id, buyer_id, beneficiary_id, total_cents, platform_fee_cents, payment_id, created_at
            FROM orders
            WHERE buyer_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(buyer_id.as_uuid())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage("Failed to list orders"))?
        .iter()
        .map(rows::order)
        .collect::<Result<Vec<_>>>()?;
        load_items(&mut conn, &mut orders).await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .fetch_one(&mut *conn)
            .await
            .map_err(storage("Failed to count orders"))?;

        Ok(Page::new(orders, count(total), page))
    }

    async fn library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>> {
        let sql = format!(
            r"
            SELECT {CONTENT_COLUMNS}, e.order_id, e.enrolled_at
            FROM enrollments e
            JOIN contents c ON c.id = e.content_id
            WHERE e.user_id = $1
            ORDER BY e.enrolled_at DESC, c.id
            "
        );
        sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to load library"))?
            .iter()
            .map(|row| -> Result<LibraryEntry> {
                Ok(LibraryEntry {
                    content: rows::content(row)?,
                    order_id: OrderId::from_uuid(get(row, "order_id")?),
                    enrolled_at: get(row, "enrolled_at")?,
                })
            })
            .collect()
    }

    async fn wallet(&self, user_id: UserId, page: PageRequest) -> Result<WalletView> {
        let balance: Option<(i64,)> = sqlx::query_as("SELECT balance_cents FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load wallet"))?;
        let (balance,) = balance.ok_or_else(|| MarketError::not_found("User", user_id))?;

        let entries = sqlx::query(
            r"
            SELECT id, user_id, kind, amount_cents, balance_after_cents, reference, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id.as_uuid())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("Failed to load ledger"))?
        .iter()
        .map(rows::ledger_entry)
        .collect::<Result<Vec<_>>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage("Failed to count ledger"))?;

        Ok(WalletView {
            balance: rows::money(balance)?,
            entries: Page::new(entries, count(total), page),
        })
    }

    async fn request_withdrawal(&self, teacher_id: UserId, amount: Money, now: DateTime<Utc>) -> Result<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;

        let balance = lock_balance(&mut tx, teacher_id).await?;
        if balance < amount {
            return Err(MarketError::InsufficientFunds {
                balance_cents: balance.cents(),
                required_cents: amount.cents(),
            });
        }

        let id = WithdrawalId::new();
        post(&mut tx, teacher_id, LedgerKind::Withdrawal, amount, &id.to_string(), now).await?;

        let sql = format!(
            r"
            INSERT INTO withdrawals AS w (id, teacher_id, amount_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {WITHDRAWAL_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(teacher_id.as_uuid())
            .bind(cents(amount)?)
            .bind(WithdrawalStatus::Pending.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage("Failed to create withdrawal"))?;
        let withdrawal = rows::withdrawal(&row)?;

        tx.commit().await.map_err(storage("Failed to commit withdrawal"))?;
        tracing::info!(
            withdrawal_id = %id,
            teacher_id = %teacher_id,
            amount_cents = amount.cents(),
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals w WHERE w.id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("Failed to load withdrawal"))?
            .as_ref()
            .map(rows::withdrawal)
            .transpose()
    }

    async fn list_withdrawals(
        &self,
        teacher_id: Option<UserId>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> Result<Page<Withdrawal>> {
        let teacher: Option<Uuid> = teacher_id.map(|t| *t.as_uuid());
        let status = status.map(|s| s.as_str());
        let sql = format!(
            r"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawals w
            WHERE ($1::uuid IS NULL OR w.teacher_id = $1)
              AND ($2::text IS NULL OR w.status = $2)
            ORDER BY w.created_at DESC, w.id
            LIMIT $3 OFFSET $4
            "
        );
        let withdrawals = sqlx::query(&sql)
            .bind(teacher)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage("Failed to list withdrawals"))?
            .iter()
            .map(rows::withdrawal)
            .collect::<Result<Vec<_>>>()?;

        let (total,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM withdrawals
            WHERE ($1::uuid IS NULL OR teacher_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ",
        )
        .bind(teacher)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("Failed to count withdrawals"))?;

        Ok(Page::new(withdrawals, count(total), page))
    }

    async fn approve_withdrawal(&self, id: WithdrawalId, admin_id: UserId, now: DateTime<Utc>) -> Result<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        let current = lock_withdrawal(&mut tx, id).await?;
        ensure_pending(&current, WithdrawalStatus::Paid)?;

        let paid = decide_withdrawal(&mut tx, id, WithdrawalStatus::Paid, admin_id, None, now).await?;
        tx.commit().await.map_err(storage("Failed to commit withdrawal"))?;

        tracing::info!(withdrawal_id = %id, admin_id = %admin_id, amount_cents = paid.amount.cents(), "Withdrawal paid");
        Ok(paid)
    }

    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(storage("Failed to start transaction"))?;
        let current = lock_withdrawal(&mut tx, id).await?;
        ensure_pending(&current, WithdrawalStatus::Rejected)?;

        post(
            &mut tx,
            current.teacher_id,
            LedgerKind::WithdrawalReversal,
            current.amount,
            &id.to_string(),
            now,
        )
        .await?;
        let rejected = decide_withdrawal(&mut tx, id, WithdrawalStatus::Rejected, admin_id, Some(reason), now).await?;
        tx.commit().await.map_err(storage("Failed to commit withdrawal"))?;

        tracing::info!(withdrawal_id = %id, admin_id = %admin_id, reason, "Withdrawal rejected and refunded");
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdrawal(status: WithdrawalStatus) -> Withdrawal {
        Withdrawal {
            id: WithdrawalId::new(),
            teacher_id: UserId::new(),
            amount: Money::from_cents(5_000),
            status,
            note: None,
            processed_by: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn test_only_pending_withdrawals_are_decided() {
        assert!(ensure_pending(&withdrawal(WithdrawalStatus::Pending), WithdrawalStatus::Paid).is_ok());
        let err = ensure_pending(&withdrawal(WithdrawalStatus::Paid), WithdrawalStatus::Rejected);
        assert!(matches!(
            err,
            Err(MarketError::InvalidTransition { entity: "Withdrawal", .. })
        ));
    }
}
