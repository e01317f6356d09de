//! Wallet movements inside an open transaction.
//!
//! Every balance change goes through [`post`], which updates
//! `users.balance_cents` and appends the matching ledger row. Callers lock
//! the wallet first with [`lock_balance`] when they need to check funds.
//!
//! A transaction that touches more than one wallet takes all of them up
//! front with [`lock_wallets`], which locks in user id order. Two purchases
//! between the same pair of users then queue instead of deadlocking.

use crate::error::storage;
use crate::rows::{self, cents, content_uuids, money};
use chrono::{DateTime, Utc};
use edumarket_core::model::{Order, OrderItem};
use edumarket_core::pricing::total_of;
use edumarket_core::{ContentId, LedgerKind, MarketError, Money, OrderId, PaymentId, Result, UserId};
use sqlx::PgConnection;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lock a wallet row for the rest of the transaction and read its balance.
pub(crate) async fn lock_balance(conn: &mut PgConnection, user_id: UserId) -> Result<Money> {
    let balance: Option<(i64,)> = sqlx::query_as("SELECT balance_cents FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("Failed to lock wallet"))?;

    let (balance,) = balance.ok_or_else(|| MarketError::not_found("User", user_id))?;
    money(balance)
}

/// Lock every listed wallet in user id order.
///
/// Row locks are re-entrant within a transaction, so later
/// [`lock_balance`] and [`post`] calls on these wallets never wait.
pub(crate) async fn lock_wallets(conn: &mut PgConnection, user_ids: &[UserId]) -> Result<()> {
    let mut ids: Vec<Uuid> = user_ids.iter().map(|id| *id.as_uuid()).collect();
    ids.sort_unstable();
    ids.dedup();

    let locked: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids.as_slice())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage("Failed to lock wallets"))?;

    if locked.len() != ids.len() {
        let missing = ids
            .iter()
            .find(|id| !locked.iter().any(|(found,)| found == *id))
            .map_or_else(String::new, ToString::to_string);
        return Err(MarketError::not_found("User", missing));
    }
    Ok(())
}

/// Every wallet an order moves money between: the buyer and each seller.
pub(crate) fn order_wallets(buyer_id: UserId, teacher_ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
    let mut wallets: Vec<UserId> = std::iter::once(buyer_id).chain(teacher_ids).collect();
    wallets.sort_unstable();
    wallets.dedup();
    wallets
}

/// Apply one ledger entry and return the new balance.
///
/// Zero amounts are skipped. Debits below zero are rejected by the
/// `balance_cents >= 0` check, so callers lock and verify first to report
/// [`MarketError::InsufficientFunds`] instead of a storage error.
pub(crate) async fn post(
    conn: &mut PgConnection,
    user_id: UserId,
    kind: LedgerKind,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<Money> {
    let delta = cents(amount)?;
    if delta == 0 {
        return lock_balance(conn, user_id).await;
    }
    let signed = if kind.is_credit() { delta } else { -delta };

    let (balance,): (i64,) =
        sqlx::query_as("UPDATE users SET balance_cents = balance_cents + $2 WHERE id = $1 RETURNING balance_cents")
            .bind(user_id.as_uuid())
            .bind(signed)
            .fetch_one(&mut *conn)
            .await
            .map_err(storage("Failed to update balance"))?;

    sqlx::query(
        r"
        INSERT INTO ledger_entries (user_id, kind, amount_cents, balance_after_cents, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(user_id.as_uuid())
    .bind(kind.as_str())
    .bind(delta)
    .bind(balance)
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(storage("Failed to append ledger entry"))?;

    money(balance)
}

/// Items of `content_ids` the user owns directly or through the parent course.
pub(crate) async fn owned_among(
    conn: &mut PgConnection,
    user_id: UserId,
    content_ids: &[ContentId],
) -> Result<Vec<ContentId>> {
    if content_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        r"
        SELECT c.id
        FROM contents c
        WHERE c.id = ANY($2)
          AND EXISTS (
              SELECT 1 FROM enrollments e
              WHERE e.user_id = $1
                AND (e.content_id = c.id OR e.content_id = c.parent_id)
          )
        ",
    )
    .bind(user_id.as_uuid())
    .bind(content_uuids(content_ids))
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("Failed to check ownership"))?;

    Ok(ids.into_iter().map(|(id,)| ContentId::from_uuid(id)).collect())
}

/// Turn priced items into a paid order.
///
/// Debits the buyer, writes the order and its items, enrolls the
/// beneficiary, credits each teacher once with their summed share and
/// drops the bought items from the buyer's cart. Must run inside a
/// transaction.
pub(crate) async fn fulfill(
    conn: &mut PgConnection,
    buyer_id: UserId,
    beneficiary_id: UserId,
    items: Vec<OrderItem>,
    payment_id: Option<PaymentId>,
    now: DateTime<Utc>,
) -> Result<Order> {
    let total = total_of(items.iter().map(|i| i.price))?;
    let platform_fee = total_of(items.iter().map(|i| i.platform_fee))?;
    let order_id = OrderId::new();
    let reference = order_id.to_string();

    lock_wallets(conn, &order_wallets(buyer_id, items.iter().map(|i| i.teacher_id))).await?;
    let balance = lock_balance(conn, buyer_id).await?;
    if balance < total {
        return Err(MarketError::InsufficientFunds {
            balance_cents: balance.cents(),
            required_cents: total.cents(),
        });
    }
    post(conn, buyer_id, LedgerKind::Purchase, total, &reference, now).await?;

    sqlx::query(
        r"
        INSERT INTO orders (id, buyer_id, beneficiary_id, total_cents, platform_fee_cents, payment_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(order_id.as_uuid())
    .bind(buyer_id.as_uuid())
    .bind(beneficiary_id.as_uuid())
    .bind(cents(total)?)
    .bind(cents(platform_fee)?)
    .bind(payment_id.map(|p| *p.as_uuid()))
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(storage("Failed to create order"))?;

    let mut earnings: BTreeMap<UserId, Money> = BTreeMap::new();
    for item in &items {
        sqlx::query(
            r"
            INSERT INTO order_items
                (order_id, content_id, teacher_id, price_cents, teacher_share_cents, platform_fee_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id.as_uuid())
        .bind(item.content_id.as_uuid())
        .bind(item.teacher_id.as_uuid())
        .bind(cents(item.price)?)
        .bind(cents(item.teacher_share)?)
        .bind(cents(item.platform_fee)?)
        .execute(&mut *conn)
        .await
        .map_err(storage("Failed to create order item"))?;

        let enrolled = sqlx::query(
            r"
            INSERT INTO enrollments (user_id, content_id, order_id, enrolled_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, content_id) DO NOTHING
            ",
        )
        .bind(beneficiary_id.as_uuid())
        .bind(item.content_id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(storage("Failed to enroll"))?;

        if enrolled.rows_affected() == 0 {
            return Err(MarketError::conflict(format!(
                "content {} is already owned",
                item.content_id
            )));
        }

        let earned = earnings.entry(item.teacher_id).or_default();
        *earned = total_of([*earned, item.teacher_share])?;
    }

    for (teacher_id, share) in &earnings {
        post(conn, *teacher_id, LedgerKind::Earning, *share, &reference, now).await?;
    }

    let bought: Vec<ContentId> = items.iter().map(|i| i.content_id).collect();
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND content_id = ANY($2)")
        .bind(buyer_id.as_uuid())
        .bind(content_uuids(&bought))
        .execute(&mut *conn)
        .await
        .map_err(storage("Failed to clear purchased cart items"))?;

    tracing::info!(
        order_id = %order_id,
        buyer_id = %buyer_id,
        beneficiary_id = %beneficiary_id,
        total_cents = total.cents(),
        platform_fee_cents = platform_fee.cents(),
        items = items.len(),
        "Order fulfilled"
    );

    Ok(Order {
        id: order_id,
        buyer_id,
        beneficiary_id,
        total,
        platform_fee,
        payment_id,
        items,
        created_at: now,
    })
}

/// Attach items to already loaded order headers.
pub(crate) async fn load_items(conn: &mut PgConnection, orders: &mut [Order]) -> Result<()> {
    if orders.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| *o.id.as_uuid()).collect();
    let rows = sqlx::query(
        r"
        SELECT order_id, content_id, teacher_id, price_cents, teacher_share_cents, platform_fee_cents
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY content_id
        ",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("Failed to load order items"))?;

    for row in &rows {
        let (order_id, item) = rows::order_item(row)?;
        if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
            order.items.push(item);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_wallets_are_sorted_and_unique() {
        let buyer = UserId::new();
        let teacher = UserId::new();
        let wallets = order_wallets(buyer, [teacher, teacher, buyer]);

        assert_eq!(wallets.len(), 2);
        assert!(wallets.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(wallets.contains(&buyer) && wallets.contains(&teacher));
    }
}
