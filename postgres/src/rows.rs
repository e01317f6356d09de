//! Row decoding.
//!
//! Every table is read through one column list and one mapper so queries
//! that join or lock the same table return identical shapes.

use edumarket_core::model::{
    CartLine, CheckoutLine, Comment, Content, GuardianLink, LedgerEntry, Order, OrderItem, Payment,
    QuizAttempt, QuizQuestion, Review, User, Withdrawal,
};
use edumarket_core::{
    AttemptId, CommentId, ContentId, GuardianLinkId, MarketError, Money, OrderId, PaymentId,
    QuestionId, Result, ReviewId, UserId, WithdrawalId,
};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.email, u.name, u.role, u.bio, u.email_verified, u.is_active, u.balance_cents, u.created_at";

pub(crate) const CONTENT_COLUMNS: &str = "c.id, c.teacher_id, c.kind, c.title, c.description, c.subject, \
     c.price_cents, c.status, c.parent_id, c.created_at, c.updated_at";

pub(crate) const PAYMENT_COLUMNS: &str = "p.id, p.user_id, p.beneficiary_id, p.purpose, p.amount_cents, p.status, \
     p.lines, p.commission_bps, p.gateway_reference, p.checkout_url, p.failure_reason, p.order_id, \
     p.created_at, p.updated_at";

pub(crate) const WITHDRAWAL_COLUMNS: &str =
    "w.id, w.teacher_id, w.amount_cents, w.status, w.note, w.processed_by, w.created_at, w.processed_at";

pub(crate) const LINK_COLUMNS: &str = "l.id, l.guardian_id, l.student_id, s.email AS student_email, \
     g.name AS guardian_name, l.status, l.created_at, l.responded_at";

pub(crate) const LINK_JOINS: &str =
    "FROM guardian_links l JOIN users s ON s.id = l.student_id JOIN users g ON g.id = l.guardian_id";

/// Read one column, turning decode failures into storage errors.
pub(crate) fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| MarketError::Storage(format!("Failed to read column {column}: {e}")))
}

/// `BIGINT` cents to [`Money`].
pub(crate) fn money(cents: i64) -> Result<Money> {
    Money::from_db(cents).ok_or_else(|| MarketError::Storage(format!("negative amount in database: {cents}")))
}

/// [`Money`] to `BIGINT` cents.
pub(crate) fn cents(amount: Money) -> Result<i64> {
    amount
        .to_db()
        .ok_or_else(|| MarketError::validation(format!("amount {amount} is too large")))
}

/// Non-negative `INTEGER` to `u32`.
pub(crate) fn unsigned(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| MarketError::Storage(format!("negative {column} in database")))
}

/// `COUNT(*)` to `u64`.
pub(crate) fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// `u32` to `INTEGER`.
pub(crate) fn signed(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| MarketError::validation(format!("{value} is out of range")))
}

/// Raw UUIDs for an `= ANY($n)` bind.
pub(crate) fn content_uuids(ids: &[ContentId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

pub(crate) fn user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        email: get(row, "email")?,
        name: get(row, "name")?,
        role: get::<String>(row, "role")?.parse()?,
        bio: get(row, "bio")?,
        email_verified: get(row, "email_verified")?,
        is_active: get(row, "is_active")?,
        balance: money(get(row, "balance_cents")?)?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn content(row: &PgRow) -> Result<Content> {
    Ok(Content {
        id: ContentId::from_uuid(get(row, "id")?),
        teacher_id: UserId::from_uuid(get(row, "teacher_id")?),
        kind: get::<String>(row, "kind")?.parse()?,
        title: get(row, "title")?,
        description: get(row, "description")?,
        subject: get(row, "subject")?,
        price: money(get(row, "price_cents")?)?,
        status: get::<String>(row, "status")?.parse()?,
        parent_id: get::<Option<Uuid>>(row, "parent_id")?.map(ContentId::from_uuid),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn question(row: &PgRow) -> Result<QuizQuestion> {
    Ok(QuizQuestion {
        id: QuestionId::from_uuid(get(row, "id")?),
        quiz_id: ContentId::from_uuid(get(row, "quiz_id")?),
        prompt: get(row, "prompt")?,
        options: get(row, "options")?,
        correct_index: unsigned(get(row, "correct_index")?, "correct_index")?,
        position: unsigned(get(row, "position")?, "position")?,
    })
}

pub(crate) fn attempt(row: &PgRow) -> Result<QuizAttempt> {
    Ok(QuizAttempt {
        id: AttemptId::from_uuid(get(row, "id")?),
        quiz_id: ContentId::from_uuid(get(row, "quiz_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        answers: get::<Json<Vec<Option<u32>>>>(row, "answers")?.0,
        score: unsigned(get(row, "score")?, "score")?,
        max_score: unsigned(get(row, "max_score")?, "max_score")?,
        passed: get(row, "passed")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn cart_line(row: &PgRow) -> Result<CartLine> {
    Ok(CartLine {
        content_id: ContentId::from_uuid(get(row, "id")?),
        title: get(row, "title")?,
        kind: get::<String>(row, "kind")?.parse()?,
        teacher_id: UserId::from_uuid(get(row, "teacher_id")?),
        price: money(get(row, "price_cents")?)?,
        status: get::<String>(row, "status")?.parse()?,
        added_at: get(row, "added_at")?,
    })
}

pub(crate) fn payment(row: &PgRow) -> Result<Payment> {
    let commission_bps: i32 = get(row, "commission_bps")?;
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        beneficiary_id: UserId::from_uuid(get(row, "beneficiary_id")?),
        purpose: get::<String>(row, "purpose")?.parse()?,
        amount: money(get(row, "amount_cents")?)?,
        status: get::<String>(row, "status")?.parse()?,
        lines: get::<Json<Vec<CheckoutLine>>>(row, "lines")?.0,
        commission_bps: unsigned(commission_bps, "commission_bps")?,
        gateway_reference: get(row, "gateway_reference")?,
        checkout_url: get(row, "checkout_url")?,
        failure_reason: get(row, "failure_reason")?,
        order_id: get::<Option<Uuid>>(row, "order_id")?.map(OrderId::from_uuid),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(get(row, "id")?),
        buyer_id: UserId::from_uuid(get(row, "buyer_id")?),
        beneficiary_id: UserId::from_uuid(get(row, "beneficiary_id")?),
        total: money(get(row, "total_cents")?)?,
        platform_fee: money(get(row, "platform_fee_cents")?)?,
        payment_id: get::<Option<Uuid>>(row, "payment_id")?.map(PaymentId::from_uuid),
        items: Vec::new(),
        created_at: get(row, "created_at")?,
    })
}

/// An order item together with the order it belongs to.
pub(crate) fn order_item(row: &PgRow) -> Result<(OrderId, OrderItem)> {
    Ok((
        OrderId::from_uuid(get(row, "order_id")?),
        OrderItem {
            content_id: ContentId::from_uuid(get(row, "content_id")?),
            teacher_id: UserId::from_uuid(get(row, "teacher_id")?),
            price: money(get(row, "price_cents")?)?,
            teacher_share: money(get(row, "teacher_share_cents")?)?,
            platform_fee: money(get(row, "platform_fee_cents")?)?,
        },
    ))
}

pub(crate) fn ledger_entry(row: &PgRow) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: get(row, "id")?,
        user_id: UserId::from_uuid(get(row, "user_id")?),
        kind: get::<String>(row, "kind")?.parse()?,
        amount: money(get(row, "amount_cents")?)?,
        balance_after: money(get(row, "balance_after_cents")?)?,
        reference: get(row, "reference")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn withdrawal(row: &PgRow) -> Result<Withdrawal> {
    Ok(Withdrawal {
        id: WithdrawalId::from_uuid(get(row, "id")?),
        teacher_id: UserId::from_uuid(get(row, "teacher_id")?),
        amount: money(get(row, "amount_cents")?)?,
        status: get::<String>(row, "status")?.parse()?,
        note: get(row, "note")?,
        processed_by: get::<Option<Uuid>>(row, "processed_by")?.map(UserId::from_uuid),
        created_at: get(row, "created_at")?,
        processed_at: get(row, "processed_at")?,
    })
}

pub(crate) fn review(row: &PgRow) -> Result<Review> {
    let rating: i16 = get(row, "rating")?;
    Ok(Review {
        id: ReviewId::from_uuid(get(row, "id")?),
        content_id: ContentId::from_uuid(get(row, "content_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        author_name: get(row, "author_name")?,
        rating: u8::try_from(rating).map_err(|_| MarketError::Storage(format!("invalid rating {rating}")))?,
        body: get(row, "body")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn comment(row: &PgRow) -> Result<Comment> {
    Ok(Comment {
        id: CommentId::from_uuid(get(row, "id")?),
        content_id: ContentId::from_uuid(get(row, "content_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        author_name: get(row, "author_name")?,
        parent_id: get::<Option<Uuid>>(row, "parent_id")?.map(CommentId::from_uuid),
        body: get(row, "body")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn guardian_link(row: &PgRow) -> Result<GuardianLink> {
    Ok(GuardianLink {
        id: GuardianLinkId::from_uuid(get(row, "id")?),
        guardian_id: UserId::from_uuid(get(row, "guardian_id")?),
        student_id: UserId::from_uuid(get(row, "student_id")?),
        student_email: get(row, "student_email")?,
        guardian_name: get(row, "guardian_name")?,
        status: get::<String>(row, "status")?.parse()?,
        created_at: get(row, "created_at")?,
        responded_at: get(row, "responded_at")?,
    })
}
