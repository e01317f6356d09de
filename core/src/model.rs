//! Marketplace entities.
//!
//! These are the shapes the repositories hand back and the HTTP layer
//! serializes. Inputs for create/update operations (`New*`, `*Patch`) live
//! next to the entity they produce.

use crate::money::Money;
use crate::types::{
    AttemptId, CommentId, ContentId, ContentKind, ContentStatus, GuardianLinkId,
    GuardianLinkStatus, LedgerKind, OrderId, PaymentId, PaymentPurpose, PaymentStatus, QuestionId,
    ReviewId, Role, UserId, WithdrawalId, WithdrawalStatus,
};
use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Accounts
// ============================================================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id
    pub id: UserId,
    /// Login email, stored lower-cased
    pub email: String,
    /// Display name
    pub name: String,
    /// Account role
    pub role: Role,
    /// Short profile text
    pub bio: Option<String>,
    /// Set once a magic link has been verified
    pub email_verified: bool,
    /// Deactivated accounts cannot log in or use existing sessions
    pub is_active: bool,
    /// Wallet balance
    pub balance: Money,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Input for account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Login email
    pub email: String,
    /// Display name
    pub name: String,
    /// Account role
    pub role: Role,
}

/// Self-service profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfilePatch {
    /// New display name
    pub name: Option<String>,
    /// New bio (empty string clears it)
    pub bio: Option<String>,
}

/// Filter for the admin user list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    /// Only users with this role
    pub role: Option<Role>,
}

// ============================================================================
// Catalog
// ============================================================================

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Content id
    pub id: ContentId,
    /// Publishing teacher
    pub teacher_id: UserId,
    /// Course, book, lecture or quiz
    pub kind: ContentKind,
    /// Title
    pub title: String,
    /// Description shown in the catalog
    pub description: String,
    /// Free-form subject, e.g. "mathematics"
    pub subject: String,
    /// Price; zero means free
    pub price: Money,
    /// Publication status
    pub status: ContentStatus,
    /// Enclosing course for lectures and quizzes
    pub parent_id: Option<ContentId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Returns `true` if the item is listed and purchasable.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

/// Input for content creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewContent {
    /// Kind of item
    pub kind: ContentKind,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Subject
    #[serde(default)]
    pub subject: String,
    /// Price in cents
    pub price_cents: u64,
    /// Enclosing course
    pub parent_id: Option<ContentId>,
}

/// Partial content update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContentPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New subject
    pub subject: Option<String>,
    /// New price in cents
    pub price_cents: Option<u64>,
    /// Requested status change
    pub status: Option<ContentStatus>,
}

impl ContentPatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.subject.is_none()
            && self.price_cents.is_none()
            && self.status.is_none()
    }
}

/// Catalog search filter. Only published items are ever listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContentFilter {
    /// Kind of item
    pub kind: Option<ContentKind>,
    /// Exact subject (case-insensitive)
    pub subject: Option<String>,
    /// Publishing teacher
    pub teacher_id: Option<UserId>,
    /// Substring of title or description (case-insensitive)
    pub q: Option<String>,
    /// Lowest price in cents
    pub min_price: Option<u64>,
    /// Highest price in cents
    pub max_price: Option<u64>,
}

impl ContentFilter {
    /// Returns `true` if `content` satisfies every set criterion.
    ///
    /// The `PostgreSQL` backend expresses the same predicate in SQL; the
    /// in-memory backend uses this directly.
    #[must_use]
    pub fn matches(&self, content: &Content) -> bool {
        if !content.is_published() {
            return false;
        }
        if self.kind.is_some_and(|k| k != content.kind) {
            return false;
        }
        if self.teacher_id.is_some_and(|t| t != content.teacher_id) {
            return false;
        }
        if self.subject.as_ref().is_some_and(|s| !s.eq_ignore_ascii_case(&content.subject)) {
            return false;
        }
        if let Some(q) = &self.q {
            let q = q.to_lowercase();
            if !content.title.to_lowercase().contains(&q) && !content.description.to_lowercase().contains(&q) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| content.price.cents() < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| content.price.cents() > max) {
            return false;
        }
        true
    }
}

/// Average rating and review count for one content item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean rating, `None` when there are no reviews
    pub average: Option<f64>,
    /// Number of reviews
    pub count: u64,
}

impl RatingSummary {
    /// Summarize a set of ratings.
    #[must_use]
    pub fn from_ratings(ratings: &[u8]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }
        let sum: u64 = ratings.iter().map(|r| u64::from(*r)).sum();
        let count = ratings.len() as u64;
        #[allow(clippy::cast_precision_loss)]
        let average = sum as f64 / count as f64;
        Self {
            average: Some((average * 100.0).round() / 100.0),
            count,
        }
    }
}

/// Catalog listing row: content plus its rating summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentListing {
    /// The item
    #[serde(flatten)]
    pub content: Content,
    /// Its reviews
    pub rating: RatingSummary,
}

/// A multiple-choice quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question id
    pub id: QuestionId,
    /// Owning quiz
    pub quiz_id: ContentId,
    /// Question text
    pub prompt: String,
    /// Answer options
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_index: u32,
    /// Display order inside the quiz
    pub position: u32,
}

/// Input for question creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewQuestion {
    /// Question text
    pub prompt: String,
    /// Answer options
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_index: u32,
}

/// A graded quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    /// Attempt id
    pub id: AttemptId,
    /// Graded quiz
    pub quiz_id: ContentId,
    /// Student who answered
    pub user_id: UserId,
    /// Submitted answers, `None` for skipped questions
    pub answers: Vec<Option<u32>>,
    /// Correct answers
    pub score: u32,
    /// Number of questions
    pub max_score: u32,
    /// Passing grade reached
    pub passed: bool,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Cart, orders, library
// ============================================================================

/// One cart line joined with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Item in the cart
    pub content_id: ContentId,
    /// Its title
    pub title: String,
    /// Its kind
    pub kind: ContentKind,
    /// Seller
    pub teacher_id: UserId,
    /// Current price
    pub price: Money,
    /// Current status
    pub status: ContentStatus,
    /// When it was added
    pub added_at: DateTime<Utc>,
}

/// Item frozen into a pending gateway checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    /// Item bought
    pub content_id: ContentId,
    /// Seller
    pub teacher_id: UserId,
    /// Price at checkout time
    pub price: Money,
}

impl From<&CartLine> for CheckoutLine {
    fn from(line: &CartLine) -> Self {
        Self {
            content_id: line.content_id,
            teacher_id: line.teacher_id,
            price: line.price,
        }
    }
}

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Who paid
    pub buyer_id: UserId,
    /// Who received access (the buyer or a linked student)
    pub beneficiary_id: UserId,
    /// Sum of item prices
    pub total: Money,
    /// Sum of platform fees
    pub platform_fee: Money,
    /// Gateway payment that funded the order, if any
    pub payment_id: Option<PaymentId>,
    /// Purchased items
    pub items: Vec<OrderItem>,
    /// Completion time
    pub created_at: DateTime<Utc>,
}

/// One purchased item with its revenue split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item bought
    pub content_id: ContentId,
    /// Seller
    pub teacher_id: UserId,
    /// Price paid
    pub price: Money,
    /// Credited to the teacher
    pub teacher_share: Money,
    /// Kept by the platform
    pub platform_fee: Money,
}

/// Everything needed to turn a cart snapshot into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Who pays
    pub buyer_id: UserId,
    /// Who receives access
    pub beneficiary_id: UserId,
    /// Items and prices
    pub lines: Vec<CheckoutLine>,
    /// Platform commission in basis points
    pub commission_bps: u32,
}

/// An owned item in a user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// The item
    pub content: Content,
    /// Order that granted access
    pub order_id: OrderId,
    /// When access was granted
    pub enrolled_at: DateTime<Utc>,
}

// ============================================================================
// Payments and wallet
// ============================================================================

/// A payment routed through the external gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id, also sent to the gateway as the merchant reference
    pub id: PaymentId,
    /// Who pays
    pub user_id: UserId,
    /// Who receives access for checkout payments
    pub beneficiary_id: UserId,
    /// Checkout or top-up
    pub purpose: PaymentPurpose,
    /// Amount requested from the gateway
    pub amount: Money,
    /// Lifecycle status
    pub status: PaymentStatus,
    /// Cart snapshot for checkout payments
    pub lines: Vec<CheckoutLine>,
    /// Commission rate frozen at checkout
    pub commission_bps: u32,
    /// Gateway-side session or charge id
    pub gateway_reference: Option<String>,
    /// Hosted checkout page
    pub checkout_url: Option<String>,
    /// Decline reason reported by the gateway
    pub failure_reason: Option<String>,
    /// Order created on success
    pub order_id: Option<OrderId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Input for a pending payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Who pays
    pub user_id: UserId,
    /// Who receives access
    pub beneficiary_id: UserId,
    /// Checkout or top-up
    pub purpose: PaymentPurpose,
    /// Amount
    pub amount: Money,
    /// Cart snapshot (empty for top-ups)
    pub lines: Vec<CheckoutLine>,
    /// Commission rate at checkout time
    pub commission_bps: u32,
}

/// Verified gateway notification that a payment was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// Gateway event id, used for deduplication
    pub event_id: String,
    /// Our payment id
    pub payment_id: PaymentId,
    /// Gateway-side reference
    pub gateway_reference: String,
    /// Amount the gateway captured
    pub amount: Money,
}

/// Result of applying a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    /// Wallet credited; `order` is set for checkout payments that bought
    /// at least one item.
    Fulfilled {
        /// The updated payment
        payment: Payment,
        /// Order created from the snapshot
        order: Option<Order>,
    },
    /// The event or payment had already been handled.
    AlreadyProcessed {
        /// The payment as stored
        payment: Payment,
    },
}

/// One movement of a wallet balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic entry id
    pub id: i64,
    /// Wallet owner
    pub user_id: UserId,
    /// Direction and reason
    pub kind: LedgerKind,
    /// Absolute amount
    pub amount: Money,
    /// Balance after the entry
    pub balance_after: Money,
    /// Related order, payment or withdrawal id
    pub reference: Option<String>,
    /// Entry time
    pub created_at: DateTime<Utc>,
}

/// Wallet balance with a page of ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletView {
    /// Current balance
    pub balance: Money,
    /// Most recent entries first
    pub entries: crate::paging::Page<LedgerEntry>,
}

// ============================================================================
// Withdrawals
// ============================================================================

/// A teacher payout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Withdrawal id
    pub id: WithdrawalId,
    /// Requesting teacher
    pub teacher_id: UserId,
    /// Amount held from the wallet
    pub amount: Money,
    /// Lifecycle status
    pub status: WithdrawalStatus,
    /// Rejection reason
    pub note: Option<String>,
    /// Admin who decided
    pub processed_by: Option<UserId>,
    /// Request time
    pub created_at: DateTime<Utc>,
    /// Decision time
    pub processed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Engagement
// ============================================================================

/// A 1-5 star review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review id
    pub id: ReviewId,
    /// Reviewed item
    pub content_id: ContentId,
    /// Author
    pub user_id: UserId,
    /// Author display name
    pub author_name: String,
    /// Stars
    pub rating: u8,
    /// Review text
    pub body: String,
    /// First submission
    pub created_at: DateTime<Utc>,
    /// Last edit
    pub updated_at: DateTime<Utc>,
}

/// Reviews page with the item's summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPage {
    /// Rating summary over all reviews
    pub summary: RatingSummary,
    /// Requested page
    pub reviews: crate::paging::Page<Review>,
}

/// A discussion comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id
    pub id: CommentId,
    /// Discussed item
    pub content_id: ContentId,
    /// Author
    pub user_id: UserId,
    /// Author display name
    pub author_name: String,
    /// Replied-to comment
    pub parent_id: Option<CommentId>,
    /// Text
    pub body: String,
    /// Posting time
    pub created_at: DateTime<Utc>,
}

/// A comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    /// Top-level or reply comment
    #[serde(flatten)]
    pub comment: Comment,
    /// Direct replies, oldest first
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Deepest nesting level of a thread, counting the top-level comment.
    pub const MAX_DEPTH: usize = 8;

    /// Nest a flat comment list under its parents.
    ///
    /// Comments are ordered by `created_at` at every level. Replies whose
    /// parent is missing from `comments` are dropped. Replies below
    /// [`Self::MAX_DEPTH`] are listed flat, oldest first, under their
    /// ancestor on the last level.
    #[must_use]
    pub fn build(mut comments: Vec<Comment>) -> Vec<Self> {
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let present: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
        let mut children: HashMap<Option<CommentId>, Vec<usize>> = HashMap::new();
        for (idx, comment) in comments.iter().enumerate() {
            if comment.parent_id.is_none_or(|parent| present.contains(&parent)) {
                children.entry(comment.parent_id).or_default().push(idx);
            }
        }
        let kids = |id: CommentId| children.get(&Some(id)).cloned().unwrap_or_default();

        // Pre-order walk; every reply is placed after its parent in `order`.
        let roots = children.get(&None).cloned().unwrap_or_default();
        let mut replies: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
        let mut order = Vec::with_capacity(comments.len());
        let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&idx| (idx, 1)).collect();
        while let Some((idx, depth)) = stack.pop() {
            order.push(idx);
            let direct = kids(comments[idx].id);
            if depth + 1 < Self::MAX_DEPTH {
                stack.extend(direct.iter().rev().map(|&child| (child, depth + 1)));
                replies[idx] = direct;
            } else {
                let mut flat = Vec::new();
                let mut pending = direct;
                while let Some(child) = pending.pop() {
                    flat.push(child);
                    pending.extend(kids(comments[child].id));
                }
                flat.sort_unstable();
                order.extend_from_slice(&flat);
                replies[idx] = flat;
            }
        }

        let mut slots: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
        let mut built: Vec<Option<Self>> = (0..slots.len()).map(|_| None).collect();
        for &idx in order.iter().rev() {
            let nested = replies[idx].iter().filter_map(|&child| built[child].take()).collect();
            if let Some(comment) = slots[idx].take() {
                built[idx] = Some(Self {
                    comment,
                    replies: nested,
                });
            }
        }
        roots.iter().filter_map(|&idx| built[idx].take()).collect()
    }
}

// ============================================================================
// Guardians
// ============================================================================

/// Link between a guardian and a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianLink {
    /// Link id
    pub id: GuardianLinkId,
    /// Guardian account
    pub guardian_id: UserId,
    /// Student account
    pub student_id: UserId,
    /// Student email, for display
    pub student_email: String,
    /// Guardian name, for display
    pub guardian_name: String,
    /// Lifecycle status
    pub status: GuardianLinkStatus,
    /// Request time
    pub created_at: DateTime<Utc>,
    /// Answer time
    pub responded_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Reports
// ============================================================================

/// Number of users with one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCount {
    /// Role
    pub role: Role,
    /// Users with that role
    pub count: u64,
}

/// Number of published items of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    /// Kind
    pub kind: ContentKind,
    /// Published items of that kind
    pub count: u64,
}

/// Admin dashboard headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Users per role
    pub users_by_role: Vec<RoleCount>,
    /// Active accounts
    pub active_users: u64,
    /// Published content per kind
    pub published_by_kind: Vec<KindCount>,
    /// Completed orders
    pub order_count: u64,
    /// Sum of order totals
    pub gross_revenue: Money,
    /// Sum of platform fees
    pub platform_fees: Money,
    /// Sum of teacher shares
    pub teacher_earnings: Money,
    /// Withdrawals awaiting review
    pub pending_withdrawals: u64,
    /// Amount held by pending withdrawals
    pub pending_withdrawal_amount: Money,
    /// Sum of all wallet balances
    pub wallet_liability: Money,
}

/// Revenue for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueBucket {
    /// First instant of the month (UTC)
    pub month: DateTime<Utc>,
    /// Orders completed in the month
    pub order_count: u64,
    /// Sum of order totals
    pub gross_revenue: Money,
    /// Sum of platform fees
    pub platform_fees: Money,
}

impl RevenueBucket {
    /// First instant of the month containing `at`.
    #[must_use]
    pub fn month_of(at: DateTime<Utc>) -> DateTime<Utc> {
        at.date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(at, |d| d.and_utc())
    }

    /// Start of a report window covering `months` calendar months up to and
    /// including the month of `now`. `months` below 1 is treated as 1.
    #[must_use]
    pub fn window_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
        let current = Self::month_of(now);
        current
            .checked_sub_months(Months::new(months.max(1) - 1))
            .unwrap_or(current)
    }
}

/// Best-selling content row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopContent {
    /// Item
    pub content_id: ContentId,
    /// Its title
    pub title: String,
    /// Its kind
    pub kind: ContentKind,
    /// Seller
    pub teacher_id: UserId,
    /// Units sold
    pub sales: u64,
    /// Revenue from those sales
    pub revenue: Money,
}

/// Highest-earning teacher row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTeacher {
    /// Teacher
    pub teacher_id: UserId,
    /// Display name
    pub name: String,
    /// Units sold
    pub sales: u64,
    /// Sum of teacher shares
    pub earnings: Money,
}
