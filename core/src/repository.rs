//! Storage traits.
//!
//! The HTTP layer only sees these traits (held as `Arc<dyn …>`), with a
//! `PostgreSQL` implementation for production and an in-memory one for
//! tests. Any method that writes more than one row is a complete workflow:
//! an implementation must apply all of it or none of it.
//!
//! Timestamps are passed in by the caller so the whole service reads time
//! from a single [`Clock`](crate::environment::Clock).

use crate::error::Result;
use crate::model::{
    CartLine, Comment, Content, ContentFilter, ContentListing, ContentPatch, DashboardSummary,
    FulfillmentOutcome, GuardianLink, LibraryEntry, NewContent, NewPayment, NewQuestion, NewUser,
    Order, Payment, PaymentConfirmation, ProfilePatch, PurchaseRequest, QuizAttempt, QuizQuestion,
    RatingSummary, Review, RevenueBucket, TopContent, TopTeacher, User, UserFilter, WalletView,
    Withdrawal,
};
use crate::money::Money;
use crate::paging::{Page, PageRequest};
use crate::types::{
    CommentId, ContentId, GuardianLinkId, OrderId, PaymentId, QuestionId, ReviewId, UserId,
    WithdrawalId, WithdrawalStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Accounts and guardian links.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create an account with an empty wallet.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::MarketError::Conflict) if the email is taken.
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User>;

    /// Load an account by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Load an account by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Apply a profile update.
    async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> Result<User>;

    /// Record that the account proved ownership of its email.
    async fn mark_email_verified(&self, id: UserId) -> Result<()>;

    /// Activate or deactivate an account.
    async fn set_active(&self, id: UserId, active: bool) -> Result<User>;

    /// List accounts, newest first.
    async fn list_users(&self, filter: UserFilter, page: PageRequest) -> Result<Page<User>>;

    /// Create an admin account for `email`, or promote the existing one.
    async fn ensure_admin(&self, email: &str, name: &str, now: DateTime<Utc>) -> Result<User>;

    /// Request a guardian link to `student_id`.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::MarketError::Conflict) if a pending or accepted
    /// link already exists.
    async fn create_link(
        &self,
        guardian_id: UserId,
        student_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<GuardianLink>;

    /// Load a link.
    async fn get_link(&self, id: GuardianLinkId) -> Result<Option<GuardianLink>>;

    /// Accept or decline a pending link.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`](crate::MarketError::InvalidTransition) unless the
    /// link is pending.
    async fn respond_link(&self, id: GuardianLinkId, accept: bool, now: DateTime<Utc>) -> Result<GuardianLink>;

    /// Links requested by a guardian, newest first.
    async fn links_for_guardian(&self, guardian_id: UserId) -> Result<Vec<GuardianLink>>;

    /// Links addressed to a student, newest first.
    async fn links_for_student(&self, student_id: UserId) -> Result<Vec<GuardianLink>>;

    /// Returns `true` if an accepted link joins the two accounts.
    async fn is_guardian_of(&self, guardian_id: UserId, student_id: UserId) -> Result<bool>;

    /// Students with an accepted link to the guardian.
    async fn students_of(&self, guardian_id: UserId) -> Result<Vec<User>>;
}

/// Content, quiz questions.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Create a draft.
    async fn create_content(&self, teacher_id: UserId, content: NewContent, now: DateTime<Utc>) -> Result<Content>;

    /// Load an item regardless of status.
    async fn get_content(&self, id: ContentId) -> Result<Option<Content>>;

    /// Apply an already validated patch.
    async fn update_content(&self, id: ContentId, patch: ContentPatch, now: DateTime<Utc>) -> Result<Content>;

    /// Published items matching `filter`, newest first, with ratings.
    async fn list_published(&self, filter: ContentFilter, page: PageRequest) -> Result<Page<ContentListing>>;

    /// A teacher's items in every status, newest first.
    async fn list_by_teacher(&self, teacher_id: UserId, page: PageRequest) -> Result<Page<Content>>;

    /// Items nested under a course, oldest first.
    async fn children(&self, parent_id: ContentId) -> Result<Vec<Content>>;

    /// Append a question to a quiz.
    async fn add_question(&self, quiz_id: ContentId, question: NewQuestion) -> Result<QuizQuestion>;

    /// Questions in display order.
    async fn questions(&self, quiz_id: ContentId) -> Result<Vec<QuizQuestion>>;

    /// Load a question.
    async fn get_question(&self, id: QuestionId) -> Result<Option<QuizQuestion>>;

    /// Delete a question.
    async fn delete_question(&self, id: QuestionId) -> Result<()>;
}

/// Shopping carts.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Cart lines joined with current content data, oldest first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Add an item.
    ///
    /// # Errors
    ///
    /// [`Conflict`](crate::MarketError::Conflict) if it is already in the cart.
    async fn add_to_cart(&self, user_id: UserId, content_id: ContentId, now: DateTime<Utc>) -> Result<()>;

    /// Remove an item; returns `false` if it was not in the cart.
    async fn remove_from_cart(&self, user_id: UserId, content_id: ContentId) -> Result<bool>;

    /// Empty the cart.
    async fn clear_cart(&self, user_id: UserId) -> Result<()>;
}

/// Money movements: purchases, payments, wallets and withdrawals.
#[async_trait]
pub trait CommerceRepository: Send + Sync {
    /// Returns `true` if the user is enrolled in the item or its parent
    /// course.
    async fn owns(&self, user_id: UserId, content_id: ContentId) -> Result<bool>;

    /// The subset of `content_ids` the user already owns, directly or through
    /// the parent course.
    async fn owned_among(&self, user_id: UserId, content_ids: &[ContentId]) -> Result<Vec<ContentId>>;

    /// Pay for `request` from the buyer's wallet.
    ///
    /// In one transaction: lock and debit the buyer's wallet, create the
    /// order with its revenue split, enroll the beneficiary, credit every
    /// teacher and remove the bought items from the buyer's cart.
    ///
    /// # Errors
    ///
    /// - [`InsufficientFunds`](crate::MarketError::InsufficientFunds) if the
    ///   balance does not cover the total
    /// - [`Conflict`](crate::MarketError::Conflict) if the beneficiary already
    ///   owns an item
    async fn purchase_with_wallet(&self, request: PurchaseRequest, now: DateTime<Utc>) -> Result<Order>;

    /// Store a pending gateway payment.
    async fn create_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment>;

    /// Remember the gateway session created for a pending payment.
    async fn attach_checkout_session(
        &self,
        id: PaymentId,
        gateway_reference: &str,
        checkout_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Payment>;

    /// Load a payment.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// A user's payments, newest first.
    async fn list_payments(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>>;

    /// Apply a captured payment.
    ///
    /// In one transaction: lock the payment, mark it succeeded, credit the
    /// payer's wallet, and for checkout payments turn the snapshot into an
    /// order (skipping items the beneficiary already owns). Replayed events
    /// and already-succeeded payments return
    /// [`FulfillmentOutcome::AlreadyProcessed`].
    ///
    /// # Errors
    ///
    /// - [`NotFound`](crate::MarketError::NotFound) for an unknown payment
    /// - [`Validation`](crate::MarketError::Validation) if the captured
    ///   amount differs from the payment amount
    /// - [`InvalidTransition`](crate::MarketError::InvalidTransition) if the
    ///   payment already failed
    async fn confirm_payment(&self, confirmation: PaymentConfirmation, now: DateTime<Utc>) -> Result<FulfillmentOutcome>;

    /// Mark a pending payment failed. Already-final payments are returned
    /// unchanged.
    async fn fail_payment(&self, id: PaymentId, event_id: &str, reason: &str, now: DateTime<Utc>) -> Result<Payment>;

    /// Load an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders paid by `buyer_id`, newest first.
    async fn list_orders(&self, buyer_id: UserId, page: PageRequest) -> Result<Page<Order>>;

    /// Items the user is enrolled in, most recent first.
    async fn library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>>;

    /// Balance and a page of ledger entries, newest first.
    async fn wallet(&self, user_id: UserId, page: PageRequest) -> Result<WalletView>;

    /// Hold `amount` from a teacher's wallet and create a pending
    /// withdrawal, in one transaction.
    ///
    /// # Errors
    ///
    /// [`InsufficientFunds`](crate::MarketError::InsufficientFunds) if the
    /// balance is lower than `amount`.
    async fn request_withdrawal(&self, teacher_id: UserId, amount: Money, now: DateTime<Utc>) -> Result<Withdrawal>;

    /// Load a withdrawal.
    async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>>;

    /// Withdrawals, newest first, optionally for one teacher and status.
    async fn list_withdrawals(
        &self,
        teacher_id: Option<UserId>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> Result<Page<Withdrawal>>;

    /// Mark a pending withdrawal paid.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`](crate::MarketError::InvalidTransition) unless it
    /// is pending.
    async fn approve_withdrawal(&self, id: WithdrawalId, admin_id: UserId, now: DateTime<Utc>) -> Result<Withdrawal>;

    /// Reject a pending withdrawal and return the held funds, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// [`InvalidTransition`](crate::MarketError::InvalidTransition) unless it
    /// is pending.
    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal>;
}

/// Reviews, comments and quiz attempts.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Create or replace the user's review of an item.
    async fn upsert_review(
        &self,
        content_id: ContentId,
        user_id: UserId,
        rating: u8,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Review>;

    /// Load a review.
    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>>;

    /// Delete a review.
    async fn delete_review(&self, id: ReviewId) -> Result<()>;

    /// Reviews of an item, newest first.
    async fn list_reviews(&self, content_id: ContentId, page: PageRequest) -> Result<Page<Review>>;

    /// Rating summary of an item.
    async fn rating_summary(&self, content_id: ContentId) -> Result<RatingSummary>;

    /// Post a comment or reply.
    async fn add_comment(
        &self,
        content_id: ContentId,
        user_id: UserId,
        parent_id: Option<CommentId>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment>;

    /// Load a comment.
    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>>;

    /// Delete a comment together with all its replies.
    async fn delete_comment(&self, id: CommentId) -> Result<()>;

    /// Every comment on an item, flat.
    async fn comments(&self, content_id: ContentId) -> Result<Vec<Comment>>;

    /// Store a graded attempt.
    async fn record_attempt(&self, attempt: QuizAttempt) -> Result<QuizAttempt>;

    /// A user's attempts, newest first, optionally for one quiz.
    async fn attempts(&self, user_id: UserId, quiz_id: Option<ContentId>) -> Result<Vec<QuizAttempt>>;
}

/// Admin reporting aggregates.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Headline numbers for the dashboard.
    async fn dashboard(&self) -> Result<DashboardSummary>;

    /// Revenue for the last `months` calendar months including the current
    /// one, oldest first. Months without orders are omitted.
    async fn revenue_by_month(&self, months: u32, now: DateTime<Utc>) -> Result<Vec<RevenueBucket>>;

    /// Best-selling items by revenue.
    async fn top_content(&self, limit: u32) -> Result<Vec<TopContent>>;

    /// Teachers by total earnings.
    async fn top_teachers(&self, limit: u32) -> Result<Vec<TopTeacher>>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<()>;
}
