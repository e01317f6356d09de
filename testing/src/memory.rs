//! In-memory marketplace for fast, deterministic tests.
//!
//! [`InMemoryMarketplace`] implements every repository trait over one
//! mutex-guarded [`State`]. Writes go through [`InMemoryMarketplace::transaction`],
//! which works on a copy of the state and swaps it in only when the whole
//! workflow succeeded, so a failed purchase or payment leaves nothing
//! behind, the same as a rolled-back database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::model::{
    CartLine, Comment, Content, ContentFilter, ContentListing, ContentPatch, DashboardSummary, FulfillmentOutcome,
    GuardianLink, KindCount, LedgerEntry, LibraryEntry, NewContent, NewPayment, NewQuestion, NewUser, Order,
    OrderItem, Payment, PaymentConfirmation, ProfilePatch, PurchaseRequest, QuizAttempt, QuizQuestion, RatingSummary,
    Review, RevenueBucket, RoleCount, TopContent, TopTeacher, User, UserFilter, WalletView, Withdrawal,
};
use edumarket_core::pricing::{order_items, total_of};
use edumarket_core::repository::{
    CartRepository, CatalogRepository, CommerceRepository, EngagementRepository, ReportRepository, UserRepository,
};
use edumarket_core::{
    CommentId, ContentId, ContentKind, ContentStatus, GuardianLinkId, GuardianLinkStatus, LedgerKind, MarketError,
    Money, OrderId, Page, PageRequest, PaymentId, PaymentPurpose, PaymentStatus, QuestionId, Result, ReviewId, Role,
    UserId, WithdrawalId, WithdrawalStatus,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct CartEntry {
    user_id: UserId,
    content_id: ContentId,
    added_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Enrollment {
    user_id: UserId,
    content_id: ContentId,
    order_id: OrderId,
    enrolled_at: DateTime<Utc>,
}

/// Everything the marketplace stores. Vectors keep insertion order, so
/// "newest first" listings walk them in reverse.
#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<User>,
    links: Vec<GuardianLink>,
    contents: Vec<Content>,
    questions: Vec<QuizQuestion>,
    attempts: Vec<QuizAttempt>,
    cart: Vec<CartEntry>,
    payments: Vec<Payment>,
    events: HashSet<String>,
    orders: Vec<Order>,
    enrollments: Vec<Enrollment>,
    ledger: Vec<LedgerEntry>,
    withdrawals: Vec<Withdrawal>,
    reviews: Vec<Review>,
    comments: Vec<Comment>,
    next_ledger_id: i64,
}

fn paged<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    Page::new(page.slice(items), items.len() as u64, page)
}

impl State {
    fn user(&self, id: UserId) -> Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| MarketError::not_found("User", id))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| MarketError::not_found("User", id))
    }

    fn user_name(&self, id: UserId) -> String {
        self.user(id).map(|u| u.name.clone()).unwrap_or_default()
    }

    fn content(&self, id: ContentId) -> Option<&Content> {
        self.contents.iter().find(|c| c.id == id)
    }

    fn content_mut(&mut self, id: ContentId) -> Result<&mut Content> {
        self.contents
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| MarketError::not_found("Content", id))
    }

    fn payment_index(&self, id: PaymentId) -> Result<usize> {
        self.payments
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| MarketError::not_found("Payment", id))
    }

    fn withdrawal_index(&self, id: WithdrawalId) -> Result<usize> {
        self.withdrawals
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| MarketError::not_found("Withdrawal", id))
    }

    fn owns(&self, user_id: UserId, content_id: ContentId) -> bool {
        let parent = self.content(content_id).and_then(|c| c.parent_id);
        self.enrollments
            .iter()
            .any(|e| e.user_id == user_id && (e.content_id == content_id || Some(e.content_id) == parent))
    }

    fn owned_among(&self, user_id: UserId, content_ids: &[ContentId]) -> Vec<ContentId> {
        let mut owned = Vec::new();
        for id in content_ids {
            if self.content(*id).is_some() && self.owns(user_id, *id) && !owned.contains(id) {
                owned.push(*id);
            }
        }
        owned
    }

    fn rating(&self, content_id: ContentId) -> RatingSummary {
        let ratings: Vec<u8> = self
            .reviews
            .iter()
            .filter(|r| r.content_id == content_id)
            .map(|r| r.rating)
            .collect();
        RatingSummary::from_ratings(&ratings)
    }

    /// Display fields are joined at read time, as the SQL backend does.
    fn link_view(&self, link: &GuardianLink) -> GuardianLink {
        GuardianLink {
            student_email: self.user(link.student_id).map(|u| u.email.clone()).unwrap_or_default(),
            guardian_name: self.user_name(link.guardian_id),
            ..link.clone()
        }
    }

    fn review_view(&self, review: &Review) -> Review {
        Review {
            author_name: self.user_name(review.user_id),
            ..review.clone()
        }
    }

    fn comment_view(&self, comment: &Comment) -> Comment {
        Comment {
            author_name: self.user_name(comment.user_id),
            ..comment.clone()
        }
    }

    /// Apply one ledger entry and return the new balance.
    fn post(
        &mut self,
        user_id: UserId,
        kind: LedgerKind,
        amount: Money,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Money> {
        let balance = {
            let user = self.user_mut(user_id)?;
            if amount.is_zero() {
                return Ok(user.balance);
            }
            let next = if kind.is_credit() {
                user.balance
                    .checked_add(amount)
                    .ok_or_else(|| MarketError::Internal("wallet balance overflow".into()))?
            } else {
                user.balance.checked_sub(amount).ok_or(MarketError::InsufficientFunds {
                    balance_cents: user.balance.cents(),
                    required_cents: amount.cents(),
                })?
            };
            user.balance = next;
            next
        };

        self.next_ledger_id += 1;
        self.ledger.push(LedgerEntry {
            id: self.next_ledger_id,
            user_id,
            kind,
            amount,
            balance_after: balance,
            reference: Some(reference.to_string()),
            created_at: now,
        });
        Ok(balance)
    }

    /// Debit, order, enrollments, teacher earnings and cart cleanup.
    fn fulfill(
        &mut self,
        buyer_id: UserId,
        beneficiary_id: UserId,
        items: Vec<OrderItem>,
        payment_id: Option<PaymentId>,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let total = total_of(items.iter().map(|i| i.price))?;
        let platform_fee = total_of(items.iter().map(|i| i.platform_fee))?;

        let balance = self.user(buyer_id)?.balance;
        if balance < total {
            return Err(MarketError::InsufficientFunds {
                balance_cents: balance.cents(),
                required_cents: total.cents(),
            });
        }
        self.user(beneficiary_id)?;

        let order_id = OrderId::new();
        let reference = order_id.to_string();
        self.post(buyer_id, LedgerKind::Purchase, total, &reference, now)?;

        let mut earnings: BTreeMap<UserId, Money> = BTreeMap::new();
        for item in &items {
            if self
                .enrollments
                .iter()
                .any(|e| e.user_id == beneficiary_id && e.content_id == item.content_id)
            {
                return Err(MarketError::conflict(format!("content {} is already owned", item.content_id)));
            }
            self.enrollments.push(Enrollment {
                user_id: beneficiary_id,
                content_id: item.content_id,
                order_id,
                enrolled_at: now,
            });
            let earned = earnings.entry(item.teacher_id).or_default();
            *earned = total_of([*earned, item.teacher_share])?;
        }
        for (teacher_id, share) in &earnings {
            self.post(*teacher_id, LedgerKind::Earning, *share, &reference, now)?;
        }

        let bought: HashSet<ContentId> = items.iter().map(|i| i.content_id).collect();
        self.cart
            .retain(|c| !(c.user_id == buyer_id && bought.contains(&c.content_id)));

        let order = Order {
            id: order_id,
            buyer_id,
            beneficiary_id,
            total,
            platform_fee,
            payment_id,
            items,
            created_at: now,
        };
        self.orders.push(order.clone());

        tracing::info!(
            order_id = %order_id,
            buyer_id = %buyer_id,
            beneficiary_id = %beneficiary_id,
            total_cents = total.cents(),
            platform_fee_cents = platform_fee.cents(),
            "Order fulfilled"
        );
        Ok(order)
    }

    fn decide_withdrawal(
        &mut self,
        id: WithdrawalId,
        next: WithdrawalStatus,
        admin_id: UserId,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        let idx = self.withdrawal_index(id)?;
        let current = self.withdrawals[idx].clone();
        if current.status != WithdrawalStatus::Pending {
            return Err(MarketError::InvalidTransition {
                entity: "Withdrawal",
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == WithdrawalStatus::Rejected {
            self.post(
                current.teacher_id,
                LedgerKind::WithdrawalReversal,
                current.amount,
                &id.to_string(),
                now,
            )?;
        }
        let withdrawal = &mut self.withdrawals[idx];
        withdrawal.status = next;
        withdrawal.processed_by = Some(admin_id);
        withdrawal.note = note.map(ToString::to_string);
        withdrawal.processed_at = Some(now);
        Ok(withdrawal.clone())
    }
}

/// All six repositories backed by process memory.
///
/// Cloning shares the same state.
///
/// # Example
///
/// ```
/// use edumarket_core::model::NewUser;
/// use edumarket_core::repository::UserRepository;
/// use edumarket_core::Role;
/// use edumarket_testing::InMemoryMarketplace;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryMarketplace::new();
/// let user = store
///     .create_user(
///         NewUser { email: "ada@example.com".into(), name: "Ada".into(), role: Role::Student },
///         chrono::Utc::now(),
///     )
///     .await
///     .unwrap();
/// assert_eq!(store.find_user_by_email("ada@example.com").await.unwrap(), Some(user));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplace {
    state: Arc<Mutex<State>>,
}

impl InMemoryMarketplace {
    /// Create an empty marketplace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MarketError::Internal("in-memory marketplace lock poisoned".into()))
    }

    fn read<T>(&self, query: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let state = self.lock()?;
        query(&state)
    }

    /// Run `work` against a copy of the state; keep the copy only on success.
    fn transaction<T>(&self, work: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.lock()?;
        let mut draft = state.clone();
        let out = work(&mut draft)?;
        *state = draft;
        Ok(out)
    }

    /// Credit a wallet directly, recorded as a top-up.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] for an unknown user.
    pub fn fund_wallet(&self, user_id: UserId, amount: Money, now: DateTime<Utc>) -> Result<Money> {
        self.transaction(|s| s.post(user_id, LedgerKind::TopUp, amount, "seed", now))
    }

    /// Number of stored orders.
    ///
    /// # Errors
    ///
    /// [`MarketError::Internal`] if the state lock is poisoned.
    pub fn order_count(&self) -> Result<usize> {
        self.read(|s| Ok(s.orders.len()))
    }
}

#[async_trait]
impl UserRepository for InMemoryMarketplace {
    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        self.transaction(|s| {
            if s.users.iter().any(|u| u.email == user.email) {
                return Err(MarketError::conflict("email is already registered"));
            }
            let created = User {
                id: UserId::new(),
                email: user.email,
                name: user.name,
                role: user.role,
                bio: None,
                email_verified: false,
                is_active: true,
                balance: Money::ZERO,
                created_at: now,
            };
            s.users.push(created.clone());
            Ok(created)
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.read(|s| Ok(s.user(id).ok().cloned()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|s| Ok(s.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> Result<User> {
        self.transaction(|s| {
            let user = s.user_mut(id)?;
            if let Some(name) = patch.name {
                user.name = name;
            }
            if let Some(bio) = patch.bio {
                user.bio = if bio.is_empty() { None } else { Some(bio) };
            }
            Ok(user.clone())
        })
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<()> {
        self.transaction(|s| {
            if let Ok(user) = s.user_mut(id) {
                user.email_verified = true;
            }
            Ok(())
        })
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User> {
        self.transaction(|s| {
            let user = s.user_mut(id)?;
            user.is_active = active;
            Ok(user.clone())
        })
    }

    async fn list_users(&self, filter: UserFilter, page: PageRequest) -> Result<Page<User>> {
        self.read(|s| {
            let users: Vec<User> = s
                .users
                .iter()
                .rev()
                .filter(|u| filter.role.is_none_or(|r| r == u.role))
                .cloned()
                .collect();
            Ok(paged(&users, page))
        })
    }

    async fn ensure_admin(&self, email: &str, name: &str, now: DateTime<Utc>) -> Result<User> {
        self.transaction(|s| {
            if let Some(user) = s.users.iter_mut().find(|u| u.email == email) {
                user.role = Role::Admin;
                user.is_active = true;
                return Ok(user.clone());
            }
            let admin = User {
                id: UserId::new(),
                email: email.to_string(),
                name: name.to_string(),
                role: Role::Admin,
                bio: None,
                email_verified: true,
                is_active: true,
                balance: Money::ZERO,
                created_at: now,
            };
            s.users.push(admin.clone());
            Ok(admin)
        })
    }

    async fn create_link(&self, guardian_id: UserId, student_id: UserId, now: DateTime<Utc>) -> Result<GuardianLink> {
        self.transaction(|s| {
            s.user(guardian_id)?;
            s.user(student_id)?;
            let open = s.links.iter().any(|l| {
                l.guardian_id == guardian_id
                    && l.student_id == student_id
                    && matches!(l.status, GuardianLinkStatus::Pending | GuardianLinkStatus::Accepted)
            });
            if open {
                return Err(MarketError::conflict("a link to this student already exists"));
            }
            let link = GuardianLink {
                id: GuardianLinkId::new(),
                guardian_id,
                student_id,
                student_email: String::new(),
                guardian_name: String::new(),
                status: GuardianLinkStatus::Pending,
                created_at: now,
                responded_at: None,
            };
            s.links.push(link.clone());
            Ok(s.link_view(&link))
        })
    }

    async fn get_link(&self, id: GuardianLinkId) -> Result<Option<GuardianLink>> {
        self.read(|s| Ok(s.links.iter().find(|l| l.id == id).map(|l| s.link_view(l))))
    }

    async fn respond_link(&self, id: GuardianLinkId, accept: bool, now: DateTime<Utc>) -> Result<GuardianLink> {
        self.transaction(|s| {
            let link = s
                .links
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or_else(|| MarketError::not_found("GuardianLink", id))?;
            let next = if accept {
                GuardianLinkStatus::Accepted
            } else {
                GuardianLinkStatus::Declined
            };
            if link.status != GuardianLinkStatus::Pending {
                return Err(MarketError::InvalidTransition {
                    entity: "GuardianLink",
                    from: link.status.to_string(),
                    to: next.to_string(),
                });
            }
            link.status = next;
            link.responded_at = Some(now);
            let link = link.clone();
            Ok(s.link_view(&link))
        })
    }

    async fn links_for_guardian(&self, guardian_id: UserId) -> Result<Vec<GuardianLink>> {
        self.read(|s| {
            Ok(s.links
                .iter()
                .rev()
                .filter(|l| l.guardian_id == guardian_id)
                .map(|l| s.link_view(l))
                .collect())
        })
    }

    async fn links_for_student(&self, student_id: UserId) -> Result<Vec<GuardianLink>> {
        self.read(|s| {
            Ok(s.links
                .iter()
                .rev()
                .filter(|l| l.student_id == student_id)
                .map(|l| s.link_view(l))
                .collect())
        })
    }

    async fn is_guardian_of(&self, guardian_id: UserId, student_id: UserId) -> Result<bool> {
        self.read(|s| {
            Ok(s.links.iter().any(|l| {
                l.guardian_id == guardian_id && l.student_id == student_id && l.status == GuardianLinkStatus::Accepted
            }))
        })
    }

    async fn students_of(&self, guardian_id: UserId) -> Result<Vec<User>> {
        self.read(|s| {
            let mut students: Vec<User> = s
                .links
                .iter()
                .filter(|l| l.guardian_id == guardian_id && l.status == GuardianLinkStatus::Accepted)
                .filter_map(|l| s.user(l.student_id).ok())
                .filter(|u| u.role == Role::Student)
                .cloned()
                .collect();
            students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            Ok(students)
        })
    }
}

#[async_trait]
impl CatalogRepository for InMemoryMarketplace {
    async fn create_content(&self, teacher_id: UserId, content: NewContent, now: DateTime<Utc>) -> Result<Content> {
        self.transaction(|s| {
            let created = Content {
                id: ContentId::new(),
                teacher_id,
                kind: content.kind,
                title: content.title,
                description: content.description,
                subject: content.subject,
                price: Money::from_cents(content.price_cents),
                status: ContentStatus::Draft,
                parent_id: content.parent_id,
                created_at: now,
                updated_at: now,
            };
            s.contents.push(created.clone());
            Ok(created)
        })
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>> {
        self.read(|s| Ok(s.content(id).cloned()))
    }

    async fn update_content(&self, id: ContentId, patch: ContentPatch, now: DateTime<Utc>) -> Result<Content> {
        self.transaction(|s| {
            let content = s.content_mut(id)?;
            if let Some(title) = patch.title {
                content.title = title;
            }
            if let Some(description) = patch.description {
                content.description = description;
            }
            if let Some(subject) = patch.subject {
                content.subject = subject;
            }
            if let Some(price) = patch.price_cents {
                content.price = Money::from_cents(price);
            }
            if let Some(status) = patch.status {
                content.status = status;
            }
            content.updated_at = now;
            Ok(content.clone())
        })
    }

    async fn list_published(&self, filter: ContentFilter, page: PageRequest) -> Result<Page<ContentListing>> {
        self.read(|s| {
            let listings: Vec<ContentListing> = s
                .contents
                .iter()
                .rev()
                .filter(|c| filter.matches(c))
                .map(|c| ContentListing {
                    content: c.clone(),
                    rating: s.rating(c.id),
                })
                .collect();
            Ok(paged(&listings, page))
        })
    }

    async fn list_by_teacher(&self, teacher_id: UserId, page: PageRequest) -> Result<Page<Content>> {
        self.read(|s| {
            let items: Vec<Content> = s
                .contents
                .iter()
                .rev()
                .filter(|c| c.teacher_id == teacher_id)
                .cloned()
                .collect();
            Ok(paged(&items, page))
        })
    }

    async fn children(&self, parent_id: ContentId) -> Result<Vec<Content>> {
        self.read(|s| {
            Ok(s.contents
                .iter()
                .filter(|c| c.parent_id == Some(parent_id))
                .cloned()
                .collect())
        })
    }

    async fn add_question(&self, quiz_id: ContentId, question: NewQuestion) -> Result<QuizQuestion> {
        self.transaction(|s| {
            if s.content(quiz_id).is_none() {
                return Err(MarketError::not_found("Content", quiz_id));
            }
            let position = s
                .questions
                .iter()
                .filter(|q| q.quiz_id == quiz_id)
                .map(|q| q.position + 1)
                .max()
                .unwrap_or(0);
            let added = QuizQuestion {
                id: QuestionId::new(),
                quiz_id,
                prompt: question.prompt,
                options: question.options,
                correct_index: question.correct_index,
                position,
            };
            s.questions.push(added.clone());
            Ok(added)
        })
    }

    async fn questions(&self, quiz_id: ContentId) -> Result<Vec<QuizQuestion>> {
        self.read(|s| {
            let mut questions: Vec<QuizQuestion> =
                s.questions.iter().filter(|q| q.quiz_id == quiz_id).cloned().collect();
            questions.sort_by_key(|q| q.position);
            Ok(questions)
        })
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<QuizQuestion>> {
        self.read(|s| Ok(s.questions.iter().find(|q| q.id == id).cloned()))
    }

    async fn delete_question(&self, id: QuestionId) -> Result<()> {
        self.transaction(|s| {
            let before = s.questions.len();
            s.questions.retain(|q| q.id != id);
            if s.questions.len() == before {
                return Err(MarketError::not_found("Question", id));
            }
            Ok(())
        })
    }
}

#[async_trait]
impl CartRepository for InMemoryMarketplace {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        self.read(|s| {
            Ok(s.cart
                .iter()
                .filter(|c| c.user_id == user_id)
                .filter_map(|entry| {
                    s.content(entry.content_id).map(|c| CartLine {
                        content_id: c.id,
                        title: c.title.clone(),
                        kind: c.kind,
                        teacher_id: c.teacher_id,
                        price: c.price,
                        status: c.status,
                        added_at: entry.added_at,
                    })
                })
                .collect())
        })
    }

    async fn add_to_cart(&self, user_id: UserId, content_id: ContentId, now: DateTime<Utc>) -> Result<()> {
        self.transaction(|s| {
            if s.cart.iter().any(|c| c.user_id == user_id && c.content_id == content_id) {
                return Err(MarketError::conflict("item is already in the cart"));
            }
            s.cart.push(CartEntry {
                user_id,
                content_id,
                added_at: now,
            });
            Ok(())
        })
    }

    async fn remove_from_cart(&self, user_id: UserId, content_id: ContentId) -> Result<bool> {
        self.transaction(|s| {
            let before = s.cart.len();
            s.cart.retain(|c| !(c.user_id == user_id && c.content_id == content_id));
            Ok(s.cart.len() < before)
        })
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.transaction(|s| {
            s.cart.retain(|c| c.user_id != user_id);
            Ok(())
        })
    }
}

#[async_trait]
impl CommerceRepository for InMemoryMarketplace {
    async fn owns(&self, user_id: UserId, content_id: ContentId) -> Result<bool> {
        self.read(|s| Ok(s.owns(user_id, content_id)))
    }

    async fn owned_among(&self, user_id: UserId, content_ids: &[ContentId]) -> Result<Vec<ContentId>> {
        self.read(|s| Ok(s.owned_among(user_id, content_ids)))
    }

    async fn purchase_with_wallet(&self, request: PurchaseRequest, now: DateTime<Utc>) -> Result<Order> {
        if request.lines.is_empty() {
            return Err(MarketError::validation("nothing to purchase"));
        }
        self.transaction(|s| {
            let ids: Vec<ContentId> = request.lines.iter().map(|l| l.content_id).collect();
            if let Some(id) = s.owned_among(request.beneficiary_id, &ids).first() {
                return Err(MarketError::conflict(format!("content {id} is already owned")));
            }
            let items = order_items(&request.lines, request.commission_bps);
            s.fulfill(request.buyer_id, request.beneficiary_id, items, None, now)
        })
    }

    async fn create_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment> {
        self.transaction(|s| {
            let created = Payment {
                id: PaymentId::new(),
                user_id: payment.user_id,
                beneficiary_id: payment.beneficiary_id,
                purpose: payment.purpose,
                amount: payment.amount,
                status: PaymentStatus::Pending,
                lines: payment.lines,
                commission_bps: payment.commission_bps,
                gateway_reference: None,
                checkout_url: None,
                failure_reason: None,
                order_id: None,
                created_at: now,
                updated_at: now,
            };
            s.payments.push(created.clone());
            Ok(created)
        })
    }

    async fn attach_checkout_session(
        &self,
        id: PaymentId,
        gateway_reference: &str,
        checkout_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        self.transaction(|s| {
            let idx = s.payment_index(id)?;
            let payment = &mut s.payments[idx];
            payment.gateway_reference = Some(gateway_reference.to_string());
            payment.checkout_url = Some(checkout_url.to_string());
            payment.updated_at = now;
            Ok(payment.clone())
        })
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.read(|s| Ok(s.payments.iter().find(|p| p.id == id).cloned()))
    }

    async fn list_payments(&self, user_id: UserId, page: PageRequest) -> Result<Page<Payment>> {
        self.read(|s| {
            let payments: Vec<Payment> = s.payments.iter().rev().filter(|p| p.user_id == user_id).cloned().collect();
            Ok(paged(&payments, page))
        })
    }

    async fn confirm_payment(&self, confirmation: PaymentConfirmation, now: DateTime<Utc>) -> Result<FulfillmentOutcome> {
        self.transaction(|s| {
            let idx = s.payment_index(confirmation.payment_id)?;
            let payment = s.payments[idx].clone();

            let first_delivery = s.events.insert(confirmation.event_id.clone());
            if !first_delivery || payment.status == PaymentStatus::Succeeded {
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

            s.post(
                payment.user_id,
                LedgerKind::TopUp,
                payment.amount,
                &payment.id.to_string(),
                now,
            )?;

            let mut order = None;
            if payment.purpose == PaymentPurpose::Checkout {
                let ids: Vec<ContentId> = payment.lines.iter().map(|l| l.content_id).collect();
                let owned = s.owned_among(payment.beneficiary_id, &ids);
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
                    order = Some(s.fulfill(
                        payment.user_id,
                        payment.beneficiary_id,
                        items,
                        Some(payment.id),
                        now,
                    )?);
                }
            }

            let stored = &mut s.payments[idx];
            stored.status = PaymentStatus::Succeeded;
            stored.gateway_reference = Some(confirmation.gateway_reference.clone());
            stored.order_id = order.as_ref().map(|o| o.id);
            stored.updated_at = now;
            let payment = stored.clone();

            tracing::info!(payment_id = %payment.id, amount_cents = payment.amount.cents(), "Payment fulfilled");
            Ok(FulfillmentOutcome::Fulfilled { payment, order })
        })
    }

    async fn fail_payment(&self, id: PaymentId, event_id: &str, reason: &str, now: DateTime<Utc>) -> Result<Payment> {
        self.transaction(|s| {
            let idx = s.payment_index(id)?;
            let first_delivery = s.events.insert(event_id.to_string());
            let payment = &mut s.payments[idx];
            if !first_delivery || payment.status.is_final() {
                return Ok(payment.clone());
            }
            payment.status = PaymentStatus::Failed;
            payment.failure_reason = Some(reason.to_string());
            payment.updated_at = now;
            tracing::warn!(payment_id = %id, reason, "Payment failed");
            Ok(payment.clone())
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.read(|s| Ok(s.orders.iter().find(|o| o.id == id).cloned()))
    }

    async fn list_orders(&self, buyer_id: UserId, page: PageRequest) -> Result<Page<Order>> {
        self.read(|s| {
            let orders: Vec<Order> = s.orders.iter().rev().filter(|o| o.buyer_id == buyer_id).cloned().collect();
            Ok(paged(&orders, page))
        })
    }

    async fn library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>> {
        self.read(|s| {
            Ok(s.enrollments
                .iter()
                .rev()
                .filter(|e| e.user_id == user_id)
                .filter_map(|e| {
                    s.content(e.content_id).map(|c| LibraryEntry {
                        content: c.clone(),
                        order_id: e.order_id,
                        enrolled_at: e.enrolled_at,
                    })
                })
                .collect())
        })
    }

    async fn wallet(&self, user_id: UserId, page: PageRequest) -> Result<WalletView> {
        self.read(|s| {
            let balance = s.user(user_id)?.balance;
            let entries: Vec<LedgerEntry> = s.ledger.iter().rev().filter(|e| e.user_id == user_id).cloned().collect();
            Ok(WalletView {
                balance,
                entries: paged(&entries, page),
            })
        })
    }

    async fn request_withdrawal(&self, teacher_id: UserId, amount: Money, now: DateTime<Utc>) -> Result<Withdrawal> {
        self.transaction(|s| {
            let id = WithdrawalId::new();
            s.post(teacher_id, LedgerKind::Withdrawal, amount, &id.to_string(), now)?;
            let withdrawal = Withdrawal {
                id,
                teacher_id,
                amount,
                status: WithdrawalStatus::Pending,
                note: None,
                processed_by: None,
                created_at: now,
                processed_at: None,
            };
            s.withdrawals.push(withdrawal.clone());
            tracing::info!(withdrawal_id = %id, teacher_id = %teacher_id, amount_cents = amount.cents(), "Withdrawal requested");
            Ok(withdrawal)
        })
    }

    async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        self.read(|s| Ok(s.withdrawals.iter().find(|w| w.id == id).cloned()))
    }

    async fn list_withdrawals(
        &self,
        teacher_id: Option<UserId>,
        status: Option<WithdrawalStatus>,
        page: PageRequest,
    ) -> Result<Page<Withdrawal>> {
        self.read(|s| {
            let withdrawals: Vec<Withdrawal> = s
                .withdrawals
                .iter()
                .rev()
                .filter(|w| teacher_id.is_none_or(|t| t == w.teacher_id))
                .filter(|w| status.is_none_or(|st| st == w.status))
                .cloned()
                .collect();
            Ok(paged(&withdrawals, page))
        })
    }

    async fn approve_withdrawal(&self, id: WithdrawalId, admin_id: UserId, now: DateTime<Utc>) -> Result<Withdrawal> {
        self.transaction(|s| s.decide_withdrawal(id, WithdrawalStatus::Paid, admin_id, None, now))
    }

    async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        admin_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal> {
        self.transaction(|s| s.decide_withdrawal(id, WithdrawalStatus::Rejected, admin_id, Some(reason), now))
    }
}

#[async_trait]
impl EngagementRepository for InMemoryMarketplace {
    async fn upsert_review(
        &self,
        content_id: ContentId,
        user_id: UserId,
        rating: u8,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        self.transaction(|s| {
            let saved = if let Some(existing) = s
                .reviews
                .iter_mut()
                .find(|r| r.content_id == content_id && r.user_id == user_id)
            {
                existing.rating = rating;
                existing.body = body.to_string();
                existing.updated_at = now;
                existing.clone()
            } else {
                let review = Review {
                    id: ReviewId::new(),
                    content_id,
                    user_id,
                    author_name: String::new(),
                    rating,
                    body: body.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                s.reviews.push(review.clone());
                review
            };
            Ok(s.review_view(&saved))
        })
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>> {
        self.read(|s| Ok(s.reviews.iter().find(|r| r.id == id).map(|r| s.review_view(r))))
    }

    async fn delete_review(&self, id: ReviewId) -> Result<()> {
        self.transaction(|s| {
            let before = s.reviews.len();
            s.reviews.retain(|r| r.id != id);
            if s.reviews.len() == before {
                return Err(MarketError::not_found("Review", id));
            }
            Ok(())
        })
    }

    async fn list_reviews(&self, content_id: ContentId, page: PageRequest) -> Result<Page<Review>> {
        self.read(|s| {
            let mut reviews: Vec<Review> = s
                .reviews
                .iter()
                .rev()
                .filter(|r| r.content_id == content_id)
                .map(|r| s.review_view(r))
                .collect();
            reviews.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(paged(&reviews, page))
        })
    }

    async fn rating_summary(&self, content_id: ContentId) -> Result<RatingSummary> {
        self.read(|s| Ok(s.rating(content_id)))
    }

    async fn add_comment(
        &self,
        content_id: ContentId,
        user_id: UserId,
        parent_id: Option<CommentId>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        self.transaction(|s| {
            let comment = Comment {
                id: CommentId::new(),
                content_id,
                user_id,
                author_name: String::new(),
                parent_id,
                body: body.to_string(),
                created_at: now,
            };
            s.comments.push(comment.clone());
            Ok(s.comment_view(&comment))
        })
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        self.read(|s| Ok(s.comments.iter().find(|c| c.id == id).map(|c| s.comment_view(c))))
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        self.transaction(|s| {
            if !s.comments.iter().any(|c| c.id == id) {
                return Err(MarketError::not_found("Comment", id));
            }
            let mut doomed: HashSet<CommentId> = HashSet::from([id]);
            loop {
                let before = doomed.len();
                for comment in &s.comments {
                    if comment.parent_id.is_some_and(|p| doomed.contains(&p)) {
                        doomed.insert(comment.id);
                    }
                }
                if doomed.len() == before {
                    break;
                }
            }
            s.comments.retain(|c| !doomed.contains(&c.id));
            Ok(())
        })
    }

    async fn comments(&self, content_id: ContentId) -> Result<Vec<Comment>> {
        self.read(|s| {
            Ok(s.comments
                .iter()
                .filter(|c| c.content_id == content_id)
                .map(|c| s.comment_view(c))
                .collect())
        })
    }

    async fn record_attempt(&self, attempt: QuizAttempt) -> Result<QuizAttempt> {
        self.transaction(|s| {
            s.attempts.push(attempt.clone());
            Ok(attempt)
        })
    }

    async fn attempts(&self, user_id: UserId, quiz_id: Option<ContentId>) -> Result<Vec<QuizAttempt>> {
        self.read(|s| {
            Ok(s.attempts
                .iter()
                .rev()
                .filter(|a| a.user_id == user_id && quiz_id.is_none_or(|q| q == a.quiz_id))
                .cloned()
                .collect())
        })
    }
}

#[async_trait]
impl ReportRepository for InMemoryMarketplace {
    async fn dashboard(&self) -> Result<DashboardSummary> {
        self.read(|s| {
            let mut by_role: BTreeMap<&'static str, (Role, u64)> = BTreeMap::new();
            for user in &s.users {
                by_role.entry(user.role.as_str()).or_insert((user.role, 0)).1 += 1;
            }
            let mut by_kind: BTreeMap<&'static str, (ContentKind, u64)> = BTreeMap::new();
            for content in s.contents.iter().filter(|c| c.is_published()) {
                by_kind.entry(content.kind.as_str()).or_insert((content.kind, 0)).1 += 1;
            }
            let pending: Vec<&Withdrawal> =
                s.withdrawals.iter().filter(|w| w.status == WithdrawalStatus::Pending).collect();

            Ok(DashboardSummary {
                users_by_role: by_role
                    .into_values()
                    .map(|(role, count)| RoleCount { role, count })
                    .collect(),
                active_users: s.users.iter().filter(|u| u.is_active).count() as u64,
                published_by_kind: by_kind
                    .into_values()
                    .map(|(kind, count)| KindCount { kind, count })
                    .collect(),
                order_count: s.orders.len() as u64,
                gross_revenue: total_of(s.orders.iter().map(|o| o.total))?,
                platform_fees: total_of(s.orders.iter().map(|o| o.platform_fee))?,
                teacher_earnings: total_of(s.orders.iter().flat_map(|o| o.items.iter().map(|i| i.teacher_share)))?,
                pending_withdrawals: pending.len() as u64,
                pending_withdrawal_amount: total_of(pending.iter().map(|w| w.amount))?,
                wallet_liability: total_of(s.users.iter().map(|u| u.balance))?,
            })
        })
    }

    async fn revenue_by_month(&self, months: u32, now: DateTime<Utc>) -> Result<Vec<RevenueBucket>> {
        let since = RevenueBucket::window_start(now, months);
        self.read(|s| {
            let mut buckets: BTreeMap<DateTime<Utc>, RevenueBucket> = BTreeMap::new();
            for order in s.orders.iter().filter(|o| o.created_at >= since && o.created_at <= now) {
                let month = RevenueBucket::month_of(order.created_at);
                let bucket = buckets.entry(month).or_insert_with(|| RevenueBucket {
                    month,
                    order_count: 0,
                    gross_revenue: Money::ZERO,
                    platform_fees: Money::ZERO,
                });
                bucket.order_count += 1;
                bucket.gross_revenue = total_of([bucket.gross_revenue, order.total])?;
                bucket.platform_fees = total_of([bucket.platform_fees, order.platform_fee])?;
            }
            Ok(buckets.into_values().collect())
        })
    }

    async fn top_content(&self, limit: u32) -> Result<Vec<TopContent>> {
        self.read(|s| {
            let mut sales: HashMap<ContentId, (u64, Money)> = HashMap::new();
            for item in s.orders.iter().flat_map(|o| &o.items) {
                let entry = sales.entry(item.content_id).or_insert((0, Money::ZERO));
                entry.0 += 1;
                entry.1 = total_of([entry.1, item.price])?;
            }
            let mut rows: Vec<TopContent> = sales
                .into_iter()
                .filter_map(|(id, (count, revenue))| {
                    s.content(id).map(|c| TopContent {
                        content_id: id,
                        title: c.title.clone(),
                        kind: c.kind,
                        teacher_id: c.teacher_id,
                        sales: count,
                        revenue,
                    })
                })
                .collect();
            rows.sort_by(|a, b| {
                b.revenue
                    .cmp(&a.revenue)
                    .then(b.sales.cmp(&a.sales))
                    .then(a.title.cmp(&b.title))
            });
            rows.truncate(limit as usize);
            Ok(rows)
        })
    }

    async fn top_teachers(&self, limit: u32) -> Result<Vec<TopTeacher>> {
        self.read(|s| {
            let mut earnings: HashMap<UserId, (u64, Money)> = HashMap::new();
            for item in s.orders.iter().flat_map(|o| &o.items) {
                let entry = earnings.entry(item.teacher_id).or_insert((0, Money::ZERO));
                entry.0 += 1;
                entry.1 = total_of([entry.1, item.teacher_share])?;
            }
            let mut rows: Vec<TopTeacher> = earnings
                .into_iter()
                .filter_map(|(id, (count, earned))| {
                    s.user(id).ok().map(|u| TopTeacher {
                        teacher_id: id,
                        name: u.name.clone(),
                        sales: count,
                        earnings: earned,
                    })
                })
                .collect();
            rows.sort_by(|a, b| {
                b.earnings
                    .cmp(&a.earnings)
                    .then(b.sales.cmp(&a.sales))
                    .then(a.name.cmp(&b.name))
            });
            rows.truncate(limit as usize);
            Ok(rows)
        })
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::properties::{commission_bps, prices};
    use crate::test_clock;
    use edumarket_core::environment::Clock;
    use edumarket_core::model::CheckoutLine;
    use proptest::prelude::*;

    fn purchase(buyer: &User, course: &Content, bps: u32) -> PurchaseRequest {
        PurchaseRequest {
            buyer_id: buyer.id,
            beneficiary_id: buyer.id,
            lines: vec![CheckoutLine {
                content_id: course.id,
                teacher_id: course.teacher_id,
                price: course.price,
            }],
            commission_bps: bps,
        }
    }

    #[tokio::test]
    async fn test_failed_purchase_leaves_no_trace() {
        let store = InMemoryMarketplace::new();
        let now = test_clock().now();
        let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
        let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
        let course = fixtures::published_course(&store, &teacher, "Compilers", 4_900, now).await.unwrap();
        store.fund_wallet(student.id, Money::from_cents(1_000), now).unwrap();

        let result = store.purchase_with_wallet(purchase(&student, &course, 2_000), now).await;
        assert!(matches!(result, Err(MarketError::InsufficientFunds { balance_cents: 1_000, required_cents: 4_900 })));
        assert_eq!(store.order_count().unwrap(), 0);
        assert!(!store.owns(student.id, course.id).await.unwrap());
        assert_eq!(store.wallet(student.id, PageRequest::default()).await.unwrap().entries.total, 1);
    }

    #[tokio::test]
    async fn test_course_ownership_covers_children() {
        let store = InMemoryMarketplace::new();
        let now = test_clock().now();
        let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
        let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
        let course = fixtures::published_course(&store, &teacher, "Compilers", 4_900, now).await.unwrap();
        let lecture = store
            .create_content(
                teacher.id,
                NewContent {
                    kind: ContentKind::Lecture,
                    title: "Parsing".into(),
                    description: "LL and LR".into(),
                    subject: "cs".into(),
                    price_cents: 500,
                    parent_id: Some(course.id),
                },
                now,
            )
            .await
            .unwrap();
        store.fund_wallet(student.id, Money::from_cents(5_000), now).unwrap();
        store.purchase_with_wallet(purchase(&student, &course, 2_000), now).await.unwrap();

        assert!(store.owns(student.id, lecture.id).await.unwrap());
        assert_eq!(
            store.owned_among(student.id, &[lecture.id, ContentId::new()]).await.unwrap(),
            vec![lecture.id]
        );
    }

    #[tokio::test]
    async fn test_checkout_payment_skips_owned_lines() {
        let store = InMemoryMarketplace::new();
        let now = test_clock().now();
        let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
        let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
        let owned = fixtures::published_course(&store, &teacher, "Owned", 1_000, now).await.unwrap();
        let fresh = fixtures::published_course(&store, &teacher, "Fresh", 2_000, now).await.unwrap();
        store.fund_wallet(student.id, Money::from_cents(1_000), now).unwrap();
        store.purchase_with_wallet(purchase(&student, &owned, 2_000), now).await.unwrap();

        let lines = vec![
            CheckoutLine { content_id: owned.id, teacher_id: teacher.id, price: owned.price },
            CheckoutLine { content_id: fresh.id, teacher_id: teacher.id, price: fresh.price },
        ];
        let payment = store
            .create_payment(
                NewPayment {
                    user_id: student.id,
                    beneficiary_id: student.id,
                    purpose: PaymentPurpose::Checkout,
                    amount: Money::from_cents(3_000),
                    lines,
                    commission_bps: 2_000,
                },
                now,
            )
            .await
            .unwrap();
        let outcome = store
            .confirm_payment(
                PaymentConfirmation {
                    event_id: "evt_1".into(),
                    payment_id: payment.id,
                    gateway_reference: "ch_1".into(),
                    amount: Money::from_cents(3_000),
                },
                now,
            )
            .await
            .unwrap();

        let FulfillmentOutcome::Fulfilled { order: Some(order), .. } = outcome else {
            unreachable!("checkout with a fresh item should create an order");
        };
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].content_id, fresh.id);
        let wallet = store.wallet(student.id, PageRequest::default()).await.unwrap();
        assert_eq!(wallet.balance, Money::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_amount_mismatch_does_not_consume_event() {
        let store = InMemoryMarketplace::new();
        let now = test_clock().now();
        let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
        let payment = store
            .create_payment(
                NewPayment {
                    user_id: student.id,
                    beneficiary_id: student.id,
                    purpose: PaymentPurpose::TopUp,
                    amount: Money::from_cents(2_500),
                    lines: Vec::new(),
                    commission_bps: 2_000,
                },
                now,
            )
            .await
            .unwrap();
        let mut confirmation = PaymentConfirmation {
            event_id: "evt_9".into(),
            payment_id: payment.id,
            gateway_reference: "ch_9".into(),
            amount: Money::from_cents(2_400),
        };
        assert!(matches!(
            store.confirm_payment(confirmation.clone(), now).await,
            Err(MarketError::Validation(_))
        ));

        confirmation.amount = Money::from_cents(2_500);
        let outcome = store.confirm_payment(confirmation, now).await.unwrap();
        assert!(matches!(outcome, FulfillmentOutcome::Fulfilled { order: None, .. }));
    }

    #[tokio::test]
    async fn test_deleting_comment_removes_reply_chain() {
        let store = InMemoryMarketplace::new();
        let now = test_clock().now();
        let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
        let content = ContentId::new();
        let root = store.add_comment(content, student.id, None, "root", now).await.unwrap();
        let reply = store.add_comment(content, student.id, Some(root.id), "reply", now).await.unwrap();
        store.add_comment(content, student.id, Some(reply.id), "nested", now).await.unwrap();
        let other = store.add_comment(content, student.id, None, "other", now).await.unwrap();

        store.delete_comment(root.id).await.unwrap();
        let left: Vec<CommentId> = store.comments(content).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(left, vec![other.id]);
        assert_eq!(store.comments(content).await.unwrap()[0].author_name, "ada");
    }

    proptest! {
        #[test]
        fn prop_purchase_conserves_money(price in prices(), bps in commission_bps()) {
            tokio_test::block_on(async {
                let store = InMemoryMarketplace::new();
                let now = test_clock().now();
                let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
                let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
                let course = fixtures::published_course(&store, &teacher, "Course", price.cents(), now).await.unwrap();
                store.fund_wallet(student.id, price, now).unwrap();

                let order = store.purchase_with_wallet(purchase(&student, &course, bps), now).await.unwrap();
                let summary = store.dashboard().await.unwrap();

                assert_eq!(summary.gross_revenue, price);
                assert_eq!(
                    summary.wallet_liability.checked_add(order.platform_fee),
                    Some(price)
                );
            });
        }
    }
}
