//! Identifiers and enumerations shared by every marketplace module.
//!
//! Enumerations serialize as `snake_case` strings and round-trip through
//! [`as_str`](Role::as_str) / [`FromStr`] so the storage layer can keep them
//! in plain `TEXT` columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user account
    UserId
);
define_id!(
    /// Unique identifier for a catalog item (course, book, lecture or quiz)
    ContentId
);
define_id!(
    /// Unique identifier for a quiz question
    QuestionId
);
define_id!(
    /// Unique identifier for a completed order
    OrderId
);
define_id!(
    /// Unique identifier for a gateway payment
    PaymentId
);
define_id!(
    /// Unique identifier for a teacher withdrawal request
    WithdrawalId
);
define_id!(
    /// Unique identifier for a review
    ReviewId
);
define_id!(
    /// Unique identifier for a comment
    CommentId
);
define_id!(
    /// Unique identifier for a guardian/student link
    GuardianLinkId
);
define_id!(
    /// Unique identifier for a quiz attempt
    AttemptId
);

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when a stored enumeration value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    /// Enumeration name
    pub kind: &'static str,
    /// Rejected value
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Storage representation
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    /// Account role
    Role {
        /// Buys and consumes content
        Student => "student",
        /// Publishes content and receives earnings
        Teacher => "teacher",
        /// Buys content on behalf of linked students
        Guardian => "guardian",
        /// Platform operator
        Admin => "admin",
    }
);

impl Role {
    /// Roles that may be chosen at signup.
    #[must_use]
    pub const fn is_self_service(&self) -> bool {
        !matches!(self, Self::Admin)
    }
}

text_enum!(
    /// Kind of catalog item
    ContentKind {
        /// Container of lectures and quizzes
        Course => "course",
        /// Standalone book
        Book => "book",
        /// Single lecture, standalone or part of a course
        Lecture => "lecture",
        /// Graded quiz, standalone or part of a course
        Quiz => "quiz",
    }
);

impl ContentKind {
    /// Whether this kind may be nested under a course.
    #[must_use]
    pub const fn can_have_parent(&self) -> bool {
        matches!(self, Self::Lecture | Self::Quiz)
    }
}

text_enum!(
    /// Publication status of a catalog item
    ContentStatus {
        /// Only visible to its teacher and admins
        Draft => "draft",
        /// Listed and purchasable
        Published => "published",
        /// Hidden from the catalog; existing owners keep access
        Archived => "archived",
    }
);

impl ContentStatus {
    /// Returns `true` if a teacher may move content from `self` to `next`
    /// with an update. Deleting archives from any status.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Draft | Self::Archived, Self::Published) | (Self::Published, Self::Archived)
        )
    }
}

text_enum!(
    /// Lifecycle of a gateway payment
    PaymentStatus {
        /// Awaiting the gateway webhook
        Pending => "pending",
        /// Captured by the gateway and fulfilled
        Succeeded => "succeeded",
        /// Declined or abandoned
        Failed => "failed",
    }
);

impl PaymentStatus {
    /// Payments leave `Pending` exactly once.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

text_enum!(
    /// What a gateway payment pays for
    PaymentPurpose {
        /// Purchase of a cart snapshot
        Checkout => "checkout",
        /// Plain wallet top-up
        TopUp => "top_up",
    }
);

text_enum!(
    /// Lifecycle of a teacher withdrawal
    WithdrawalStatus {
        /// Awaiting admin review; funds are held
        Pending => "pending",
        /// Paid out by an admin
        Paid => "paid",
        /// Rejected; funds returned to the wallet
        Rejected => "rejected",
    }
);

text_enum!(
    /// Lifecycle of a guardian/student link
    GuardianLinkStatus {
        /// Awaiting the student's answer
        Pending => "pending",
        /// Guardian may buy for and monitor the student
        Accepted => "accepted",
        /// Refused by the student
        Declined => "declined",
    }
);

text_enum!(
    /// Kind of wallet ledger entry
    LedgerKind {
        /// Gateway payment credited to the wallet
        TopUp => "top_up",
        /// Order paid from the wallet
        Purchase => "purchase",
        /// Teacher share of a sale
        Earning => "earning",
        /// Funds held for a withdrawal
        Withdrawal => "withdrawal",
        /// Held funds returned after a rejected withdrawal
        WithdrawalReversal => "withdrawal_reversal",
    }
);

impl LedgerKind {
    /// Returns `true` if the entry increases the wallet balance.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::TopUp | Self::Earning | Self::WithdrawalReversal)
    }
}
