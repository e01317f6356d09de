//! Who may see and change what.

use crate::model::{Content, User};
use crate::types::{Role, UserId};

/// The authenticated caller, or nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Unauthenticated request
    Anonymous,
    /// Logged-in account
    User {
        /// Account id
        id: UserId,
        /// Account role
        role: Role,
    },
}

impl Viewer {
    /// Viewer for a loaded account.
    #[must_use]
    pub const fn of(user: &User) -> Self {
        Self::User {
            id: user.id,
            role: user.role,
        }
    }

    /// Account id, if logged in.
    #[must_use]
    pub const fn id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User { id, .. } => Some(*id),
        }
    }

    /// Returns `true` for admins.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::User { role: Role::Admin, .. })
    }
}

/// Returns `true` if `viewer` may edit, publish or archive `content`.
#[must_use]
pub fn can_manage(viewer: Viewer, content: &Content) -> bool {
    match viewer {
        Viewer::Anonymous => false,
        Viewer::User { id, role } => role == Role::Admin || id == content.teacher_id,
    }
}

/// Returns `true` if `viewer` may see `content` at all.
///
/// Published items are public; drafts and archived items are only visible
/// to their managers and to users who already own them.
#[must_use]
pub fn can_view(viewer: Viewer, content: &Content, owns_content_or_parent: bool) -> bool {
    content.is_published() || can_manage(viewer, content) || owns_content_or_parent
}

/// Returns `true` if `viewer` may read protected material (quiz questions,
/// comments, attempts).
///
/// `owns_content_or_parent` is whether the viewer is enrolled in the item
/// itself or in the course that contains it. Free published items are open
/// to every logged-in user.
#[must_use]
pub fn can_access(viewer: Viewer, content: &Content, owns_content_or_parent: bool) -> bool {
    match viewer {
        Viewer::Anonymous => false,
        Viewer::User { .. } => {
            can_manage(viewer, content)
                || owns_content_or_parent
                || (content.is_published() && content.price.is_zero())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentId, ContentKind, ContentStatus, Money};

    fn content(teacher_id: UserId, price: u64, status: ContentStatus) -> Content {
        Content {
            id: ContentId::new(),
            teacher_id,
            kind: ContentKind::Quiz,
            title: "Week 1 quiz".into(),
            description: "Warm-up".into(),
            subject: "physics".into(),
            price: Money::from_cents(price),
            status,
            parent_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn user(role: Role) -> Viewer {
        Viewer::User { id: UserId::new(), role }
    }

    #[test]
    fn test_owner_and_admin_manage() {
        let teacher = UserId::new();
        let item = content(teacher, 500, ContentStatus::Draft);
        assert!(can_manage(Viewer::User { id: teacher, role: Role::Teacher }, &item));
        assert!(can_manage(user(Role::Admin), &item));
        assert!(!can_manage(user(Role::Teacher), &item));
        assert!(!can_manage(Viewer::Anonymous, &item));
    }

    #[test]
    fn test_paid_material_requires_enrollment() {
        let item = content(UserId::new(), 500, ContentStatus::Published);
        let student = user(Role::Student);
        assert!(!can_access(student, &item, false));
        assert!(can_access(student, &item, true));
        assert!(!can_access(Viewer::Anonymous, &item, true));
    }

    #[test]
    fn test_free_published_material_is_open() {
        let item = content(UserId::new(), 0, ContentStatus::Published);
        assert!(can_access(user(Role::Student), &item, false));
        let draft = content(UserId::new(), 0, ContentStatus::Draft);
        assert!(!can_access(user(Role::Student), &draft, false));
    }

    #[test]
    fn test_drafts_hidden_from_strangers() {
        let item = content(UserId::new(), 500, ContentStatus::Draft);
        assert!(!can_view(user(Role::Student), &item, false));
        assert!(can_view(user(Role::Admin), &item, false));
        let archived = content(UserId::new(), 500, ContentStatus::Archived);
        assert!(can_view(user(Role::Student), &archived, true));
    }
}
