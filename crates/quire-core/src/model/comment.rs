use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, post::PostId};
use crate::identity::{AccountId, Identity};

/// Server-assigned comment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Moderation lifecycle of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentState {
    Pending,
    Approved,
    Spam,
    Deleted,
}

/// Moderator-triggered actions. Initial states are assigned at submission
/// and are not actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationAction {
    Approve,
    MarkSpam,
    Trash,
}

/// Outcome of applying an action to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed(CommentState),
    Unchanged,
}

impl CommentState {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Spam, Self::Deleted];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Spam => "spam",
            Self::Deleted => "deleted",
        }
    }

    /// Initial state for a fresh submission: authenticated submitters skip
    /// the moderation queue.
    #[must_use]
    pub const fn initial_for(identity: &Identity) -> Self {
        if identity.is_authenticated() {
            Self::Approved
        } else {
            Self::Pending
        }
    }

    /// Apply a moderator action.
    ///
    /// Valid transitions:
    /// - `pending -> approved`
    /// - `pending | approved -> spam`
    /// - `pending | approved | spam -> deleted`
    ///
    /// Repeating the action that produced the current state is a no-op.
    /// Nothing ever moves back to `pending`, and `deleted` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the lifecycle forbids the move.
    pub const fn transition(self, action: ModerationAction) -> Result<Transition, InvalidTransition> {
        match (self, action) {
            (Self::Approved, ModerationAction::Approve)
            | (Self::Spam, ModerationAction::MarkSpam)
            | (Self::Deleted, ModerationAction::Trash) => Ok(Transition::Unchanged),
            (Self::Pending, ModerationAction::Approve) => Ok(Transition::Changed(Self::Approved)),
            (Self::Pending | Self::Approved, ModerationAction::MarkSpam) => {
                Ok(Transition::Changed(Self::Spam))
            }
            (Self::Pending | Self::Approved | Self::Spam, ModerationAction::Trash) => {
                Ok(Transition::Changed(Self::Deleted))
            }
            (Self::Spam, ModerationAction::Approve) => Err(InvalidTransition {
                from: self,
                action,
                reason: "spam is never re-approved",
            }),
            (Self::Deleted, _) => Err(InvalidTransition {
                from: self,
                action,
                reason: "deleted comments are terminal",
            }),
        }
    }

    /// Whether a new reply may hang under a comment in this state.
    #[must_use]
    pub const fn accepts_replies(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for CommentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "spam" => Ok(Self::Spam),
            "deleted" => Ok(Self::Deleted),
            other => Err(ParseEnumError {
                expected: "comment state (pending, approved, spam, deleted)",
                got: other.to_string(),
            }),
        }
    }
}

impl ModerationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::MarkSpam => "spam",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a moderation action is not allowed from a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: CommentState,
    pub action: ModerationAction,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} a {} comment: {}",
            self.action, self.from, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub content: String,
    pub state: CommentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Copy suitable for anonymous readers: contact email stays private.
    #[must_use]
    pub fn public_view(mut self) -> Self {
        self.author_email = None;
        self
    }
}

/// A validated comment ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub content: String,
    pub state: CommentState,
    pub submitter: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [ModerationAction; 3] = [
        ModerationAction::Approve,
        ModerationAction::MarkSpam,
        ModerationAction::Trash,
    ];

    #[test]
    fn approve_moves_pending_to_approved() {
        assert_eq!(
            CommentState::Pending.transition(ModerationAction::Approve),
            Ok(Transition::Changed(CommentState::Approved))
        );
    }

    #[test]
    fn repeated_actions_are_no_ops() {
        assert_eq!(
            CommentState::Approved.transition(ModerationAction::Approve),
            Ok(Transition::Unchanged)
        );
        assert_eq!(
            CommentState::Spam.transition(ModerationAction::MarkSpam),
            Ok(Transition::Unchanged)
        );
        assert_eq!(
            CommentState::Deleted.transition(ModerationAction::Trash),
            Ok(Transition::Unchanged)
        );
    }

    #[test]
    fn spam_reachable_from_live_states() {
        for from in [CommentState::Pending, CommentState::Approved] {
            assert_eq!(
                from.transition(ModerationAction::MarkSpam),
                Ok(Transition::Changed(CommentState::Spam))
            );
        }
    }

    #[test]
    fn spam_cannot_be_approved() {
        let err = CommentState::Spam
            .transition(ModerationAction::Approve)
            .expect_err("spam -> approved must be rejected");
        assert_eq!(err.from, CommentState::Spam);
        assert!(err.to_string().contains("cannot approve a spam comment"));
    }

    #[test]
    fn deleted_is_terminal() {
        assert!(CommentState::Deleted.transition(ModerationAction::Approve).is_err());
        assert!(CommentState::Deleted.transition(ModerationAction::MarkSpam).is_err());
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in CommentState::ALL {
            for action in ACTIONS {
                if let Ok(Transition::Changed(to)) = from.transition(action) {
                    assert_ne!(to, CommentState::Pending, "{from} --{action}--> pending");
                }
            }
        }
    }

    #[test]
    fn initial_state_follows_identity() {
        assert_eq!(
            CommentState::initial_for(&Identity::Anonymous),
            CommentState::Pending
        );
        let account = Identity::Account {
            account: AccountId::new("alice"),
            moderator: false,
        };
        assert_eq!(CommentState::initial_for(&account), CommentState::Approved);
    }

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!("Approved".parse::<CommentState>(), Ok(CommentState::Approved));
        assert!("rejected".parse::<CommentState>().is_err());
    }

    #[test]
    fn public_view_drops_email() {
        let comment = Comment {
            id: CommentId(1),
            post_id: PostId::new("p-000000000001"),
            parent_id: None,
            author_name: "Ann".to_string(),
            author_email: Some("ann@example.com".to_string()),
            author_url: Some("https://ann.example".to_string()),
            content: "hi".to_string(),
            state: CommentState::Approved,
            submitter: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let public = comment.public_view();
        assert!(public.author_email.is_none());
        assert_eq!(public.author_url.as_deref(), Some("https://ann.example"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn action() -> impl Strategy<Value = ModerationAction> {
            prop::sample::select(ACTIONS.to_vec())
        }

        proptest! {
            #[test]
            fn action_sequences_never_revive(actions in prop::collection::vec(action(), 0..32)) {
                let mut state = CommentState::Pending;
                let mut left_pending = false;
                for action in actions {
                    let before = state;
                    if let Ok(Transition::Changed(to)) = state.transition(action) {
                        state = to;
                        left_pending = true;
                    }
                    if before == CommentState::Deleted {
                        prop_assert_eq!(state, CommentState::Deleted);
                    }
                    if before == CommentState::Spam {
                        prop_assert_ne!(state, CommentState::Approved);
                    }
                    if left_pending {
                        prop_assert_ne!(state, CommentState::Pending);
                    }
                }
            }
        }
    }
}
