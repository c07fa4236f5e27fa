use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::comment::InvalidTransition;

/// Machine-readable error codes shared by the HTTP surface and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StoreUnavailable,
    ValidationFailed,
    PostNotFound,
    CommentNotFound,
    ParentNotFound,
    InvalidReference,
    InvalidStateTransition,
    CommentsClosed,
    Unauthorized,
    Forbidden,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StoreUnavailable => "E1002",
            Self::ValidationFailed => "E2001",
            Self::PostNotFound => "E2002",
            Self::CommentNotFound => "E2003",
            Self::ParentNotFound => "E2004",
            Self::InvalidReference => "E2005",
            Self::InvalidStateTransition => "E2006",
            Self::CommentsClosed => "E2007",
            Self::Unauthorized => "E4001",
            Self::Forbidden => "E4003",
            Self::StorageFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnavailable => "Comment store unavailable",
            Self::ValidationFailed => "Invalid comment input",
            Self::PostNotFound => "Post not found",
            Self::CommentNotFound => "Comment not found",
            Self::ParentNotFound => "Parent comment not found",
            Self::InvalidReference => "Invalid parent reference",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::CommentsClosed => "Comments are closed",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "Moderator role required",
            Self::StorageFailure => "Storage failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the quire config file and retry."),
            Self::StoreUnavailable => Some("Run `quire init` to create the comment store."),
            Self::ValidationFailed => Some("Correct the listed fields and resubmit."),
            Self::PostNotFound => Some("Use a post id (p-...) or the post's slug."),
            Self::CommentNotFound | Self::ParentNotFound => None,
            Self::InvalidReference => {
                Some("Reply only to visible comments that belong to the same post.")
            }
            Self::InvalidStateTransition => {
                Some("Valid moves: pending -> approved, pending/approved -> spam, any -> deleted.")
            }
            Self::CommentsClosed => Some("Archived posts no longer accept comments."),
            Self::Unauthorized => Some("Send `Authorization: Bearer <token>`."),
            Self::Forbidden => Some("Use a token configured with `moderator = true`."),
            Self::StorageFailure => Some("Check that the store path is writable and retry."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One offending input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Post,
    Comment,
    ParentComment,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::ParentComment => "parent comment",
        })
    }
}

/// Domain errors surfaced by every core operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{what} not found: '{reference}'")]
    NotFound { what: Resource, reference: String },

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("comments are closed on post '{0}'")]
    CommentsClosed(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("account '{0}' is not a moderator")]
    Forbidden(String),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(what: Resource, reference: impl fmt::Display) -> Self {
        Self::NotFound {
            what,
            reference: reference.to_string(),
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, reason)])
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::NotFound { what, .. } => match what {
                Resource::Post => ErrorCode::PostNotFound,
                Resource::Comment => ErrorCode::CommentNotFound,
                Resource::ParentComment => ErrorCode::ParentNotFound,
            },
            Self::InvalidReference(_) => ErrorCode::InvalidReference,
            Self::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            Self::CommentsClosed(_) => ErrorCode::CommentsClosed,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Offending fields, when this is a validation failure.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        match self {
            Self::Validation(fields) => fields,
            _ => &[],
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
