use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

/// Opaque post identifier (`p-` followed by 12 lowercase hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub const PREFIX: &'static str = "p-";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive a fresh id from the slug and the creation instant.
    #[must_use]
    pub fn derive(slug: &str, created_at: DateTime<Utc>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(slug.as_bytes());
        hasher.update(&created_at.timestamp_micros().to_le_bytes());
        let hex = hasher.finalize().to_hex();
        Self(format!("{}{}", Self::PREFIX, &hex.as_str()[..12]))
    }

    /// Whether `raw` has the shape of a post id rather than a slug.
    #[must_use]
    pub fn looks_like_id(raw: &str) -> bool {
        raw.strip_prefix(Self::PREFIX).is_some_and(|rest| {
            rest.len() == 12 && rest.chars().all(|c| c.is_ascii_hexdigit())
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publication status. Gates whether a post's comments are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Comments of drafts are invisible to the public.
    #[must_use]
    pub const fn is_public(self) -> bool {
        !matches!(self, Self::Draft)
    }

    /// Only published posts take new comments.
    #[must_use]
    pub const fn accepts_comments(self) -> bool {
        matches!(self, Self::Published)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(ParseEnumError {
                expected: "post status (draft, published, archived)",
                got: other.to_string(),
            }),
        }
    }
}

/// A post as seen by the comment subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
