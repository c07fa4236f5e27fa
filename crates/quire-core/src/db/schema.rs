//! Canonical SQLite schema for the comment store.
//!
//! - `posts` is the post directory the comment subsystem resolves against
//! - `comments` holds every comment in every state; `parent_id` is a plain
//!   column with no foreign key, so reply cascades are performed explicitly
//!   by the moderation layer and orphaned rows can exist in storage
//! - `store_meta` tracks the schema version alongside `PRAGMA user_version`

/// Migration v1: posts, comments, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS posts (
    post_id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE CHECK (length(trim(slug)) > 0),
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (post_id LIKE 'p-%')
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    parent_id INTEGER,
    author_name TEXT NOT NULL CHECK (length(trim(author_name)) > 0),
    author_email TEXT,
    author_url TEXT,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    state TEXT NOT NULL CHECK (state IN ('pending', 'approved', 'spam', 'deleted')),
    submitter TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> comment_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
";

/// Migration v2: read-path and moderation-queue indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_comments_post_state_created
    ON comments(post_id, state, created_at_us, comment_id);

CREATE INDEX IF NOT EXISTS idx_comments_parent
    ON comments(parent_id);

CREATE INDEX IF NOT EXISTS idx_comments_state_created
    ON comments(state, created_at_us, comment_id);

CREATE INDEX IF NOT EXISTS idx_posts_status
    ON posts(status, created_at_us DESC);
";

/// Indexes expected by the read, cascade, and queue paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_comments_post_state_created",
    "idx_comments_parent",
    "idx_comments_state_created",
    "idx_posts_status",
];
