//! End-to-end comment lifecycle against an on-disk store: submit, read,
//! moderate, and cascade.

use chrono::{DateTime, Utc};
use quire_core::db;
use quire_core::error::{Error, ErrorCode};
use quire_core::identity::{AccountId, Identity, Moderator};
use quire_core::model::comment::{CommentId, CommentState};
use quire_core::model::post::{Post, PostStatus};
use quire_core::moderation;
use quire_core::posts;
use quire_core::read::read_comments;
use quire_core::submit::{SubmitRequest, submit};
use rusqlite::{Connection, params};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
}

fn store() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = db::open_store(&dir.path().join("quire.sqlite3")).expect("open store");
    (dir, conn)
}

fn publish(conn: &Connection, slug: &str) -> Post {
    posts::create_post(conn, slug, &format!("Post {slug}"), PostStatus::Published, at(0))
        .expect("create post")
}

fn moderator() -> Moderator {
    Identity::operator()
        .require_moderator()
        .expect("operator is a moderator")
}

fn member(name: &str) -> Identity {
    Identity::Account {
        account: AccountId::new(name),
        moderator: false,
    }
}

fn request(post: &str, parent: Option<CommentId>, name: &str, content: &str) -> SubmitRequest {
    SubmitRequest {
        post: post.to_string(),
        parent_id: parent,
        author_name: name.to_string(),
        content: content.to_string(),
        ..SubmitRequest::default()
    }
}

fn visible_ids(conn: &Connection, post: &str) -> Vec<i64> {
    read_comments(conn, post)
        .expect("read comments")
        .flatten()
        .iter()
        .map(|(_, c)| c.id.0)
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn anonymous_comment_is_visible_only_after_approval() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");

    let pending = submit(
        &conn,
        &request("hello-world", None, "Anon", "First!"),
        &Identity::Anonymous,
        at(1),
    )
    .expect("submit");
    assert_eq!(pending.state, CommentState::Pending);
    assert!(pending.submitter.is_none());
    assert!(visible_ids(&conn, "hello-world").is_empty());

    moderation::approve(&conn, &moderator(), pending.id, at(2)).expect("approve");
    assert_eq!(visible_ids(&conn, "hello-world"), vec![pending.id.0]);
}

#[test]
fn authenticated_comment_is_visible_immediately() {
    let (_dir, conn) = store();
    let post = publish(&conn, "hello-world");

    let comment = submit(
        &conn,
        &request(post.id.as_str(), None, "Ann", "Nice post"),
        &member("ann"),
        at(1),
    )
    .expect("submit");
    assert_eq!(comment.state, CommentState::Approved);
    assert_eq!(comment.post_id, post.id, "slug or id always stores the opaque id");
    assert_eq!(comment.submitter.as_ref().map(AccountId::as_str), Some("ann"));
    assert_eq!(visible_ids(&conn, "hello-world"), vec![comment.id.0]);
}

#[test]
fn approving_twice_is_not_an_error() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");
    let c = submit(
        &conn,
        &request("hello-world", None, "Anon", "hi"),
        &Identity::Anonymous,
        at(1),
    )
    .expect("submit");

    let m = moderator();
    let first = moderation::approve(&conn, &m, c.id, at(2)).expect("approve");
    let second = moderation::approve(&conn, &m, c.id, at(3)).expect("approve again");
    assert_eq!(first.state, CommentState::Approved);
    assert_eq!(second.state, CommentState::Approved);
}

#[test]
fn dangling_parent_is_dropped_from_the_served_tree() {
    let (_dir, conn) = store();
    let post = publish(&conn, "hello-world");

    // Stored rows can carry a parent that never existed, e.g. after an
    // import; the schema does not forbid it.
    for (id, parent) in [(1_i64, None), (2, Some(1_i64)), (3, Some(99))] {
        conn.execute(
            "INSERT INTO comments (comment_id, post_id, parent_id, author_name, content, state,
                                   created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, 'Ann', 'text', 'approved', ?4, ?4)",
            params![id, post.id.as_str(), parent, id * 1_000],
        )
        .expect("seed comment");
    }

    let forest = read_comments(&conn, "hello-world").expect("read");
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(forest.roots[0].comment.id, CommentId(1));
    assert_eq!(forest.roots[0].replies.len(), 1);
    assert_eq!(forest.roots[0].replies[0].comment.id, CommentId(2));
    assert_eq!(forest.len(), 2);

    let orphans = moderation::orphans(&conn, &moderator(), "hello-world").expect("orphans");
    assert_eq!(
        orphans.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![CommentId(3)]
    );
}

#[test]
fn empty_author_name_is_rejected_before_post_lookup() {
    let (_dir, conn) = store();
    let err = submit(
        &conn,
        &request("no-such-post", None, "", "hi"),
        &Identity::Anonymous,
        at(1),
    )
    .expect_err("invalid");
    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert_eq!(
        err.fields().iter().map(|f| f.field).collect::<Vec<_>>(),
        vec!["author_name"]
    );
}

#[test]
fn reply_to_a_comment_on_another_post_is_rejected() {
    let (_dir, conn) = store();
    publish(&conn, "first");
    publish(&conn, "second");

    let elsewhere = submit(
        &conn,
        &request("first", None, "Ann", "on first"),
        &member("ann"),
        at(1),
    )
    .expect("submit");

    let err = submit(
        &conn,
        &request("second", Some(elsewhere.id), "Bob", "cross-post reply"),
        &member("bob"),
        at(2),
    )
    .expect_err("cross-post parent");
    assert!(matches!(err, Error::InvalidReference(_)), "got {err:?}");
    assert!(visible_ids(&conn, "second").is_empty());
}

#[test]
fn unknown_parent_is_not_found() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");
    let err = submit(
        &conn,
        &request("hello-world", Some(CommentId(404)), "Ann", "reply"),
        &member("ann"),
        at(1),
    )
    .expect_err("missing parent");
    assert_eq!(err.code(), ErrorCode::ParentNotFound);
}

#[test]
fn replies_to_spam_or_deleted_comments_are_rejected() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");
    let m = moderator();

    let spam = submit(
        &conn,
        &request("hello-world", None, "Spammer", "buy now"),
        &Identity::Anonymous,
        at(1),
    )
    .expect("submit");
    moderation::mark_spam(&conn, &m, spam.id, at(2)).expect("spam");

    let err = submit(
        &conn,
        &request("hello-world", Some(spam.id), "Ann", "reply"),
        &member("ann"),
        at(3),
    )
    .expect_err("spam parent");
    assert_eq!(err.code(), ErrorCode::InvalidReference);
}

#[test]
fn reply_waits_for_a_concurrent_parent_delete() {
    let (dir, conn) = store();
    publish(&conn, "hello-world");
    let parent = submit(
        &conn,
        &request("hello-world", None, "Ann", "parent"),
        &member("ann"),
        at(1),
    )
    .expect("submit parent");

    let holder = db::connect(&dir.path().join("quire.sqlite3")).expect("second connection");
    holder.execute_batch("BEGIN IMMEDIATE").expect("take write lock");
    holder
        .execute("DELETE FROM comments WHERE comment_id = ?1", params![parent.id.0])
        .expect("delete parent");
    let committer = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(150));
        holder.execute_batch("COMMIT").expect("commit delete");
    });

    let err = submit(
        &conn,
        &request("hello-world", Some(parent.id), "Bob", "reply"),
        &member("bob"),
        at(2),
    )
    .expect_err("parent deleted while the reply was pending");
    committer.join().expect("committer thread");

    assert_eq!(err.code(), ErrorCode::ParentNotFound);
    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .expect("count");
    assert_eq!(stored, 0, "no orphaned reply was written");
}

#[test]
fn deleting_a_comment_removes_all_descendants() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");
    let ann = member("ann");

    let root = submit(&conn, &request("hello-world", None, "Ann", "root"), &ann, at(1))
        .expect("root");
    let mut parent = root.id;
    for i in 0..5 {
        parent = submit(
            &conn,
            &request("hello-world", Some(parent), "Ann", &format!("reply {i}")),
            &ann,
            at(2 + i),
        )
        .expect("reply")
        .id;
    }
    let sibling = submit(
        &conn,
        &request("hello-world", Some(root.id), "Ann", "side branch"),
        &ann,
        at(10),
    )
    .expect("sibling");
    let other = submit(&conn, &request("hello-world", None, "Ann", "other"), &ann, at(11))
        .expect("other root");

    let before: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .expect("count");
    let report = moderation::delete(&conn, &moderator(), root.id).expect("delete");
    let after: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .expect("count");

    // 5 chained replies + 1 side branch = 6 descendants.
    assert_eq!(report.affected.len(), 7);
    assert_eq!(before - after, 7);
    assert!(report.affected.contains(&sibling.id));
    assert_eq!(visible_ids(&conn, "hello-world"), vec![other.id.0]);
}

#[test]
fn trash_hides_subtree_but_keeps_rows() {
    let (_dir, conn) = store();
    publish(&conn, "hello-world");
    let ann = member("ann");

    let root = submit(&conn, &request("hello-world", None, "Ann", "root"), &ann, at(1))
        .expect("root");
    let reply = submit(
        &conn,
        &request("hello-world", Some(root.id), "Ann", "reply"),
        &ann,
        at(2),
    )
    .expect("reply");

    let report = moderation::trash(&conn, &moderator(), root.id, at(3)).expect("trash");
    assert_eq!(report.affected, vec![root.id, reply.id]);
    assert!(visible_ids(&conn, "hello-world").is_empty());

    let deleted = moderation::queue(
        &conn,
        &moderator(),
        &moderation::QueueFilter {
            state: Some(CommentState::Deleted),
            ..moderation::QueueFilter::default()
        },
    )
    .expect("queue");
    assert_eq!(deleted.len(), 2);
    assert!(deleted.iter().all(|c| c.updated_at == at(3)));

    let err = moderation::approve(&conn, &moderator(), root.id, at(4)).expect_err("terminal");
    assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
}

#[test]
fn post_status_gates_submission_and_reads() {
    let (_dir, conn) = store();
    posts::create_post(&conn, "wip", "WIP", PostStatus::Draft, at(0)).expect("draft");
    publish(&conn, "old");
    posts::set_post_status(&conn, "old", PostStatus::Archived, at(1)).expect("archive");

    let draft_submit = submit(
        &conn,
        &request("wip", None, "Ann", "early"),
        &member("ann"),
        at(2),
    )
    .expect_err("draft hidden");
    assert_eq!(draft_submit.code(), ErrorCode::PostNotFound);
    assert_eq!(
        read_comments(&conn, "wip").expect_err("draft hidden").code(),
        ErrorCode::PostNotFound
    );

    let closed = submit(
        &conn,
        &request("old", None, "Ann", "late"),
        &member("ann"),
        at(3),
    )
    .expect_err("closed");
    assert_eq!(closed.code(), ErrorCode::CommentsClosed);
    assert!(read_comments(&conn, "old").expect("archived readable").is_empty());
}

#[test]
fn store_reopens_with_data_intact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("quire.sqlite3");
    {
        let conn = db::open_store(&path).expect("open store");
        publish(&conn, "hello-world");
        submit(
            &conn,
            &request("hello-world", None, "Ann", "persisted"),
            &member("ann"),
            at(1),
        )
        .expect("submit");
    }

    let conn = db::connect(&path).expect("reconnect");
    assert_eq!(visible_ids(&conn, "hello-world").len(), 1);
}
