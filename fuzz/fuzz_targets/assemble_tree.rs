#![no_main]

use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use quire_core::model::comment::{Comment, CommentId, CommentState};
use quire_core::model::post::PostId;
use quire_core::tree::assemble;

// Each byte pair is (id, parent); parent 0 means a root. Small id space so
// duplicates, cycles, and dangling parents all show up.
fuzz_target!(|data: &[u8]| {
    let comments: Vec<Comment> = data
        .chunks_exact(2)
        .map(|pair| Comment {
            id: CommentId(i64::from(pair[0] % 64)),
            post_id: PostId::new("p-000000000001"),
            parent_id: (pair[1] != 0).then(|| CommentId(i64::from(pair[1] % 64))),
            author_name: "fuzz".to_string(),
            author_email: None,
            author_url: None,
            content: "x".to_string(),
            state: CommentState::Approved,
            submitter: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        })
        .collect();

    let forest = assemble(&comments);
    assert_eq!(forest.len() + forest.orphans.len(), comments.len());

    let clamped = forest.clamp_depth(3);
    assert!(clamped.max_depth() <= 3);
});
