//! `quire moderate`: queue review and state changes.
//!
//! Every subcommand requires a moderator identity. Without `--as` that is
//! the local operator.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use quire_core::identity::Moderator;
use quire_core::model::comment::{Comment, CommentId, CommentState};
use quire_core::moderation::{self, CascadeReport, QueueFilter};
use std::io::Write;

use super::local_time;
use crate::context::AppContext;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum ModerateCommand {
    #[command(
        about = "List comments awaiting moderation",
        after_help = "EXAMPLES:\n    # Pending comments, oldest first\n    quire moderate queue\n\n    # Spam on one post\n    quire moderate queue --state spam --post hello-world"
    )]
    Queue {
        /// State to list: pending, approved, spam, deleted.
        #[arg(long, default_value = "pending")]
        state: CommentState,

        /// Restrict to one post (id or slug).
        #[arg(long)]
        post: Option<String>,

        /// Page size (1-500).
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,
    },

    #[command(about = "Approve a comment")]
    Approve { id: CommentId },

    #[command(about = "Mark a comment as spam")]
    Spam { id: CommentId },

    #[command(about = "Soft-delete a comment and all of its replies")]
    Trash { id: CommentId },

    #[command(
        about = "Permanently remove a comment and all of its replies",
        after_help = "Use `trash` to hide a thread while keeping it recoverable from the store."
    )]
    Delete { id: CommentId },

    #[command(about = "List approved comments that cannot be placed in their post's tree")]
    Orphans {
        /// Post id or slug.
        post: String,
    },
}

/// Execute a `quire moderate` subcommand.
///
/// # Errors
///
/// Returns an error if the acting identity is not a moderator, the comment
/// or post does not exist, the transition is not allowed, or the store is
/// unavailable.
pub fn run_moderate(command: &ModerateCommand, ctx: &AppContext) -> Result<()> {
    let moderator = ctx.actor()?.require_moderator()?;
    let conn = ctx.connect()?;
    let now = Utc::now();

    match command {
        ModerateCommand::Queue {
            state,
            post,
            limit,
            offset,
        } => {
            let filter = QueueFilter {
                state: Some(*state),
                post: post.clone(),
                limit: *limit,
                offset: *offset,
            };
            let comments = moderation::queue(&conn, &moderator, &filter)?;
            render_list(ctx, &format!("{state} comments"), &comments)
        }
        ModerateCommand::Orphans { post } => {
            let comments = moderation::orphans(&conn, &moderator, post)?;
            render_list(ctx, &format!("Orphaned comments on {post}"), &comments)
        }
        ModerateCommand::Approve { id } => {
            let comment = moderation::approve(&conn, &moderator, *id, now)?;
            render_state(ctx, &comment)
        }
        ModerateCommand::Spam { id } => {
            let comment = moderation::mark_spam(&conn, &moderator, *id, now)?;
            render_state(ctx, &comment)
        }
        ModerateCommand::Trash { id } => {
            let report = moderation::trash(&conn, &moderator, *id, now)?;
            render_cascade(ctx, "trashed", &report, &moderator)
        }
        ModerateCommand::Delete { id } => {
            let report = moderation::delete(&conn, &moderator, *id)?;
            render_cascade(ctx, "deleted", &report, &moderator)
        }
    }
}

fn render_list(ctx: &AppContext, heading: &str, comments: &[Comment]) -> Result<()> {
    render_mode(
        ctx.output,
        comments,
        |comments, w| {
            for c in comments {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    c.id,
                    c.post_id,
                    c.state,
                    c.author_name,
                    c.content.replace('\n', " ")
                )?;
            }
            Ok(())
        },
        |comments, w| {
            pretty_section(w, &format!("{heading} ({})", comments.len()))?;
            for c in comments {
                writeln!(
                    w,
                    "#{:<6} {:<15} {} by {}",
                    c.id.0,
                    c.post_id.as_str(),
                    local_time(c.created_at),
                    c.author_name
                )?;
                if let Some(email) = &c.author_email {
                    writeln!(w, "        <{email}>")?;
                }
                for line in c.content.lines() {
                    writeln!(w, "        {line}")?;
                }
            }
            Ok(())
        },
    )
}

fn render_state(ctx: &AppContext, comment: &Comment) -> Result<()> {
    render_mode(
        ctx.output,
        comment,
        |c, w| writeln!(w, "{}\t{}", c.id, c.state),
        |c, w| {
            pretty_kv(w, "comment", format!("#{}", c.id))?;
            pretty_kv(w, "state", c.state.as_str())
        },
    )
}

fn render_cascade(
    ctx: &AppContext,
    verb: &str,
    report: &CascadeReport,
    moderator: &Moderator,
) -> Result<()> {
    render_mode(
        ctx.output,
        report,
        |r, w| {
            for id in &r.affected {
                writeln!(w, "{id}")?;
            }
            Ok(())
        },
        |r, w| {
            let replies = r.affected.len().saturating_sub(1);
            if r.affected.is_empty() {
                writeln!(w, "Comment #{} was already {verb}.", r.root)
            } else {
                writeln!(
                    w,
                    "Comment #{} {verb} by {} ({replies} replies).",
                    r.root,
                    moderator.account()
                )
            }
        },
    )
}
