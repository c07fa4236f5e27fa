use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use quire_core::model::comment::{Comment, CommentId, CommentState};
use quire_core::submit::{SubmitRequest, submit};
use std::io::Write;

use super::local_time;
use crate::context::AppContext;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
    #[command(
        about = "Submit a comment or reply",
        after_help = "EXAMPLES:\n    # Anonymous comment, held for moderation\n    quire comment add hello-world --name Ann --content 'Nice post'\n\n    # Reply as a configured account, visible immediately\n    quire --as ann comment add hello-world --parent 12 --name Ann --content 'Thanks!'"
    )]
    Add(AddArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Post id or slug.
    pub post: String,

    /// Display name shown with the comment.
    #[arg(long = "name")]
    pub author_name: String,

    /// Comment body.
    #[arg(long)]
    pub content: String,

    /// Contact email, never shown to readers.
    #[arg(long = "email")]
    pub author_email: Option<String>,

    /// Homepage link.
    #[arg(long = "url")]
    pub author_url: Option<String>,

    /// Reply to this comment id.
    #[arg(long = "parent", value_name = "ID")]
    pub parent_id: Option<CommentId>,
}

impl From<&AddArgs> for SubmitRequest {
    fn from(args: &AddArgs) -> Self {
        Self {
            post: args.post.clone(),
            parent_id: args.parent_id,
            author_name: args.author_name.clone(),
            author_email: args.author_email.clone(),
            author_url: args.author_url.clone(),
            content: args.content.clone(),
        }
    }
}

/// Execute a `quire comment` subcommand.
///
/// Without `--as` the comment is submitted anonymously and lands in the
/// moderation queue.
///
/// # Errors
///
/// Returns an error if validation fails, the post or parent cannot accept
/// the comment, or the store is unavailable.
pub fn run_comment(command: &CommentCommand, ctx: &AppContext) -> Result<()> {
    match command {
        CommentCommand::Add(args) => {
            let identity = ctx.submitter()?;
            let conn = ctx.connect()?;
            let comment = submit(&conn, &SubmitRequest::from(args), &identity, Utc::now())?;
            render_mode(
                ctx.output,
                &comment,
                |c, w| writeln!(w, "{}\t{}", c.id, c.state),
                render_comment_human,
            )
        }
    }
}

fn render_comment_human(c: &Comment, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Comment #{}", c.id))?;
    pretty_kv(w, "post", c.post_id.as_str())?;
    if let Some(parent) = c.parent_id {
        pretty_kv(w, "reply to", format!("#{parent}"))?;
    }
    pretty_kv(w, "author", &c.author_name)?;
    pretty_kv(w, "state", c.state.as_str())?;
    pretty_kv(w, "created", local_time(c.created_at))?;
    if c.state == CommentState::Pending {
        writeln!(w, "Held for moderation: `quire moderate approve {}`", c.id)?;
    }
    Ok(())
}
