use anyhow::Result;
use clap::Args;
use quire_core::read::read_comments;
use std::io::Write;

use super::local_time;
use crate::context::AppContext;
use crate::output::{pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Post id or slug.
    pub post: String,
}

/// Execute `quire comments <post>`: the thread a reader would see, with
/// replies clamped to the configured display depth.
///
/// # Errors
///
/// Returns an error if the store is unavailable or the post is not public.
pub fn run_comments(args: &CommentsArgs, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;
    let forest = read_comments(&conn, &args.post)?.clamp_depth(ctx.config.server.max_reply_depth);
    let flat = forest.flatten();

    render_mode(
        ctx.output,
        &forest.roots,
        |_, w| {
            for (depth, c) in &flat {
                let parent = c.parent_id.map(|p| p.to_string()).unwrap_or_default();
                writeln!(w, "{}\t{}\t{depth}\t{}\t{}", c.id, parent, c.author_name, c.content)?;
            }
            Ok(())
        },
        |roots, w| {
            pretty_section(w, &format!("{} ({} comments)", args.post, flat.len()))?;
            if roots.is_empty() {
                writeln!(w, "No comments yet.")?;
                return Ok(());
            }
            for (depth, c) in &flat {
                let indent = "  ".repeat(*depth);
                writeln!(
                    w,
                    "{indent}#{} {} at {}",
                    c.id,
                    c.author_name,
                    local_time(c.created_at)
                )?;
                for line in c.content.lines() {
                    writeln!(w, "{indent}  {line}")?;
                }
            }
            pretty_rule(w)
        },
    )
}
