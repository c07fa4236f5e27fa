//! `quire post`: the post directory comments hang off.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use quire_core::model::post::{Post, PostStatus};
use quire_core::posts;
use quire_core::read::count_approved;
use serde::Serialize;
use std::io::Write;

use super::local_time;
use crate::context::AppContext;
use crate::output::{pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum PostCommand {
    #[command(
        about = "Register a post",
        after_help = "EXAMPLES:\n    quire post create --slug hello-world --title 'Hello, world'\n    quire post create --slug wip --title 'Soon' --status draft"
    )]
    Create {
        /// URL slug: lowercase letters, digits and dashes.
        #[arg(long)]
        slug: String,

        #[arg(long)]
        title: String,

        /// Initial status: draft, published, archived.
        #[arg(long, default_value = "published")]
        status: PostStatus,
    },

    #[command(about = "List posts, newest first, with approved comment counts")]
    List,

    #[command(
        about = "Change a post's status",
        after_help = "EXAMPLES:\n    # Close comments but keep the thread readable\n    quire post status hello-world archived"
    )]
    Status {
        /// Post id or slug.
        reference: String,

        /// New status: draft, published, archived.
        status: PostStatus,
    },
}

#[derive(Debug, Serialize)]
pub struct PostRow {
    #[serde(flatten)]
    pub post: Post,
    pub approved_comments: usize,
}

/// Execute a `quire post` subcommand.
///
/// # Errors
///
/// Returns an error if the store is unavailable or the post operation is
/// rejected.
pub fn run_post(command: &PostCommand, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;
    match command {
        PostCommand::Create {
            slug,
            title,
            status,
        } => {
            let post = posts::create_post(&conn, slug, title, *status, Utc::now())?;
            render_post(ctx, &post)
        }
        PostCommand::Status { reference, status } => {
            let post = posts::set_post_status(&conn, reference, *status, Utc::now())?;
            render_post(ctx, &post)
        }
        PostCommand::List => {
            let rows = posts::list_posts(&conn)?
                .into_iter()
                .map(|post| {
                    let approved_comments = count_approved(&conn, &post.id)?;
                    Ok(PostRow {
                        post,
                        approved_comments,
                    })
                })
                .collect::<quire_core::Result<Vec<_>>>()?;
            render_mode(
                ctx.output,
                &rows,
                |rows, w| {
                    for row in rows {
                        writeln!(
                            w,
                            "{}\t{}\t{}\t{}\t{}",
                            row.post.id,
                            row.post.slug,
                            row.post.status,
                            row.approved_comments,
                            row.post.title
                        )?;
                    }
                    Ok(())
                },
                |rows, w| {
                    pretty_section(w, &format!("Posts ({})", rows.len()))?;
                    for row in rows {
                        writeln!(
                            w,
                            "{:<15} {:<10} {:>4}  {} ({})",
                            row.post.id.as_str(),
                            row.post.status.as_str(),
                            row.approved_comments,
                            row.post.title,
                            row.post.slug
                        )?;
                    }
                    Ok(())
                },
            )
        }
    }
}

fn render_post(ctx: &AppContext, post: &Post) -> Result<()> {
    render_mode(
        ctx.output,
        post,
        |p, w| writeln!(w, "{}\t{}\t{}", p.id, p.slug, p.status),
        |p, w| {
            pretty_section(w, &format!("Post {}", p.id))?;
            writeln!(w, "{}", p.title)?;
            pretty_rule(w)?;
            pretty_kv(w, "slug", &p.slug)?;
            pretty_kv(w, "status", p.status.as_str())?;
            pretty_kv(w, "created", local_time(p.created_at))?;
            pretty_kv(w, "updated", local_time(p.updated_at))
        },
    )
}
