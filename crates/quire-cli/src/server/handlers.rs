use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::Utc;
use quire_core::db;
use quire_core::error::Error as CoreError;
use quire_core::model::comment::{Comment, CommentId};
use quire_core::moderation::{self, CascadeReport, QueueFilter};
use quire_core::read::read_comments;
use quire_core::submit::{SubmitRequest, submit};
use quire_core::tree::CommentNode;
use rusqlite::Connection;
use serde::Deserialize;

use super::AppState;
use super::auth::{Caller, RequireModerator};
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostQuery {
    /// Post id or slug.
    pub post: String,
}

/// Run `op` on a fresh connection off the async runtime.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> quire_core::Result<T> + Send + 'static,
{
    let path = state.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db::connect(&path).map_err(CoreError::Storage)?;
        op(&conn)
    })
    .await?;
    Ok(result?)
}

pub async fn read(
    State(state): State<AppState>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let Query(PostQuery { post }) = query?;
    let max_depth = state.max_reply_depth;
    let forest = with_store(&state, move |conn| read_comments(conn, &post)).await?;
    Ok(Json(forest.clamp_depth(max_depth).roots))
}

pub async fn submit_comment(
    State(state): State<AppState>,
    Caller(identity): Caller,
    query: Result<Query<PostQuery>, QueryRejection>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let Query(PostQuery { post }) = query?;
    let Json(mut req) = payload?;
    if !post.trim().is_empty() {
        req.post = post;
    }
    let comment = with_store(&state, move |conn| submit(conn, &req, &identity, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn queue(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    query: Result<Query<QueueFilter>, QueryRejection>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let Query(filter) = query?;
    let comments =
        with_store(&state, move |conn| moderation::queue(conn, &moderator, &filter)).await?;
    Ok(Json(comments))
}

pub async fn approve(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Path(id) = id?;
    let comment = with_store(&state, move |conn| {
        moderation::approve(conn, &moderator, CommentId(id), Utc::now())
    })
    .await?;
    Ok(Json(comment))
}

pub async fn spam(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Path(id) = id?;
    let comment = with_store(&state, move |conn| {
        moderation::mark_spam(conn, &moderator, CommentId(id), Utc::now())
    })
    .await?;
    Ok(Json(comment))
}

pub async fn trash(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<CascadeReport>, ApiError> {
    let Path(id) = id?;
    let report = with_store(&state, move |conn| {
        moderation::trash(conn, &moderator, CommentId(id), Utc::now())
    })
    .await?;
    Ok(Json(report))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<CascadeReport>, ApiError> {
    let Path(id) = id?;
    let report =
        with_store(&state, move |conn| moderation::delete(conn, &moderator, CommentId(id))).await?;
    Ok(Json(report))
}

pub async fn orphans(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    reference: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let Path(reference) = reference?;
    let comments =
        with_store(&state, move |conn| moderation::orphans(conn, &moderator, &reference)).await?;
    Ok(Json(comments))
}
