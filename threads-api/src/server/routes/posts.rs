use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use threads_common::model::{
    Id,
    comment::{Comment, CreateComment},
    post::{Post, PostContent, PostMarker, PostStats},
};
use threads_db::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_post(toggle_like)
        .typed_get(get_comments)
        .typed_post(create_comment)
        .typed_post(record_view)
        .typed_get(get_stats)
}

async fn existing_post(db: &DbClient, id: Id<PostMarker>) -> Result<Post> {
    db.fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct ListPostsPath();

/// Every post, newest first.
async fn list_posts(
    ListPostsPath(): ListPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Post>>> {
    let posts = db.fetch_posts_newest_first().await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Json<Post>> {
    let author = db
        .fetch_user(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;
    let post = db.create_post(&author, post.content.as_deref()).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Post>> {
    let post = existing_post(&db, id).await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Json<Post>> {
    let existing = existing_post(&db, id).await?;
    if existing.author.id != user.user_id() {
        return Err(ServerError::NotPostAuthor {
            user: user.user_id(),
            post: id,
        });
    }

    let post = db
        .update_post_content(id, post.content.as_deref())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct ToggleLikePath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LikeState {
    liked: bool,
}

async fn toggle_like(
    ToggleLikePath { id }: ToggleLikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    existing_post(&db, id).await?;
    let liked = db.toggle_like(user.user_id(), id).await?;

    Ok(Json(LikeState { liked }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Comment>>> {
    existing_post(&db, id).await?;
    let comments = db.fetch_comments(id).await?;

    Ok(Json(comments))
}

async fn create_comment(
    CommentsPath { id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(comment): Json<CreateComment>,
) -> Result<Json<Comment>> {
    existing_post(&db, id).await?;
    let comment = db.add_comment(user.user_id(), id, &comment.body).await?;

    Ok(Json(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/view", rejection(ServerError))]
struct RecordViewPath {
    id: Id<PostMarker>,
}

async fn record_view(
    RecordViewPath { id }: RecordViewPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    existing_post(&db, id).await?;
    db.record_view(user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/stats", rejection(ServerError))]
struct GetStatsPath {
    id: Id<PostMarker>,
}

async fn get_stats(
    GetStatsPath { id }: GetStatsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<PostStats>> {
    existing_post(&db, id).await?;
    let stats = db.fetch_post_stats(id).await?;

    Ok(Json(stats))
}
