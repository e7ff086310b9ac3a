use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use threads_common::model::{
    Id,
    auth::{AuthToken, Authentication, TokenLifetime},
    post::PartialPost,
    user::{CreateUser, Profile, User, UserHandle, UserMarker},
};
use threads_db::DbClient;
use time::UtcDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_get(check_handle)
        .typed_get(get_user)
        .typed_patch(update_profile)
        .typed_get(get_user_posts)
        .typed_get(get_followers)
        .typed_post(toggle_follow)
}

async fn existing_user(db: &DbClient, id: Id<UserMarker>) -> Result<User> {
    db.fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/create", rejection(ServerError))]
struct CreateUserPath();

#[derive(Clone, Debug, Serialize)]
struct CreatedUser {
    user: User,
    /// Only ever shown here, the server keeps a hash.
    token: String,
}

async fn create_user(
    CreateUserPath(): CreateUserPath,
    State(db): State<Arc<DbClient>>,
    State(token_lifetime): State<Option<TokenLifetime>>,
    Json(user): Json<CreateUser>,
) -> Result<Json<CreatedUser>> {
    let user = db.create_user(&user).await?;

    let token = AuthToken::generate_random(user.id);
    db.create_auth(&Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        lifetime: token_lifetime,
    })
    .await?;

    info!(user_id = %user.id, handle = user.handle.get(), "Registered user");
    Ok(Json(CreatedUser {
        user,
        token: token.to_bearer(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/check/{handle}", rejection(ServerError))]
struct CheckHandlePath {
    handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct HandleCheck {
    handle: String,
    /// Whether the handle is well formed at all.
    valid: bool,
    available: bool,
}

async fn check_handle(
    CheckHandlePath { handle }: CheckHandlePath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<HandleCheck>> {
    let Ok(parsed) = UserHandle::new(handle.clone()) else {
        return Ok(Json(HandleCheck {
            handle,
            valid: false,
            available: false,
        }));
    };

    let available = db.fetch_user_by_handle(&parsed).await?.is_none();

    Ok(Json(HandleCheck {
        handle,
        valid: true,
        available,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = existing_user(&db, id).await?;

    Ok(Json(user))
}

async fn update_profile(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(profile): Json<Profile>,
) -> Result<Json<User>> {
    if id != user.user_id() {
        return Err(ServerError::NotProfileOwner {
            user: user.user_id(),
            profile: id,
        });
    }

    let user = db
        .update_profile(id, &profile)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<PartialPost>>> {
    existing_user(&db, id).await?;
    let posts = db
        .fetch_user_posts(id)
        .await?
        .into_iter()
        .map(PartialPost::from)
        .collect();

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followers", rejection(ServerError))]
struct GetFollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    GetFollowersPath { id }: GetFollowersPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<User>>> {
    existing_user(&db, id).await?;
    let followers = db.fetch_followers(id).await?;

    Ok(Json(followers))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/follow", rejection(ServerError))]
struct ToggleFollowPath {
    id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FollowState {
    following: bool,
}

async fn toggle_follow(
    ToggleFollowPath { id }: ToggleFollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FollowState>> {
    existing_user(&db, id).await?;
    let following = db.toggle_follow(user.user_id(), id).await?;

    Ok(Json(FollowState { following }))
}
