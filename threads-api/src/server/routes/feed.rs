use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use threads_common::model::post::Post;
use threads_db::DbClient;
use threads_feed::{Recommender, Viewer};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

#[derive(Clone, Debug, Serialize)]
struct FeedResponse {
    /// `cold_start`, `personalized` or `fallback`.
    source: &'static str,
    posts: Vec<Post>,
}

async fn get_feed(
    FeedPath(): FeedPath,
    State(db): State<Arc<DbClient>>,
    State(recommender): State<Arc<Recommender>>,
    user: Option<AuthenticatedUser>,
) -> Result<Json<FeedResponse>> {
    let viewer = user.map_or(Viewer::Anonymous, Viewer::from);
    let feed = recommender.feed(db.as_ref(), viewer).await?;

    Ok(Json(FeedResponse {
        source: feed.source.as_str(),
        posts: feed.posts,
    }))
}
