//! Text documents fed to the ranker.

use crate::{error::FeedError, store::ContentStore};
use threads_common::model::{Id, hashtag::HashtagName, post::Post, user::UserMarker};

/// The post's content followed by its hashtag names, separated by spaces.
///
/// A post without content and hashtags yields an empty document.
#[must_use]
pub fn build_post_document(post: &Post) -> String {
    let content = post.content.as_deref().unwrap_or_default();
    let hashtags = post
        .hashtags
        .iter()
        .map(HashtagName::get)
        .collect::<Vec<_>>()
        .join(" ");

    format!("{content} {hashtags}").trim().to_owned()
}

/// Joins the non-empty documents of `posts` with single spaces.
#[must_use]
pub fn profile_document(posts: &[Post]) -> String {
    posts
        .iter()
        .map(build_post_document)
        .filter(|document| !document.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything `user` likes as one document.
///
/// Empty when the user likes nothing or only likes posts without text, both
/// of which callers treat as having no profile.
pub async fn build_user_profile<S: ContentStore>(
    store: &S,
    user: Id<UserMarker>,
) -> Result<String, FeedError<S::Error>> {
    let liked = store.list_liked_posts(user).await?;

    Ok(profile_document(&liked))
}
