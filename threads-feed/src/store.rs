//! Read side of the collaborators the recommender depends on.

use crate::{error::FeedError, recommend::recent_posts};
use std::future::Future;
use threads_common::model::{
    Id,
    interaction::Action,
    post::{Post, PostMarker},
    user::{User, UserMarker},
};

pub trait InteractionLog: Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The posts `user` performed `action` on, each once, ordered by the first
    /// such event. A user without events gets an empty list, not an error.
    fn posts_with_action(
        &self,
        user: Id<UserMarker>,
        action: Action,
    ) -> impl Future<Output = Result<Vec<Id<PostMarker>>, Self::Error>> + Send;
}

pub trait ContentStore: InteractionLog {
    fn list_all_posts(&self) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send;

    fn get_post(
        &self,
        id: Id<PostMarker>,
    ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send;

    fn get_user(
        &self,
        id: Id<UserMarker>,
    ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send;

    /// The newest `limit` posts, newest first.
    fn list_recent_posts(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send {
        async move { Ok(recent_posts(self.list_all_posts().await?, limit)) }
    }

    /// Every post `user` currently likes, in no particular order.
    fn list_liked_posts(
        &self,
        user: Id<UserMarker>,
    ) -> impl Future<Output = Result<Vec<Post>, FeedError<Self::Error>>> + Send {
        async move {
            let liked = self
                .posts_with_action(user, Action::Like)
                .await
                .map_err(FeedError::Store)?;

            let mut posts = Vec::with_capacity(liked.len());
            for id in liked {
                let post = self
                    .get_post(id)
                    .await
                    .map_err(FeedError::Store)?
                    .ok_or(FeedError::PostNotFound(id))?;
                posts.push(post);
            }

            Ok(posts)
        }
    }
}
