use crate::{
    corpus::build_user_profile,
    error::{FeedError, RankError, Result},
    ranker::{Ranker, TfidfRanker, rank_posts},
    store::ContentStore,
    tfidf::tokenize,
};
use threads_common::model::{Id, post::Post, user::UserMarker};
use tracing::{debug, info};

pub const DEFAULT_FEED_LIMIT: usize = 20;

/// Who is asking for recommendations.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(Id<UserMarker>),
}

/// Which path produced a feed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum FeedSource {
    /// No profile to personalize with, newest posts first.
    ColdStart,
    Personalized,
    /// A profile existed but the candidate posts had no text to rank by.
    Fallback,
}

impl FeedSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedSource::ColdStart => "cold_start",
            FeedSource::Personalized => "personalized",
            FeedSource::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Feed {
    pub source: FeedSource,
    pub posts: Vec<Post>,
}

/// Sorts newest first and keeps at most `limit` posts.
#[must_use]
pub fn recent_posts(mut posts: Vec<Post>, limit: usize) -> Vec<Post> {
    // snowflake ids order by creation time
    posts.sort_by(|a, b| b.id.cmp(&a.id));
    posts.truncate(limit);
    posts
}

#[derive(Clone, Debug)]
pub struct Recommender<R = TfidfRanker> {
    ranker: R,
    limit: usize,
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new(TfidfRanker)
    }
}

impl<R: Ranker> Recommender<R> {
    #[must_use]
    pub fn new(ranker: R) -> Self {
        Self {
            ranker,
            limit: DEFAULT_FEED_LIMIT,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Up to `limit` posts for `viewer`, best first.
    pub async fn recommend<S: ContentStore>(
        &self,
        store: &S,
        viewer: Viewer,
    ) -> Result<Vec<Post>, S::Error> {
        Ok(self.feed(store, viewer).await?.posts)
    }

    /// Builds the feed for `viewer` and reports which path produced it.
    ///
    /// Anonymous viewers and users without liked text get the newest posts
    /// ([`FeedSource::ColdStart`]). Otherwise every post is ranked against
    /// the text of the liked posts ([`FeedSource::Personalized`]), unless no
    /// candidate has any rankable text ([`FeedSource::Fallback`]).
    ///
    /// A profile can be non-empty yet share no term with any candidate, for
    /// example when the user only liked posts like `"?? !!"`. Every candidate
    /// then scores 0 and the feed is still [`FeedSource::Personalized`], but
    /// in candidate order, which is oldest first.
    pub async fn feed<S: ContentStore>(&self, store: &S, viewer: Viewer) -> Result<Feed, S::Error> {
        let Viewer::User(user) = viewer else {
            debug!("Anonymous viewer, serving newest posts");
            return self.cold_start(store).await;
        };

        if store
            .get_user(user)
            .await
            .map_err(FeedError::Store)?
            .is_none()
        {
            return Err(FeedError::UserNotFound(user));
        }

        let profile = build_user_profile(store, user).await?;
        if profile.is_empty() {
            debug!(%user, "User has no profile, serving newest posts");
            return self.cold_start(store).await;
        }

        let candidates = store.list_all_posts().await.map_err(FeedError::Store)?;
        if tokenize(&profile).next().is_none() {
            info!(
                %user,
                "Liked posts have no rankable text, candidates keep oldest first order"
            );
        }

        match rank_posts(&self.ranker, &candidates, &profile, self.limit) {
            Ok(posts) => {
                debug!(
                    %user,
                    candidates = candidates.len(),
                    returned = posts.len(),
                    "Ranked candidates against user profile"
                );
                Ok(Feed {
                    source: FeedSource::Personalized,
                    posts,
                })
            }
            Err(RankError::InsufficientCorpus) => {
                info!(
                    %user,
                    candidates = candidates.len(),
                    "Candidates have no rankable text, serving newest posts"
                );
                Ok(Feed {
                    source: FeedSource::Fallback,
                    posts: recent_posts(candidates, self.limit),
                })
            }
        }
    }

    async fn cold_start<S: ContentStore>(&self, store: &S) -> Result<Feed, S::Error> {
        let posts = store
            .list_recent_posts(self.limit)
            .await
            .map_err(FeedError::Store)?;

        Ok(Feed {
            source: FeedSource::ColdStart,
            posts,
        })
    }
}
