use threads_common::model::{Id, post::PostMarker, user::UserMarker};
use thiserror::Error;

pub type Result<T, E> = std::result::Result<T, FeedError<E>>;

/// Failures surfaced to callers of the recommender. `E` is the error type of
/// the backing store.
#[derive(Debug, Error)]
pub enum FeedError<E> {
    #[error(transparent)]
    Store(E),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserNotFound(Id<UserMarker>),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum RankError {
    #[error("No candidate document contains a single term")]
    InsufficientCorpus,
}
