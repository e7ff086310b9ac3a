pub mod auth;
pub mod comment;
pub mod hashtag;
pub mod interaction;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, NonPositiveLifetimeError},
        comment::InvalidCommentBodyError,
        hashtag::InvalidHashtagNameError,
        interaction::InvalidActionError,
        user::{InvalidUserHandleError, ProfileTextTooLongError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    ProfileText(#[from] ProfileTextTooLongError),
    #[error(transparent)]
    HashtagName(#[from] InvalidHashtagNameError),
    #[error(transparent)]
    CommentBody(#[from] InvalidCommentBodyError),
    #[error(transparent)]
    Action(#[from] InvalidActionError),
    #[error(transparent)]
    TokenLifetime(#[from] NonPositiveLifetimeError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ThreadsEpoch;
impl Epoch for ThreadsEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type ThreadsSnowflake = Snowflake<ThreadsEpoch>;
pub type ThreadsSnowflakeGenerator = SnowflakeGenerator<ThreadsEpoch>;

/// A snowflake tagged with the kind of entity it identifies.
///
/// Ids order by creation time, so sorting posts by descending id sorts them
/// newest first.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(ThreadsSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: ThreadsSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> ThreadsSnowflake {
        self.0
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        self.0.created_at()
    }

    /// The id as stored in a signed `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<ThreadsSnowflake> for Id<Marker> {
    fn from(value: ThreadsSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(ThreadsSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, ThreadsEpoch, post::PostMarker};
    use crate::snowflake::{Epoch, NodeId, SnowflakeGenerator};
    use time::macros::utc_datetime;

    #[test]
    fn db_representation_keeps_high_bit() {
        let id = Id::<PostMarker>::from(u64::MAX - 5);

        assert_eq!(id.to_db(), -6);
        assert_eq!(Id::<PostMarker>::from_db(id.to_db()), id);
    }

    #[test]
    fn created_at_comes_from_snowflake() {
        let time = utc_datetime!(2025-06-01 12:30);
        let mut generator = SnowflakeGenerator::<ThreadsEpoch>::new(NodeId::default());
        let id = Id::<PostMarker>::new(generator.generate_at(time).unwrap());

        assert_eq!(id.created_at(), time);
        assert!(ThreadsEpoch::EPOCH_TIME < id.created_at());
    }
}
