use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const COMMENT_BODY_MAX_LEN: usize = 2000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub body: CommentBody,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateComment {
    pub body: CommentBody,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentBody(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidCommentBodyError {
    #[error("The comment is blank")]
    Blank,
    #[error("The comment is longer than 2000 characters")]
    TooLong,
}

impl CommentBody {
    pub fn new(body: String) -> Result<Self, InvalidCommentBodyError> {
        if body.trim().is_empty() {
            Err(InvalidCommentBodyError::Blank)
        } else if body.chars().count() > COMMENT_BODY_MAX_LEN {
            Err(InvalidCommentBodyError::TooLong)
        } else {
            Ok(Self(body))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for CommentBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentBody::new(inner.clone()).map_err(|_| {
            Error::invalid_value(
                Unexpected::Str(&inner),
                &"a non-blank comment of at most 2000 characters",
            )
        })
    }
}
