use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct InteractionMarker;

/// What a user did to a post.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Comment,
    View,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown interaction action: {0:?}")]
pub struct InvalidActionError(String);

impl Action {
    pub const ALL: [Action; 3] = [Action::Like, Action::Comment, Action::View];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::Comment => "comment",
            Action::View => "view",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = InvalidActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| InvalidActionError(s.to_owned()))
    }
}

/// One entry of the append-only interaction log.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct Interaction {
    pub id: Id<InteractionMarker>,
    pub user: Id<UserMarker>,
    pub post: Id<PostMarker>,
    pub action: Action,
}

impl Interaction {
    #[must_use]
    pub fn created_at(&self) -> UtcDateTime {
        self.id.created_at()
    }
}
