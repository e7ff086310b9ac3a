use crate::model::{
    Id,
    hashtag::HashtagName,
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Serialize, Serializer,
    ser::{Error, SerializeStruct},
};
use time::{UtcDateTime, UtcOffset, format_description::well_known::Rfc3339};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// Serializes with an additional RFC 3339 `created_at` field taken from the id.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub content: Option<String>,
    pub hashtags: Vec<HashtagName>,
}

impl Post {
    #[must_use]
    pub fn created_at(&self) -> UtcDateTime {
        self.id.created_at()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub content: Option<String>,
    pub hashtags: Vec<HashtagName>,
}

impl From<Post> for PartialPost {
    fn from(value: Post) -> Self {
        Self {
            id: value.id,
            author_id: value.author.id,
            content: value.content,
            hashtags: value.hashtags,
        }
    }
}

fn created_at_rfc3339<E: Error>(created_at: UtcDateTime) -> Result<String, E> {
    created_at
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(E::custom)
}

impl Serialize for Post {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut post = serializer.serialize_struct("Post", 5)?;
        post.serialize_field("id", &self.id)?;
        post.serialize_field("author", &self.author)?;
        post.serialize_field("content", &self.content)?;
        post.serialize_field("hashtags", &self.hashtags)?;
        post.serialize_field("created_at", &created_at_rfc3339(self.created_at())?)?;
        post.end()
    }
}

impl Serialize for PartialPost {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut post = serializer.serialize_struct("PartialPost", 5)?;
        post.serialize_field("id", &self.id)?;
        post.serialize_field("author_id", &self.author_id)?;
        post.serialize_field("content", &self.content)?;
        post.serialize_field("hashtags", &self.hashtags)?;
        post.serialize_field("created_at", &created_at_rfc3339(self.id.created_at())?)?;
        post.end()
    }
}

/// Body of a post as written by its author. Hashtags are derived from it by
/// the store.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub content: Option<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostStats {
    pub likes: u64,
    pub comments: u64,
    pub views: u64,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id, ThreadsSnowflakeGenerator,
        post::{PartialPost, Post},
        user::{User, UserHandle},
    };
    use crate::snowflake::NodeId;
    use time::macros::utc_datetime;

    #[test]
    fn post_json_carries_creation_time() {
        let mut generator = ThreadsSnowflakeGenerator::new(NodeId::new(1, 1).unwrap());
        let id = generator
            .generate_at(utc_datetime!(2025-06-01 12:30))
            .unwrap();
        let post = Post {
            id: Id::new(id),
            author: User {
                handle: UserHandle::new("aziz".to_owned()).unwrap(),
                ..User::default()
            },
            content: Some("hello #world".to_owned()),
            ..Post::default()
        };

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["created_at"], "2025-06-01T12:30:00Z");
        assert_eq!(json["author"]["handle"], "aziz");
        assert_eq!(json["author"]["fullname"], "");

        let partial = serde_json::to_value(PartialPost::from(post.clone())).unwrap();
        assert_eq!(partial["created_at"], "2025-06-01T12:30:00Z");

        let parsed: Post = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, post);
    }
}
