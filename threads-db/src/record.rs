use sqlx::FromRow;
use threads_common::model::{
    Id, ModelValidationError,
    auth::{Authentication, TokenLifetime},
    comment::{Comment, CommentBody},
    hashtag::HashtagName,
    post::{Post, PostStats},
    user::{Profile, ProfileText, User, UserHandle},
};
use time::PrimitiveDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub handle: String,
    pub fullname: String,
    pub bio: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub content: Option<String>,
    pub user_snowflake: i64,
    pub handle: String,
    pub fullname: String,
    pub bio: Option<String>,
    /// In extraction order.
    pub hashtags: Vec<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub body: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostStatsRecord {
    pub likes: i64,
    pub comments: i64,
    pub views: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn profile(fullname: String, bio: Option<String>) -> Result<Profile, ModelValidationError> {
    Ok(Profile {
        fullname: ProfileText::new(fullname)?,
        bio: bio.map(ProfileText::new).transpose()?,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            handle: UserHandle::new(value.handle)?,
            profile: profile(value.fullname, value.bio)?,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let hashtags = value
            .hashtags
            .iter()
            .map(|name| HashtagName::new(name))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            author: User {
                id: Id::from_db(value.user_snowflake),
                handle: UserHandle::new(value.handle)?,
                profile: profile(value.fullname, value.bio)?,
            },
            content: value.content,
            hashtags,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post_id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            body: CommentBody::new(value.body)?,
        })
    }
}

impl From<PostStatsRecord> for PostStats {
    fn from(value: PostStatsRecord) -> Self {
        // counts are never negative
        Self {
            likes: value.likes.cast_unsigned(),
            comments: value.comments.cast_unsigned(),
            views: value.views.cast_unsigned(),
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            lifetime: value
                .expires_after_seconds
                .map(TokenLifetime::from_seconds)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{AuthenticationRecord, FullPostRecord, PostStatsRecord, UserRecord};
    use threads_common::model::{
        Id, ModelValidationError,
        auth::{AUTH_TOKEN_HASH_LEN, Authentication},
        hashtag::HashtagName,
        post::{Post, PostStats},
        user::{ProfileText, User},
    };
    use time::{
        Duration,
        macros::{datetime, utc_datetime},
    };

    fn post_record(hashtags: &[&str]) -> FullPostRecord {
        FullPostRecord {
            post_snowflake: 7,
            content: Some("river walk #Nature".to_owned()),
            user_snowflake: -3,
            handle: "walker".to_owned(),
            fullname: "Walker".to_owned(),
            bio: None,
            hashtags: hashtags.iter().map(|&name| name.to_owned()).collect(),
        }
    }

    fn auth_record(expires_after_seconds: Option<i64>) -> AuthenticationRecord {
        AuthenticationRecord {
            user_snowflake: 11,
            token_hash: vec![0; AUTH_TOKEN_HASH_LEN],
            created_at: datetime!(2025-04-01 10:00),
            expires_after_seconds,
        }
    }

    #[test]
    fn user_conversion() {
        let user = User::try_from(UserRecord {
            user_snowflake: -1,
            handle: "someone".to_owned(),
            fullname: "Some One".to_owned(),
            bio: Some("hi".to_owned()),
        })
        .unwrap();
        assert_eq!(user.id, Id::from(u64::MAX));
        assert_eq!(user.handle.get(), "someone");
        assert_eq!(user.profile.fullname.get(), "Some One");
        assert_eq!(user.profile.bio.as_ref().map(ProfileText::get), Some("hi"));

        assert!(matches!(
            User::try_from(UserRecord {
                user_snowflake: 1,
                handle: "no spaces allowed".to_owned(),
                ..UserRecord::default()
            }),
            Err(ModelValidationError::UserHandle(_))
        ));
        assert!(matches!(
            User::try_from(UserRecord {
                user_snowflake: 1,
                handle: "someone".to_owned(),
                bio: Some("b".repeat(151)),
                ..UserRecord::default()
            }),
            Err(ModelValidationError::ProfileText(_))
        ));
    }

    #[test]
    fn post_conversion_keeps_hashtag_order() {
        let post = Post::try_from(post_record(&["nature", "river"])).unwrap();

        assert_eq!(post.id, Id::from(7));
        assert_eq!(post.author.id, Id::from_db(-3));
        assert_eq!(
            post.hashtags,
            [
                HashtagName::new("nature").unwrap(),
                HashtagName::new("river").unwrap()
            ]
        );
        assert!(Post::try_from(post_record(&[])).unwrap().hashtags.is_empty());
        assert!(matches!(
            Post::try_from(post_record(&["not a tag"])),
            Err(ModelValidationError::HashtagName(_))
        ));
    }

    #[test]
    fn stats_conversion() {
        let stats = PostStats::from(PostStatsRecord {
            likes: 3,
            comments: 0,
            views: 12,
        });

        assert_eq!(
            stats,
            PostStats {
                likes: 3,
                comments: 0,
                views: 12,
            }
        );
    }

    #[test]
    fn authentication_conversion() {
        let auth = Authentication::try_from(auth_record(Some(60))).unwrap();
        assert_eq!(auth.created_at, utc_datetime!(2025-04-01 10:00));
        assert_eq!(
            auth.expires_at(),
            Some(utc_datetime!(2025-04-01 10:00) + Duration::minutes(1))
        );

        assert_eq!(
            Authentication::try_from(auth_record(None)).unwrap().lifetime,
            None
        );
        assert!(matches!(
            Authentication::try_from(auth_record(Some(0))),
            Err(ModelValidationError::TokenLifetime(_))
        ));

        let mut short_hash = auth_record(None);
        short_hash.token_hash.pop();
        assert!(matches!(
            Authentication::try_from(short_hash),
            Err(ModelValidationError::TokenHash(_))
        ));
    }
}
