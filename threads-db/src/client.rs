use crate::record::{
    AuthenticationRecord, CommentRecord, FullPostRecord, PostStatsRecord, UserRecord,
};
use sqlx::{PgConnection, PgPool, migrate::MigrateError, query, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use threads_common::{
    model::{
        Id, ModelValidationError, ThreadsSnowflakeGenerator,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CommentBody},
        hashtag::{HashtagName, extract_hashtags},
        interaction::{Action, InteractionMarker},
        post::{Post, PostMarker, PostStats},
        user::{CreateUser, Profile, ProfileText, User, UserHandle, UserMarker},
    },
    snowflake::{NodeId, SnowflakeError},
};
use threads_feed::{ContentStore, FeedError, InteractionLog};
use time::PrimitiveDateTime;
use tracing::{debug, info};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error("Generating an id failed: {0}")]
    Snowflake(#[from] SnowflakeError),
    #[error("The handle {0:?} is already taken")]
    HandleTaken(String),
    #[error("A user cannot follow themselves")]
    SelfFollow,
}

/// Selects [`FullPostRecord`]s, hashtags aggregated in extraction order.
///
/// The first argument is the `WHERE` condition, the second anything that goes
/// after `GROUP BY`.
macro_rules! full_post_query {
    ($condition:literal, $tail:literal) => {
        concat!(
            "
            SELECT
                posts.post_snowflake,
                posts.content,
                users.user_snowflake,
                users.handle,
                users.fullname,
                users.bio,
                COALESCE(
                    array_agg(hashtags.name ORDER BY post_hashtags.position)
                        FILTER (WHERE hashtags.name IS NOT NULL),
                    '{}'
                ) AS hashtags
            FROM
                posts.posts
                JOIN users.users USING (user_snowflake)
                LEFT JOIN posts.post_hashtags USING (post_snowflake)
                LEFT JOIN posts.hashtags USING (hashtag_id)
            WHERE
            ",
            $condition,
            "
            GROUP BY
                posts.post_snowflake,
                users.user_snowflake
            ",
            $tail,
        )
    };
}

/// Appends one interaction event. A second like of the same post by the same
/// user is dropped by the `interactions_like_once_idx` partial index.
const APPEND_INTERACTION_QUERY: &str = "
    INSERT INTO interactions.interactions
        (interaction_snowflake, user_snowflake, post_snowflake, action)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (user_snowflake, post_snowflake) WHERE action = 'like' DO NOTHING
    ";

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<ThreadsSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, node: NodeId) -> Self {
        let snowflake_generator = Mutex::new(ThreadsSnowflakeGenerator::new(node));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        info!("Database migrations are up to date");

        Ok(())
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.handle,
                users.fullname,
                users.bio
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.handle,
                users.fullname,
                users.bio
            FROM
                users.users
            WHERE
                users.handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id()?;

        let inserted = query(
            "
            INSERT INTO users.users (user_snowflake, handle, fullname, bio)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user_id.to_db())
        .bind(user.handle.get())
        .bind(user.profile.fullname.get())
        .bind(user.profile.bio.as_ref().map(ProfileText::get))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                return Err(DbError::HandleTaken(user.handle.get().to_owned()));
            }
            Err(error) => return Err(error.into()),
        }

        debug!(%user_id, handle = user.handle.get(), "Created user");
        Ok(User {
            id: user_id,
            handle: user.handle.clone(),
            profile: user.profile.clone(),
        })
    }

    /// Replaces a user's full name and bio.
    ///
    /// Returns `None` if the user does not exist.
    pub async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        profile: &Profile,
    ) -> Result<Option<User>> {
        let updated = query(
            "
            UPDATE users.users
            SET fullname = $2, bio = $3
            WHERE users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .bind(profile.fullname.get())
        .bind(profile.bio.as_ref().map(ProfileText::get))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        debug!(%user_id, "Updated profile");
        self.fetch_user(user_id).await
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(full_post_query!(
            "posts.post_snowflake = $1",
            ""
        ))
        .bind(post_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn fetch_all_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(full_post_query!(
            "TRUE",
            "ORDER BY posts.post_snowflake"
        ))
        .fetch_all(&self.pool)
        .await?;

        collect_posts(records)
    }

    pub async fn fetch_posts_newest_first(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(full_post_query!(
            "TRUE",
            "ORDER BY posts.post_snowflake DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        collect_posts(records)
    }

    /// The newest `limit` posts, newest first.
    pub async fn fetch_recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(full_post_query!(
            "TRUE",
            "
            ORDER BY posts.post_snowflake DESC
            LIMIT $1
            "
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        collect_posts(records)
    }

    /// Posts written by `user_id`, newest first.
    pub async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(full_post_query!(
            "posts.user_snowflake = $1",
            "ORDER BY posts.post_snowflake DESC"
        ))
        .bind(user_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        collect_posts(records)
    }

    pub async fn fetch_liked_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, FullPostRecord>(full_post_query!(
            "
            posts.post_snowflake IN (
                SELECT
                    interactions.post_snowflake
                FROM
                    interactions.interactions
                WHERE
                    interactions.user_snowflake = $1
                    AND interactions.action = 'like'
            )
            ",
            "ORDER BY posts.post_snowflake"
        ))
        .bind(user_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        collect_posts(records)
    }

    pub async fn create_post(&self, author: &User, content: Option<&str>) -> Result<Post> {
        let post_id = self.next_id()?;
        let hashtags = content.map(extract_hashtags).unwrap_or_default();

        let mut transaction = self.pool.begin().await?;

        query(
            "
            INSERT INTO posts.posts (post_snowflake, user_snowflake, content)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(post_id.to_db())
        .bind(author.id.to_db())
        .bind(content)
        .execute(&mut *transaction)
        .await?;

        replace_hashtags(&mut transaction, post_id, &hashtags).await?;
        transaction.commit().await?;

        debug!(%post_id, author = %author.id, hashtags = hashtags.len(), "Created post");
        Ok(Post {
            id: post_id,
            author: author.clone(),
            content: content.map(str::to_owned),
            hashtags,
        })
    }

    /// Replaces a post's content and with it its hashtags.
    ///
    /// Returns `None` if the post does not exist.
    pub async fn update_post_content(
        &self,
        post_id: Id<PostMarker>,
        content: Option<&str>,
    ) -> Result<Option<Post>> {
        let hashtags = content.map(extract_hashtags).unwrap_or_default();

        let mut transaction = self.pool.begin().await?;

        let updated = query(
            "
            UPDATE posts.posts
            SET content = $2
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(content)
        .execute(&mut *transaction)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        replace_hashtags(&mut transaction, post_id, &hashtags).await?;
        transaction.commit().await?;

        debug!(%post_id, hashtags = hashtags.len(), "Updated post content");
        self.fetch_post(post_id).await
    }

    /// Returns whether `user_id` likes the post afterwards.
    pub async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<bool> {
        let mut transaction = self.pool.begin().await?;

        let removed = query(
            "
            DELETE FROM interactions.interactions
            WHERE
                interactions.user_snowflake = $1
                AND interactions.post_snowflake = $2
                AND interactions.action = 'like'
            ",
        )
        .bind(user_id.to_db())
        .bind(post_id.to_db())
        .execute(&mut *transaction)
        .await?;

        let liked = removed.rows_affected() == 0;
        if liked {
            self.append_interaction(&mut transaction, user_id, post_id, Action::Like)
                .await?;
        }

        transaction.commit().await?;

        Ok(liked)
    }

    pub async fn record_view(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        let mut connection = self.pool.acquire().await?;

        self.append_interaction(&mut connection, user_id, post_id, Action::View)
            .await
    }

    pub async fn add_comment(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
        body: &CommentBody,
    ) -> Result<Comment> {
        let comment_id = self.next_id()?;

        let mut transaction = self.pool.begin().await?;

        query(
            "
            INSERT INTO posts.comments (comment_snowflake, post_snowflake, user_snowflake, body)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(comment_id.to_db())
        .bind(post_id.to_db())
        .bind(user_id.to_db())
        .bind(body.get())
        .execute(&mut *transaction)
        .await?;

        self.append_interaction(&mut transaction, user_id, post_id, Action::Comment)
            .await?;
        transaction.commit().await?;

        Ok(Comment {
            id: comment_id,
            post_id,
            author_id: user_id,
            body: body.clone(),
        })
    }

    /// Comments on a post, oldest first.
    pub async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.user_snowflake,
                comments.body
            FROM
                posts.comments
            WHERE
                comments.post_snowflake = $1
            ORDER BY
                comments.comment_snowflake
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn fetch_post_stats(&self, post_id: Id<PostMarker>) -> Result<PostStats> {
        let record = query_as::<_, PostStatsRecord>(
            "
            SELECT
                count(*) FILTER (WHERE interactions.action = 'like') AS likes,
                count(*) FILTER (WHERE interactions.action = 'comment') AS comments,
                count(*) FILTER (WHERE interactions.action = 'view') AS views
            FROM
                interactions.interactions
            WHERE
                interactions.post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Returns whether `follower` follows `followee` afterwards.
    pub async fn toggle_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        if follower == followee {
            return Err(DbError::SelfFollow);
        }

        let mut transaction = self.pool.begin().await?;

        let removed = query(
            "
            DELETE FROM users.follows
            WHERE
                follows.follower_snowflake = $1
                AND follows.followee_snowflake = $2
            ",
        )
        .bind(follower.to_db())
        .bind(followee.to_db())
        .execute(&mut *transaction)
        .await?;

        let following = removed.rows_affected() == 0;
        if following {
            query(
                "
                INSERT INTO users.follows (follower_snowflake, followee_snowflake)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(follower.to_db())
            .bind(followee.to_db())
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        Ok(following)
    }

    pub async fn fetch_followers(&self, user_id: Id<UserMarker>) -> Result<Vec<User>> {
        let records = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.handle,
                users.fullname,
                users.bio
            FROM
                users.follows
                JOIN users.users ON users.user_snowflake = follows.follower_snowflake
            WHERE
                follows.followee_snowflake = $1
            ORDER BY
                users.handle
            ",
        )
        .bind(user_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let auth = record.map(Authentication::try_from).transpose()?;
        Ok(auth)
    }

    pub async fn create_auth(&self, auth: &Authentication) -> Result<()> {
        let created_at = PrimitiveDateTime::new(auth.created_at.date(), auth.created_at.time());

        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(auth.token_hash.0.as_slice())
        .bind(auth.user.to_db())
        .bind(created_at)
        .bind(auth.lifetime.map(|lifetime| lifetime.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_interaction(
        &self,
        connection: &mut PgConnection,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
        action: Action,
    ) -> Result<()> {
        let interaction_id: Id<InteractionMarker> = self.next_id()?;

        query(APPEND_INTERACTION_QUERY)
            .bind(interaction_id.to_db())
            .bind(user_id.to_db())
            .bind(post_id.to_db())
            .bind(action.as_str())
            .execute(connection)
            .await?;

        Ok(())
    }
}

fn collect_posts(records: Vec<FullPostRecord>) -> Result<Vec<Post>> {
    let posts = records
        .into_iter()
        .map(Post::try_from)
        .collect::<Result<_, _>>()?;
    Ok(posts)
}

async fn replace_hashtags(
    connection: &mut PgConnection,
    post_id: Id<PostMarker>,
    hashtags: &[HashtagName],
) -> Result<()> {
    let names: Vec<&str> = hashtags.iter().map(HashtagName::get).collect();

    query(
        "
        DELETE FROM posts.post_hashtags
        WHERE post_hashtags.post_snowflake = $1
        ",
    )
    .bind(post_id.to_db())
    .execute(&mut *connection)
    .await?;

    if names.is_empty() {
        return Ok(());
    }

    query(
        "
        INSERT INTO posts.hashtags (name)
        SELECT unnest($1::TEXT[])
        ON CONFLICT (name) DO NOTHING
        ",
    )
    .bind(&names)
    .execute(&mut *connection)
    .await?;

    query(
        "
        INSERT INTO posts.post_hashtags (post_snowflake, hashtag_id, position)
        SELECT $1, hashtags.hashtag_id, names.position
        FROM
            unnest($2::TEXT[]) WITH ORDINALITY AS names (name, position)
            JOIN posts.hashtags ON hashtags.name = names.name
        ",
    )
    .bind(post_id.to_db())
    .bind(&names)
    .execute(&mut *connection)
    .await?;

    Ok(())
}

impl InteractionLog for DbClient {
    type Error = DbError;

    async fn posts_with_action(
        &self,
        user: Id<UserMarker>,
        action: Action,
    ) -> Result<Vec<Id<PostMarker>>> {
        let post_ids = query_scalar::<_, i64>(
            "
            SELECT
                interactions.post_snowflake
            FROM
                interactions.interactions
            WHERE
                interactions.user_snowflake = $1
                AND interactions.action = $2
            GROUP BY
                interactions.post_snowflake
            ORDER BY
                min(interactions.interaction_snowflake)
            ",
        )
        .bind(user.to_db())
        .bind(action.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(post_ids.into_iter().map(Id::from_db).collect())
    }
}

impl ContentStore for DbClient {
    async fn list_all_posts(&self) -> Result<Vec<Post>> {
        self.fetch_all_posts().await
    }

    async fn get_post(&self, id: Id<PostMarker>) -> Result<Option<Post>> {
        self.fetch_post(id).await
    }

    async fn get_user(&self, id: Id<UserMarker>) -> Result<Option<User>> {
        self.fetch_user(id).await
    }

    async fn list_recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        self.fetch_recent_posts(limit).await
    }

    // interactions cascade with their post, so every liked id resolves
    async fn list_liked_posts(
        &self,
        user: Id<UserMarker>,
    ) -> Result<Vec<Post>, FeedError<DbError>> {
        self.fetch_liked_posts(user).await.map_err(FeedError::Store)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::APPEND_INTERACTION_QUERY;

    #[test]
    fn likes_are_unique_per_user_and_post() {
        let migrator = sqlx::migrate!();
        let like_once = migrator
            .iter()
            .find(|migration| migration.description == "like once")
            .unwrap();

        assert!(like_once.sql.contains("CREATE UNIQUE INDEX interactions_like_once_idx"));
        assert!(like_once.sql.contains("WHERE action = 'like'"));
        // duplicates from before the index existed are removed first
        let dedup = like_once.sql.find("DELETE FROM").unwrap();
        let index = like_once.sql.find("CREATE UNIQUE INDEX").unwrap();
        assert!(dedup < index);
    }

    #[test]
    fn appending_a_like_twice_is_a_no_op() {
        assert!(APPEND_INTERACTION_QUERY.contains(
            "ON CONFLICT (user_snowflake, post_snowflake) WHERE action = 'like' DO NOTHING"
        ));
    }

    #[test]
    fn migrations_are_ordered() {
        let migrator = sqlx::migrate!();
        let descriptions: Vec<_> = migrator
            .iter()
            .map(|migration| (migration.version, migration.description.as_ref()))
            .collect();

        assert_eq!(descriptions, [(1, "init"), (2, "like once"), (3, "profiles")]);
    }
}
