//! A content store that lives entirely in process memory.
//!
//! It keeps the same write rules as the database store: hashtags are
//! re-extracted on every content write and likes toggle. Useful for tests and
//! for embedding the recommender without a database.

use crate::store::{ContentStore, InteractionLog};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use threads_common::{
    model::{
        Id, ThreadsSnowflakeGenerator,
        comment::{Comment, CommentBody},
        hashtag::{HashtagName, extract_hashtags},
        interaction::{Action, Interaction},
        post::{Post, PostMarker, PostStats},
        user::{InvalidUserHandleError, Profile, User, UserHandle, UserMarker},
    },
    snowflake::{NodeId, SnowflakeError},
};
use time::UtcDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum MemoryStoreError {
    #[error(transparent)]
    Snowflake(#[from] SnowflakeError),
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error("The handle {0:?} is already taken")]
    HandleTaken(String),
    #[error("User with id {0} does not exist")]
    UnknownUser(Id<UserMarker>),
    #[error("Post with id {0} does not exist")]
    UnknownPost(Id<PostMarker>),
}

type Result<T, E = MemoryStoreError> = std::result::Result<T, E>;

#[derive(Clone, Debug)]
struct StoredPost {
    author: Id<UserMarker>,
    content: Option<String>,
    hashtags: Vec<HashtagName>,
}

#[derive(Clone, Debug)]
pub struct MemoryStore {
    generator: ThreadsSnowflakeGenerator,
    users: BTreeMap<Id<UserMarker>, User>,
    posts: BTreeMap<Id<PostMarker>, StoredPost>,
    interactions: Vec<Interaction>,
    comments: Vec<Comment>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(NodeId::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            generator: ThreadsSnowflakeGenerator::new(node),
            users: BTreeMap::new(),
            posts: BTreeMap::new(),
            interactions: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn create_user(&mut self, handle: &str) -> Result<User> {
        let handle = UserHandle::new(handle.to_owned())?;
        if self.users.values().any(|user| user.handle == handle) {
            return Err(MemoryStoreError::HandleTaken(handle.into_inner()));
        }

        let user = User {
            id: self.generator.generate()?.into(),
            handle,
            profile: Profile::default(),
        };
        self.users.insert(user.id, user.clone());

        Ok(user)
    }

    pub fn create_post(&mut self, author: Id<UserMarker>, content: Option<&str>) -> Result<Post> {
        self.create_post_at(author, content, UtcDateTime::now())
    }

    /// Creates a post as if it was written at `time`.
    pub fn create_post_at(
        &mut self,
        author: Id<UserMarker>,
        content: Option<&str>,
        time: UtcDateTime,
    ) -> Result<Post> {
        self.user(author)?;

        let id = self.generator.generate_at(time)?.into();
        self.posts.insert(
            id,
            StoredPost {
                author,
                content: content.map(str::to_owned),
                hashtags: content.map(extract_hashtags).unwrap_or_default(),
            },
        );

        self.post(id)
    }

    /// Replaces the content and with it the whole hashtag set.
    pub fn update_post_content(
        &mut self,
        id: Id<PostMarker>,
        content: Option<&str>,
    ) -> Result<Post> {
        let stored = self
            .posts
            .get_mut(&id)
            .ok_or(MemoryStoreError::UnknownPost(id))?;
        stored.content = content.map(str::to_owned);
        stored.hashtags = content.map(extract_hashtags).unwrap_or_default();

        self.post(id)
    }

    /// Returns whether `user` likes `post` afterwards.
    pub fn toggle_like(&mut self, user: Id<UserMarker>, post: Id<PostMarker>) -> Result<bool> {
        self.user(user)?;
        self.post(post)?;

        let is_like = |interaction: &Interaction| {
            interaction.user == user && interaction.post == post && interaction.action == Action::Like
        };

        if self.interactions.iter().any(is_like) {
            self.interactions.retain(|interaction| !is_like(interaction));
            Ok(false)
        } else {
            self.append(user, post, Action::Like)?;
            Ok(true)
        }
    }

    pub fn record_view(&mut self, user: Id<UserMarker>, post: Id<PostMarker>) -> Result<()> {
        self.user(user)?;
        self.post(post)?;

        self.append(user, post, Action::View)
    }

    pub fn add_comment(
        &mut self,
        user: Id<UserMarker>,
        post: Id<PostMarker>,
        body: CommentBody,
    ) -> Result<Comment> {
        self.user(user)?;
        self.post(post)?;

        let comment = Comment {
            id: self.generator.generate()?.into(),
            post_id: post,
            author_id: user,
            body,
        };
        self.comments.push(comment.clone());
        self.append(user, post, Action::Comment)?;

        Ok(comment)
    }

    #[must_use]
    pub fn comments(&self, post: Id<PostMarker>) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|comment| comment.post_id == post)
            .cloned()
            .collect()
    }

    pub fn post_stats(&self, post: Id<PostMarker>) -> Result<PostStats> {
        self.post(post)?;

        let count = |action| {
            self.interactions
                .iter()
                .filter(|interaction| interaction.post == post && interaction.action == action)
                .count() as u64
        };

        Ok(PostStats {
            likes: count(Action::Like),
            comments: count(Action::Comment),
            views: count(Action::View),
        })
    }

    fn append(&mut self, user: Id<UserMarker>, post: Id<PostMarker>, action: Action) -> Result<()> {
        self.interactions.push(Interaction {
            id: self.generator.generate()?.into(),
            user,
            post,
            action,
        });

        Ok(())
    }

    fn user(&self, id: Id<UserMarker>) -> Result<&User> {
        self.users.get(&id).ok_or(MemoryStoreError::UnknownUser(id))
    }

    fn post(&self, id: Id<PostMarker>) -> Result<Post> {
        let stored = self.posts.get(&id).ok_or(MemoryStoreError::UnknownPost(id))?;

        Ok(Post {
            id,
            author: self.user(stored.author)?.clone(),
            content: stored.content.clone(),
            hashtags: stored.hashtags.clone(),
        })
    }
}

impl InteractionLog for MemoryStore {
    type Error = MemoryStoreError;

    async fn posts_with_action(
        &self,
        user: Id<UserMarker>,
        action: Action,
    ) -> Result<Vec<Id<PostMarker>>> {
        let mut seen = HashSet::new();

        Ok(self
            .interactions
            .iter()
            .filter(|interaction| interaction.user == user && interaction.action == action)
            .map(|interaction| interaction.post)
            .filter(|&post| seen.insert(post))
            .collect())
    }
}

impl ContentStore for MemoryStore {
    async fn list_all_posts(&self) -> Result<Vec<Post>> {
        self.posts.keys().map(|&id| self.post(id)).collect()
    }

    async fn get_post(&self, id: Id<PostMarker>) -> Result<Option<Post>> {
        if self.posts.contains_key(&id) {
            self.post(id).map(Some)
        } else {
            Ok(None)
        }
    }

    async fn get_user(&self, id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::{MemoryStore, MemoryStoreError};
    use crate::store::{ContentStore, InteractionLog};
    use threads_common::model::{
        Id,
        comment::CommentBody,
        hashtag::HashtagName,
        interaction::Action,
        post::PostStats,
    };

    fn hashtags(names: &[&str]) -> Vec<HashtagName> {
        names.iter().map(|name| HashtagName::new(name).unwrap()).collect()
    }

    #[tokio::test]
    async fn like_toggle_restores_previous_state() {
        let mut store = MemoryStore::default();
        let user = store.create_user("liker").unwrap().id;
        let post = store.create_post(user, Some("hello")).unwrap().id;

        let before = store.posts_with_action(user, Action::Like).await.unwrap();
        assert!(before.is_empty());

        assert!(store.toggle_like(user, post).unwrap());
        assert_eq!(
            store.posts_with_action(user, Action::Like).await.unwrap(),
            [post]
        );

        assert!(!store.toggle_like(user, post).unwrap());
        assert_eq!(
            store.posts_with_action(user, Action::Like).await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn actions_are_listed_once_in_first_event_order() {
        let mut store = MemoryStore::default();
        let user = store.create_user("viewer").unwrap().id;
        let first = store.create_post(user, Some("first")).unwrap().id;
        let second = store.create_post(user, Some("second")).unwrap().id;

        store.record_view(user, second).unwrap();
        store.record_view(user, first).unwrap();
        store.record_view(user, second).unwrap();

        assert_eq!(
            store.posts_with_action(user, Action::View).await.unwrap(),
            [second, first]
        );
        assert!(
            store
                .posts_with_action(user, Action::Comment)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            store
                .posts_with_action(Id::from(12_345), Action::View)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn content_updates_replace_hashtags() {
        let mut store = MemoryStore::default();
        let user = store.create_user("writer").unwrap().id;
        let post = store.create_post(user, Some("#Rust and #sqlx #rust")).unwrap();
        assert_eq!(post.hashtags, hashtags(&["rust", "sqlx"]));

        let updated = store
            .update_post_content(post.id, Some("now about #axum"))
            .unwrap();
        assert_eq!(updated.hashtags, hashtags(&["axum"]));

        let cleared = store.update_post_content(post.id, None).unwrap();
        assert!(cleared.hashtags.is_empty());
        assert_eq!(store.get_post(post.id).await.unwrap(), Some(cleared));
    }

    #[test]
    fn comments_and_stats() {
        let mut store = MemoryStore::default();
        let author = store.create_user("author").unwrap().id;
        let reader = store.create_user("reader").unwrap().id;
        let post = store.create_post(author, Some("story")).unwrap().id;

        store.toggle_like(reader, post).unwrap();
        store.record_view(reader, post).unwrap();
        store.record_view(author, post).unwrap();
        let comment = store
            .add_comment(reader, post, CommentBody::new("great".to_owned()).unwrap())
            .unwrap();

        assert_eq!(store.comments(post), [comment]);
        assert_eq!(
            store.post_stats(post).unwrap(),
            PostStats {
                likes: 1,
                comments: 1,
                views: 2,
            }
        );
    }

    #[test]
    fn write_errors() {
        let mut store = MemoryStore::default();
        let user = store.create_user("taken").unwrap().id;

        assert_eq!(
            store.create_user("taken"),
            Err(MemoryStoreError::HandleTaken("taken".to_owned()))
        );
        assert!(matches!(
            store.create_user("has space"),
            Err(MemoryStoreError::UserHandle(_))
        ));
        assert_eq!(
            store.create_post(Id::from(1), None),
            Err(MemoryStoreError::UnknownUser(Id::from(1)))
        );
        assert_eq!(
            store.toggle_like(user, Id::from(2)),
            Err(MemoryStoreError::UnknownPost(Id::from(2)))
        );
    }
}
