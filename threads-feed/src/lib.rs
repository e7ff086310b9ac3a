//! Content-based post recommendations.
//!
//! A viewer's liked posts are folded into a profile document which is
//! compared against every post with TF-IDF weighted cosine similarity.
//! Viewers without a usable profile get the newest posts instead.

pub mod corpus;
pub mod error;
pub mod memory;
pub mod ranker;
pub mod recommend;
pub mod store;
pub mod tfidf;

pub use error::{FeedError, RankError};
pub use recommend::{DEFAULT_FEED_LIMIT, Feed, FeedSource, Recommender, Viewer};
pub use store::{ContentStore, InteractionLog};
