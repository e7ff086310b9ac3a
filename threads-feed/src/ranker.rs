//! Ordering candidate posts by similarity to a profile.

use crate::{
    corpus::build_post_document,
    error::RankError,
    tfidf::{TfidfVectorizer, cosine_similarity},
};
use threads_common::model::post::Post;
use tracing::trace;

pub trait Ranker {
    /// Orders `documents` by similarity to `profile`, most similar first.
    ///
    /// The result is a permutation of `0..documents.len()`. Fails with
    /// [`RankError::InsufficientCorpus`] when the documents contain nothing to
    /// compare against.
    fn rank(&self, documents: &[String], profile: &str) -> Result<Vec<usize>, RankError>;
}

/// Ranks by cosine similarity of TF-IDF vectors fitted on the candidates.
///
/// The vocabulary only covers the candidate documents. Profile terms that no
/// candidate contains are dropped, even when they are the bulk of the
/// profile.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TfidfRanker;

impl TfidfRanker {
    /// Similarity of every document to `profile`, in document order.
    pub fn scores(&self, documents: &[String], profile: &str) -> Result<Vec<f64>, RankError> {
        let vectorizer = TfidfVectorizer::fit(documents);
        if vectorizer.is_empty() {
            return Err(RankError::InsufficientCorpus);
        }

        let profile_vector = vectorizer.transform(profile);
        trace!(
            vocabulary_size = vectorizer.vocabulary_size(),
            profile_terms = profile_vector.entries().len(),
            "Fitted candidate vocabulary"
        );

        Ok(documents
            .iter()
            .map(|document| cosine_similarity(&profile_vector, &vectorizer.transform(document)))
            .collect())
    }
}

impl Ranker for TfidfRanker {
    fn rank(&self, documents: &[String], profile: &str) -> Result<Vec<usize>, RankError> {
        let scores = self.scores(documents, profile)?;

        Ok(order_by_score(&scores))
    }
}

/// Indices sorted by descending score. Equal scores keep their input order.
#[must_use]
pub fn order_by_score(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Ranks `candidates` against `profile` and keeps the best `limit`.
pub fn rank_posts<R: Ranker + ?Sized>(
    ranker: &R,
    candidates: &[Post],
    profile: &str,
    limit: usize,
) -> Result<Vec<Post>, RankError> {
    let documents: Vec<String> = candidates.iter().map(build_post_document).collect();
    let order = ranker.rank(&documents, profile)?;

    Ok(order
        .into_iter()
        .filter_map(|index| candidates.get(index))
        .take(limit)
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::error::RankError;
    use crate::ranker::{Ranker, TfidfRanker, order_by_score, rank_posts};
    use threads_common::model::{Id, hashtag::extract_hashtags, post::Post};

    fn post(id: u64, content: &str) -> Post {
        Post {
            id: Id::from(id),
            content: Some(content.to_owned()),
            hashtags: extract_hashtags(content),
            ..Post::default()
        }
    }

    fn documents(contents: &[&str]) -> Vec<String> {
        contents.iter().map(|&content| content.to_owned()).collect()
    }

    #[test]
    fn shared_vocabulary_ranks_higher() {
        let candidates = [post(1, "cat dog #pets"), post(2, "cat"), post(3, "")];

        let ranked = rank_posts(&TfidfRanker, &candidates, "cat dog", 20).unwrap();
        let ids: Vec<u64> = ranked.iter().map(|post| post.id.into()).collect();

        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn scores_of_pet_posts() {
        let scores = TfidfRanker
            .scores(&documents(&["cat dog #pets pets", "cat", ""]), "cat dog")
            .unwrap();

        assert!(scores[0] > scores[1]);
        assert!(scores[1] > scores[2]);
        assert_eq!(scores[2], 0.0);
        assert!((scores[0] - 0.664).abs() < 1e-3);
        assert!((scores[1] - 0.605).abs() < 1e-3);
    }

    #[test]
    fn scores_are_bounded() {
        let scores = TfidfRanker
            .scores(
                &documents(&["rust async", "rust", "python async web", "async"]),
                "rust async rust",
            )
            .unwrap();

        assert!(scores.iter().all(|score| (0.0..=1.0 + 1e-12).contains(score)));
    }

    #[test]
    fn ties_keep_candidate_order() {
        let order = TfidfRanker
            .rank(
                &documents(&["alpha", "beta", "gamma match", "delta", "match"]),
                "match",
            )
            .unwrap();

        assert_eq!(order[0], 4);
        assert_eq!(order[1], 2);
        assert_eq!(&order[2..], [0, 1, 3]);
    }

    #[test]
    fn unrelated_profile_keeps_candidate_order() {
        let order = TfidfRanker
            .rank(&documents(&["one two", "three", "four five"]), "zebra")
            .unwrap();

        assert_eq!(order, [0, 1, 2]);
    }

    #[test]
    fn insufficient_corpus() {
        assert_eq!(
            TfidfRanker.rank(&documents(&["", "", ""]), "cat"),
            Err(RankError::InsufficientCorpus)
        );
        assert_eq!(
            TfidfRanker.rank(&documents(&["a !", "?"]), "cat"),
            Err(RankError::InsufficientCorpus)
        );
        assert_eq!(
            TfidfRanker.rank(&[], "cat"),
            Err(RankError::InsufficientCorpus)
        );
    }

    #[test]
    fn limit_truncates() {
        let candidates: Vec<Post> = (1..=30).map(|id| post(id, "same words")).collect();

        let ranked = rank_posts(&TfidfRanker, &candidates, "words", 20).unwrap();

        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked[0].id, Id::from(1));
        assert_eq!(ranked[19].id, Id::from(20));
    }

    #[test]
    fn order_by_score_is_stable() {
        assert_eq!(order_by_score(&[0.5, 0.9, 0.5, 0.9, 0.0]), [1, 3, 0, 2, 4]);
        assert!(order_by_score(&[]).is_empty());
    }
}
