use regex::Regex;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{collections::HashSet, sync::LazyLock};
use thiserror::Error;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hardcoded hashtag regex is invalid"));

static HASHTAG_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("hardcoded hashtag name regex is invalid"));

/// Name of a hashtag: lowercase, without the leading `#`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct HashtagName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The hashtag name is invalid: {0:?}")]
pub struct InvalidHashtagNameError(String);

impl HashtagName {
    /// Accepts a name with or without the leading marker.
    pub fn new(name: &str) -> Result<Self, InvalidHashtagNameError> {
        let bare = name.strip_prefix('#').unwrap_or(name);
        if !HASHTAG_NAME_REGEX.is_match(bare) {
            return Err(InvalidHashtagNameError(name.to_owned()));
        }

        Ok(Self(bare.to_lowercase()))
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

impl<'de> Deserialize<'de> for HashtagName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        HashtagName::new(&inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"a hashtag name"))
    }
}

/// Extracts the hashtags of a post body in order of first appearance.
///
/// Every `#` directly followed by word characters marks a hashtag. Names are
/// lowercased, so `#Rust` and `#rust` are the same tag.
#[must_use]
pub fn extract_hashtags(content: &str) -> Vec<HashtagName> {
    let mut seen = HashSet::new();

    HASHTAG_REGEX
        .captures_iter(content)
        .map(|captures| HashtagName(captures[1].to_lowercase()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
