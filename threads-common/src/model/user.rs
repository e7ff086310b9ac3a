use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const USER_HANDLE_MAX_LEN: usize = 150;
pub const PROFILE_TEXT_MAX_LEN: usize = 150;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Self-described, freely editable part of an account.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub fullname: ProfileText,
    #[serde(default)]
    pub bio: Option<ProfileText>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateUser {
    pub handle: UserHandle,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Free text of at most 150 characters, possibly empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ProfileText(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("The profile text is longer than 150 characters")]
pub struct ProfileTextTooLongError;

/// A unique, mention-able user name.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserHandle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidUserHandleError {
    #[error("The user handle is empty")]
    Empty,
    #[error("The user handle is longer than 150 characters")]
    TooLong,
    #[error("The user handle contains the invalid character {0:?}")]
    InvalidChar(char),
}

impl UserHandle {
    pub fn new(handle: String) -> Result<Self, InvalidUserHandleError> {
        if handle.is_empty() {
            return Err(InvalidUserHandleError::Empty);
        }
        if handle.chars().count() > USER_HANDLE_MAX_LEN {
            return Err(InvalidUserHandleError::TooLong);
        }
        // '#' and '@' are reserved as hashtag and mention markers
        if let Some(invalid) = handle
            .chars()
            .find(|&c| c.is_whitespace() || c.is_control() || c == '#' || c == '@')
        {
            return Err(InvalidUserHandleError::InvalidChar(invalid));
        }

        Ok(Self(handle))
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

impl ProfileText {
    pub fn new(text: String) -> Result<Self, ProfileTextTooLongError> {
        if text.chars().count() > PROFILE_TEXT_MAX_LEN {
            return Err(ProfileTextTooLongError);
        }

        Ok(Self(text))
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

impl<'de> Deserialize<'de> for ProfileText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ProfileText::new(inner.clone()).map_err(|_| {
            Error::invalid_value(Unexpected::Str(&inner), &"at most 150 characters")
        })
    }
}

impl<'de> Deserialize<'de> for UserHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserHandle::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"a valid user handle"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{
        CreateUser, InvalidUserHandleError, PROFILE_TEXT_MAX_LEN, Profile, ProfileText,
        ProfileTextTooLongError, USER_HANDLE_MAX_LEN, UserHandle,
    };

    #[test]
    fn valid_handles() {
        let longest = "x".repeat(USER_HANDLE_MAX_LEN);
        for handle in ["a", "otabek_01", "Dilnoza.K", longest.as_str()] {
            assert_eq!(UserHandle::new(handle.to_owned()).unwrap().get(), handle);
        }
    }

    #[test]
    fn invalid_handles() {
        assert_eq!(
            UserHandle::new(String::new()),
            Err(InvalidUserHandleError::Empty)
        );
        assert_eq!(
            UserHandle::new("x".repeat(USER_HANDLE_MAX_LEN + 1)),
            Err(InvalidUserHandleError::TooLong)
        );
        assert_eq!(
            UserHandle::new("two words".to_owned()),
            Err(InvalidUserHandleError::InvalidChar(' '))
        );
        assert_eq!(
            UserHandle::new("#tag".to_owned()),
            Err(InvalidUserHandleError::InvalidChar('#'))
        );
    }

    #[test]
    fn profile_text_length() {
        let longest = "ы".repeat(PROFILE_TEXT_MAX_LEN);
        assert_eq!(ProfileText::new(longest.clone()).unwrap().get(), longest);
        assert_eq!(ProfileText::new(String::new()).unwrap().get(), "");
        assert_eq!(
            ProfileText::new("x".repeat(PROFILE_TEXT_MAX_LEN + 1)),
            Err(ProfileTextTooLongError)
        );
    }

    #[test]
    fn create_user_profile_is_optional() {
        let bare: CreateUser = serde_json::from_str(r#"{"handle": "otabek"}"#).unwrap();
        assert_eq!(bare.handle.get(), "otabek");
        assert_eq!(bare.profile, Profile::default());

        let full: CreateUser = serde_json::from_str(
            r#"{"handle": "dilnoza", "fullname": "Dilnoza K", "bio": "writes code"}"#,
        )
        .unwrap();
        assert_eq!(full.profile.fullname.get(), "Dilnoza K");
        assert_eq!(
            full.profile.bio.as_ref().map(ProfileText::get),
            Some("writes code")
        );

        let too_long = format!(r#"{{"handle": "x", "bio": "{}"}}"#, "b".repeat(151));
        assert!(serde_json::from_str::<CreateUser>(&too_long).is_err());
    }
}
