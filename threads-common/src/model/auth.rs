use crate::model::{Id, user::UserMarker};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by '.'")]
    MissingPart,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// Bearer token handed to a client once. Only its hash is ever stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(pub Box<[u8; AUTH_TOKEN_HASH_LEN]>);

/// How long a token stays valid after it was issued.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct TokenLifetime(Duration);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Token lifetime must be positive, got {0}")]
pub struct NonPositiveLifetimeError(Duration);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: UtcDateTime,
    pub lifetime: Option<TokenLifetime>,
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            core: rand::random(),
            salt: rand::random(),
        }
    }

    /// The `<user id>.<core>.<salt>` form sent in the `Authorization` header.
    #[must_use]
    pub fn to_bearer(&self) -> String {
        let core = Base64Display::new(&self.core, &BASE64_URL_SAFE_NO_PAD);
        let salt = Base64Display::new(&self.salt, &BASE64_URL_SAFE_NO_PAD);

        format!("{}.{core}.{salt}", self.user_id)
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let mut next_part = || parts.next().ok_or(AuthTokenDecodeError::MissingPart);

        let user_id = next_part()?;
        let core = next_part()?;
        let salt = next_part()?;

        Ok(Self {
            user_id: u64::from_str(user_id)
                .map_err(AuthTokenDecodeError::InvalidUserId)?
                .into(),
            core: BASE64_URL_SAFE_NO_PAD
                .decode(core)?
                .try_into()
                .map_err(|_| AuthTokenDecodeError::InvalidCoreLength)?,
            salt: BASE64_URL_SAFE_NO_PAD
                .decode(salt)?
                .try_into()
                .map_err(|_| AuthTokenDecodeError::InvalidSaltLength)?,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthTokenHash(..)")
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Box<[u8]>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        value
            .try_into()
            .map(Self)
            .map_err(|_| InvalidAuthTokenHashError)
    }
}

impl TokenLifetime {
    pub fn new(duration: Duration) -> Result<Self, NonPositiveLifetimeError> {
        if duration.is_positive() {
            Ok(Self(duration))
        } else {
            Err(NonPositiveLifetimeError(duration))
        }
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, NonPositiveLifetimeError> {
        Self::new(Duration::seconds(seconds))
    }

    #[must_use]
    pub fn get(self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn whole_seconds(self) -> i64 {
        self.0.whole_seconds()
    }
}

impl Authentication {
    #[must_use]
    pub fn expires_at(&self) -> Option<UtcDateTime> {
        self.lifetime.map(|lifetime| self.created_at + lifetime.get())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at < now)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        auth::{AuthToken, AuthTokenDecodeError, Authentication, TokenLifetime},
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn bearer_round_trip() {
        let token = AuthToken::generate_random(Id::from(1234));
        let bearer = token.to_bearer();

        assert!(bearer.starts_with("1234."));
        assert_eq!(bearer.parse::<AuthToken>().unwrap(), token);
    }

    #[test]
    fn malformed_bearers() {
        assert_eq!(
            "1234".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::MissingPart)
        );
        assert!(matches!(
            "abc.AAAA.AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert!(matches!(
            "1.!!!.AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::Decode(_))
        ));
        assert_eq!(
            "1.AAAA.AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn hash_depends_on_token() {
        let token = AuthToken::generate_random(Id::from(1));
        let other = AuthToken::generate_random(Id::from(1));

        assert_eq!(token.hash().unwrap(), token.hash().unwrap());
        assert_ne!(token.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn expiry() {
        let token = AuthToken::generate_random(Id::from(1));
        let created_at = utc_datetime!(2025-03-01 08:00);
        let mut authentication = Authentication {
            user: token.user_id,
            token_hash: token.hash().unwrap(),
            created_at,
            lifetime: None,
        };

        assert!(!authentication.is_expired_at(created_at + Duration::days(10_000)));

        authentication.lifetime = Some(TokenLifetime::from_seconds(60).unwrap());
        assert!(!authentication.is_expired_at(created_at + Duration::seconds(60)));
        assert!(authentication.is_expired_at(created_at + Duration::seconds(61)));
    }

    #[test]
    fn lifetime_must_be_positive() {
        assert!(TokenLifetime::from_seconds(0).is_err());
        assert!(TokenLifetime::from_seconds(-5).is_err());
        assert_eq!(TokenLifetime::from_seconds(5).unwrap().whole_seconds(), 5);
    }
}
