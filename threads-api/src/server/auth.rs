use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use threads_common::model::{Id, auth::AuthToken, user::UserMarker};
use threads_db::DbClient;
use threads_feed::Viewer;
use time::UtcDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken =
            <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?
                .token()
                .parse()?;

        let token_hash = request_token.hash()?;

        let authentication = Arc::<DbClient>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        // a token is only valid for the user it was issued to
        if authentication.user != request_token.user_id
            || authentication.is_expired_at(UtcDateTime::now())
        {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
        })
    }
}

/// A missing `Authorization` header yields `None`, a present but invalid one
/// is still rejected.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Self as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(ServerError::InvalidAuthorizationHeader(rejection)) if rejection.is_missing() => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

impl From<AuthenticatedUser> for Viewer {
    fn from(value: AuthenticatedUser) -> Self {
        Viewer::User(value.user_id())
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{ServerError, auth::AuthenticatedUser, tests::unreachable_db};
    use axum::{
        extract::{FromRequestParts, OptionalFromRequestParts},
        http::{Request, StatusCode, header::AUTHORIZATION, request::Parts},
    };
    use threads_common::model::Id;
    use threads_feed::Viewer;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut request = Request::builder().uri("/feed");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        request.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = unreachable_db();

        let error =
            <AuthenticatedUser as FromRequestParts<_>>::from_request_parts(&mut parts(None), &state)
                .await
                .unwrap_err();

        assert!(matches!(error, ServerError::InvalidAuthorizationHeader(_)));
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_header_is_anonymous_when_optional() {
        let state = unreachable_db();

        let user = <AuthenticatedUser as OptionalFromRequestParts<_>>::from_request_parts(
            &mut parts(None),
            &state,
        )
        .await
        .unwrap();

        assert_eq!(user, None);
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        let state = unreachable_db();

        for authorization in ["Basic dXNlcjpwdw==", "Bearer not-a-token"] {
            let error = <AuthenticatedUser as OptionalFromRequestParts<_>>::from_request_parts(
                &mut parts(Some(authorization)),
                &state,
            )
            .await
            .unwrap_err();

            assert_eq!(error.status(), StatusCode::BAD_REQUEST, "{authorization}");
        }
    }

    #[test]
    fn authenticated_user_views_as_themselves() {
        let user = AuthenticatedUser { id: Id::from(42) };

        assert_eq!(Viewer::from(user), Viewer::User(Id::from(42)));
    }
}
