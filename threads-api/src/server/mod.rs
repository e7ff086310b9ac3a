use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use threads_common::model::{
    Id,
    auth::{AuthTokenDecodeError, AuthTokenHashError, TokenLifetime},
    post::PostMarker,
    user::UserMarker,
};
use threads_db::{DbClient, DbError};
use threads_feed::{FeedError, Recommender};
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub recommender: Arc<Recommender>,
    pub token_lifetime: Option<TokenLifetime>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Building the feed failed: {0}")]
    Feed(#[from] FeedError<DbError>),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("User {user} is not the author of post {post}")]
    NotPostAuthor {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("User {user} cannot edit the profile of user {profile}")]
    NotProfileOwner {
        user: Id<UserMarker>,
        profile: Id<UserMarker>,
    },
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::NotPostAuthor { .. } | ServerError::NotProfileOwner { .. } => {
                StatusCode::FORBIDDEN
            }
            ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(error) | ServerError::Feed(FeedError::Store(error)) => {
                db_status(error)
            }
            ServerError::Feed(FeedError::PostNotFound(_) | FeedError::UserNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::JsonResponse(_) | ServerError::AuthTokenHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn db_status(error: &DbError) -> StatusCode {
    match error {
        DbError::HandleTaken(_) => StatusCode::CONFLICT,
        DbError::SelfFollow => StatusCode::BAD_REQUEST,
        DbError::Data(_) | DbError::Sqlx(_) | DbError::Migrate(_) | DbError::Snowflake(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{ServerError, ServerState};
    use axum::{http::StatusCode, response::IntoResponse};
    use sqlx::postgres::PgPoolOptions;
    use std::{sync::Arc, time::Duration};
    use threads_common::{
        model::{Id, auth::AuthTokenDecodeError},
        snowflake::NodeId,
    };
    use threads_db::{DbClient, DbError};
    use threads_feed::{FeedError, Recommender};

    /// A client whose pool never connects. Anything that reaches the database
    /// fails with a pool timeout.
    pub(crate) fn unreachable_db() -> Arc<DbClient> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("postgres://threads@127.0.0.1:1/threads")
            .unwrap();

        Arc::new(DbClient::new(pool, NodeId::new(0, 0).unwrap()))
    }

    pub(crate) fn unreachable_state() -> ServerState {
        ServerState {
            db_client: unreachable_db(),
            recommender: Arc::new(Recommender::default()),
            token_lifetime: None,
        }
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ServerError::UnknownRoute("/nowhere".parse().unwrap()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::InvalidAuthToken(AuthTokenDecodeError::MissingPart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServerError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::NotPostAuthor {
                user: Id::from(1),
                post: Id::from(2),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::NotProfileOwner {
                user: Id::from(1),
                profile: Id::from(2),
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Database(DbError::HandleTaken("taken".to_owned())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::Database(DbError::SelfFollow).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn feed_error_statuses() {
        assert_eq!(
            ServerError::Feed(FeedError::UserNotFound(Id::from(5))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Feed(FeedError::PostNotFound(Id::from(5))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Feed(FeedError::Store(DbError::Sqlx(sqlx::Error::PoolTimedOut)))
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_response_carries_status() {
        let response = ServerError::PostByIdNotFound(Id::from(9)).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
