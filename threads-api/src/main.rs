use crate::server::ServerState;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use threads_common::{
    model::auth::{NonPositiveLifetimeError, TokenLifetime},
    snowflake::NodeId,
};
use threads_db::{DbClient, DbError};
use threads_feed::{DEFAULT_FEED_LIMIT, Recommender};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Worker id {worker_id} and process id {process_id} must both be below 32")]
    InvalidNodeId { worker_id: u8, process_id: u8 },
    #[error("Invalid auth token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveLifetimeError),
    #[error("Error connecting to the database: {0}")]
    DatabaseConnect(#[from] sqlx::Error),
    #[error("Error migrating the database: {0}")]
    DatabaseMigrate(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    worker_id: u8,
    process_id: u8,
    #[serde(default = "default_feed_limit")]
    feed_limit: usize,
    auth_token_lifetime_seconds: Option<i64>,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_feed_limit() -> usize {
    DEFAULT_FEED_LIMIT
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "threads_api=debug,\
                threads_common=debug,\
                threads_db=debug,\
                threads_feed=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl-C, shutting down");
            shutdown.cancel();
        }
        Err(error) => error!(%error, "Could not listen for Ctrl-C"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let node = NodeId::new(env.worker_id, env.process_id).ok_or(InitError::InvalidNodeId {
        worker_id: env.worker_id,
        process_id: env.process_id,
    })?;
    let token_lifetime = env
        .auth_token_lifetime_seconds
        .map(TokenLifetime::from_seconds)
        .transpose()?;

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(&env.database_url)
        .await?;
    let db_client = DbClient::new(pool, node);
    db_client.migrate().await?;

    let state = ServerState {
        db_client: Arc::new(db_client),
        recommender: Arc::new(Recommender::default().with_limit(env.feed_limit)),
        token_lifetime,
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, feed_limit = env.feed_limit, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
