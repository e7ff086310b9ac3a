//! PostgreSQL backed content store.

mod client;
mod record;

pub use client::{DbClient, DbError, Result};
