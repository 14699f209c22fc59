//! Relational Store Access
//!
//! Connection bootstrap plus the chunked, retrying reference-data readers.

pub mod reference_repo;
pub mod retry;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use reference_repo::{ReferenceReader, SqlReferenceRepository};

/// Database handle owning the connection pool.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }
}
