//! # notable-db
//!
//! Storage layer for notable.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL note and user repositories
//! - In-memory repositories for tests and local runs
//! - A per-note lock registry and the [`NoteMutator`], which serializes
//!   read-modify-write updates of a note's tag and attachment lists
//!
//! ## Example
//!
//! ```rust,ignore
//! use notable_db::{Database, NoteMutator, NoteRepository, CreateNoteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/notable").await?;
//!
//!     let note = db.notes.insert(CreateNoteRequest {
//!         user_id: 1,
//!         title: "Groceries".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     let mutator = NoteMutator::new(std::sync::Arc::new(db.notes.clone()));
//!     mutator.add_tag(note.id, "home").await?;
//!     Ok(())
//! }
//! ```
pub mod locks;
pub mod memory;
pub mod mutator;
pub mod notes;
pub mod pool;
pub mod users;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use notable_core::*;

pub use locks::NoteLocks;
pub use memory::{MemoryNoteRepository, MemoryUserRepository};
pub use mutator::NoteMutator;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use users::PgUserRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note repository.
    pub notes: PgNoteRepository,
    /// Local user repository.
    pub users: PgUserRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
