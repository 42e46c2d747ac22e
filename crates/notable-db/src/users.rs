//! Local user repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use notable_core::{Error, NewUser, Result, User, UserRepository};

const USER_COLUMNS: &str = "id, email, username, phone_number, provider_uid, created_at";

fn map_row_to_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        phone_number: row.get("phone_number"),
        provider_uid: row.get("provider_uid"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(map_row_to_user))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO users (email, username, phone_number, provider_uid, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.phone_number)
            .bind(&user.provider_uid)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => Error::Conflict(format!(
                    "user with email {} already exists",
                    user.email
                )),
                _ => Error::Database(e),
            })?;
        Ok(map_row_to_user(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by("email", email).await
    }

    async fn find_by_provider_uid(&self, uid: &str) -> Result<Option<User>> {
        self.find_by("provider_uid", uid).await
    }
}
