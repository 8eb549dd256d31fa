//! Repository for the `clients` table.

use sqlx::PgPool;

use super::like_pattern;
use crate::models::ClientRow;

const COLUMNS: &str = "id, first_name, last_name, phone, email, created_at, updated_at";

/// Validated client values, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub struct ClientRepo;

impl ClientRepo {
    pub async fn create(pool: &PgPool, input: &ClientInput) -> Result<ClientRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO clients (first_name, last_name, phone, email)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClientRow>(&query)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.phone)
            .bind(&input.email)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<ClientRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM clients WHERE id = $1");
        sqlx::query_as::<_, ClientRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Clients ordered by last then first name, optionally filtered by a
    /// case-insensitive match on name, phone or email.
    pub async fn search(pool: &PgPool, search: Option<&str>) -> Result<Vec<ClientRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM clients
             WHERE $1::text IS NULL
                OR first_name ILIKE $1
                OR last_name ILIKE $1
                OR phone ILIKE $1
                OR email ILIKE $1
             ORDER BY last_name ASC, first_name ASC, id ASC
             LIMIT 200"
        );
        sqlx::query_as::<_, ClientRow>(&query)
            .bind(like_pattern(search))
            .fetch_all(pool)
            .await
    }

    /// Overwrite all editable columns. `None` if the client does not exist.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        input: &ClientInput,
    ) -> Result<Option<ClientRow>, sqlx::Error> {
        let query = format!(
            "UPDATE clients SET
                first_name = $2,
                last_name = $3,
                phone = $4,
                email = $5,
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClientRow>(&query)
            .bind(id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.phone)
            .bind(&input.email)
            .fetch_optional(pool)
            .await
    }

    /// Deletes the client; dogs and appointments follow by cascade.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
