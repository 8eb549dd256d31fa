//! Repository for the `dogs` table.

use sqlx::PgPool;

use super::like_pattern;
use crate::models::DogRow;

const COLUMNS: &str = "id, client_id, name, breed, notes, created_at, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct DogInput {
    pub client_id: i64,
    pub name: String,
    pub breed: Option<String>,
    pub notes: Option<String>,
}

pub struct DogRepo;

impl DogRepo {
    pub async fn create(pool: &PgPool, input: &DogInput) -> Result<DogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO dogs (client_id, name, breed, notes)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DogRow>(&query)
            .bind(input.client_id)
            .bind(&input.name)
            .bind(&input.breed)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<DogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM dogs WHERE id = $1");
        sqlx::query_as::<_, DogRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Dogs ordered by name, optionally for one client and/or matching
    /// `search` on name or breed.
    pub async fn list(
        pool: &PgPool,
        client_id: Option<i64>,
        search: Option<&str>,
    ) -> Result<Vec<DogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dogs
             WHERE ($1::bigint IS NULL OR client_id = $1)
               AND ($2::text IS NULL OR name ILIKE $2 OR breed ILIKE $2)
             ORDER BY name ASC, id ASC
             LIMIT 500"
        );
        sqlx::query_as::<_, DogRow>(&query)
            .bind(client_id)
            .bind(like_pattern(search))
            .fetch_all(pool)
            .await
    }

    pub async fn update(pool: &PgPool, id: i64, input: &DogInput) -> Result<Option<DogRow>, sqlx::Error> {
        let query = format!(
            "UPDATE dogs SET
                client_id = $2,
                name = $3,
                breed = $4,
                notes = $5,
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DogRow>(&query)
            .bind(id)
            .bind(input.client_id)
            .bind(&input.name)
            .bind(&input.breed)
            .bind(&input.notes)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM dogs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Ids of the dogs actually removed.
    pub async fn delete_many(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("DELETE FROM dogs WHERE id = ANY($1) RETURNING id")
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
