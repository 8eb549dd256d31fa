//! Repository for the `appointments` table.
//!
//! `create` and `update` run [`reconcile`] on the merged row inside the
//! write transaction, so a stored status always agrees with `starts_at`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{like_pattern, SortDirection};
use crate::domain::status::{reconcile, AppointmentFields, AppointmentStatus};
use crate::models::{AppointmentDetailRow, AppointmentRow};

const COLUMNS: &str = "id, client_id, dog_id, starts_at, status, notes, created_at, updated_at";

const DETAIL_SELECT: &str = "
    SELECT
      a.id, a.client_id, a.dog_id, a.starts_at, a.status, a.notes, a.created_at, a.updated_at,
      c.first_name AS client_first_name,
      c.last_name  AS client_last_name,
      c.phone      AS client_phone,
      d.name       AS dog_name
    FROM appointments a
    JOIN clients c ON c.id = a.client_id
    JOIN dogs d ON d.id = a.dog_id";

/// Sortable columns of the appointment lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentSort {
    Client,
    Dog,
    StartsAt,
    Status,
    CreatedAt,
}

impl AppointmentSort {
    fn order_by(self, dir: SortDirection) -> String {
        let d = dir.sql();
        match self {
            AppointmentSort::Client => format!("c.last_name {d}, c.first_name {d}"),
            AppointmentSort::Dog => format!("d.name {d}"),
            AppointmentSort::StartsAt => format!("a.starts_at {d} NULLS LAST"),
            AppointmentSort::Status => format!("a.status {d}"),
            AppointmentSort::CreatedAt => format!("a.created_at {d}"),
        }
    }
}

impl FromStr for AppointmentSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "client" => Ok(AppointmentSort::Client),
            "dog" => Ok(AppointmentSort::Dog),
            "starts_at" => Ok(AppointmentSort::StartsAt),
            "status" => Ok(AppointmentSort::Status),
            "created_at" => Ok(AppointmentSort::CreatedAt),
            other => Err(format!("cannot sort by {other}")),
        }
    }
}

/// Partial update. Outer `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentChanges {
    pub client_id: Option<i64>,
    pub dog_id: Option<i64>,
    pub starts_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<Option<String>>,
}

impl AppointmentChanges {
    /// Changes that overwrite every editable field.
    pub fn replace_with(fields: AppointmentFields) -> Self {
        Self {
            client_id: Some(fields.client_id),
            dog_id: Some(fields.dog_id),
            starts_at: Some(fields.starts_at),
            status: Some(fields.status),
            notes: Some(fields.notes),
        }
    }

    pub fn apply_to(&self, current: AppointmentFields) -> AppointmentFields {
        AppointmentFields {
            client_id: self.client_id.unwrap_or(current.client_id),
            dog_id: self.dog_id.unwrap_or(current.dog_id),
            starts_at: self.starts_at.unwrap_or(current.starts_at),
            status: self.status.unwrap_or(current.status),
            notes: self.notes.clone().unwrap_or(current.notes),
        }
    }
}

/// Outcome of [`AppointmentRepo::update_guarded`].
#[derive(Debug)]
pub enum GuardedUpdate {
    Updated(AppointmentRow),
    NotFound,
    /// The row exists but the guard refused it; nothing was written.
    Rejected,
}

pub struct AppointmentRepo;

impl AppointmentRepo {
    /// Insert a new appointment after reconciling its status.
    pub async fn create(pool: &PgPool, fields: AppointmentFields) -> Result<AppointmentRow, sqlx::Error> {
        let fields = reconcile(fields);
        let query = format!(
            "INSERT INTO appointments (client_id, dog_id, starts_at, status, notes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(fields.client_id)
            .bind(fields.dog_id)
            .bind(fields.starts_at)
            .bind(fields.status)
            .bind(&fields.notes)
            .fetch_one(pool)
            .await
    }

    /// Lock the row, merge `changes`, reconcile and write back.
    ///
    /// Returns `None` if no appointment with `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: &AppointmentChanges,
    ) -> Result<Option<AppointmentRow>, sqlx::Error> {
        match Self::update_guarded(pool, id, changes, |_| true).await? {
            GuardedUpdate::Updated(row) => Ok(Some(row)),
            GuardedUpdate::NotFound | GuardedUpdate::Rejected => Ok(None),
        }
    }

    /// Like [`update`](Self::update), but only writes if `guard` accepts the
    /// locked row. The check and the write share one transaction.
    pub async fn update_guarded<F>(
        pool: &PgPool,
        id: i64,
        changes: &AppointmentChanges,
        guard: F,
    ) -> Result<GuardedUpdate, sqlx::Error>
    where
        F: FnOnce(&AppointmentFields) -> bool,
    {
        let mut tx = pool.begin().await?;

        let select = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, AppointmentRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(GuardedUpdate::NotFound);
        };

        let current = current.fields();
        if !guard(&current) {
            return Ok(GuardedUpdate::Rejected);
        }
        let fields = reconcile(changes.apply_to(current));

        let update = format!(
            "UPDATE appointments SET
                client_id = $2,
                dog_id = $3,
                starts_at = $4,
                status = $5,
                notes = $6,
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&update)
            .bind(id)
            .bind(fields.client_id)
            .bind(fields.dog_id)
            .bind(fields.starts_at)
            .bind(fields.status)
            .bind(&fields.notes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(GuardedUpdate::Updated(row))
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<AppointmentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1");
        sqlx::query_as::<_, AppointmentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<AppointmentDetailRow>, sqlx::Error> {
        let query = format!("{DETAIL_SELECT} WHERE a.id = $1");
        sqlx::query_as::<_, AppointmentDetailRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resource list; `search` matches client last name or dog name.
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        sort: AppointmentSort,
        dir: SortDirection,
    ) -> Result<Vec<AppointmentDetailRow>, sqlx::Error> {
        let query = format!(
            "{DETAIL_SELECT}
             WHERE $1::text IS NULL OR c.last_name ILIKE $1 OR d.name ILIKE $1
             ORDER BY {}, a.id DESC
             LIMIT 500",
            sort.order_by(dir)
        );
        sqlx::query_as::<_, AppointmentDetailRow>(&query)
            .bind(like_pattern(search))
            .fetch_all(pool)
            .await
    }

    /// Appointments waiting to be scheduled.
    pub async fn list_pending(
        pool: &PgPool,
        sort: AppointmentSort,
        dir: SortDirection,
    ) -> Result<Vec<AppointmentDetailRow>, sqlx::Error> {
        let query = format!(
            "{DETAIL_SELECT}
             WHERE a.starts_at IS NULL AND a.status = 'pending'
             ORDER BY {}, a.id DESC",
            sort.order_by(dir)
        );
        sqlx::query_as::<_, AppointmentDetailRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Calendar range query, inclusive on both ends.
    pub async fn list_between(
        pool: &PgPool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AppointmentDetailRow>, sqlx::Error> {
        let query = format!(
            "{DETAIL_SELECT}
             WHERE a.starts_at BETWEEN $1 AND $2
             ORDER BY a.starts_at ASC, a.id ASC"
        );
        sqlx::query_as::<_, AppointmentDetailRow>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_client(pool: &PgPool, client_id: i64) -> Result<Vec<AppointmentDetailRow>, sqlx::Error> {
        let query = format!(
            "{DETAIL_SELECT}
             WHERE a.client_id = $1
             ORDER BY a.starts_at DESC NULLS FIRST, a.id DESC"
        );
        sqlx::query_as::<_, AppointmentDetailRow>(&query)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_dog(pool: &PgPool, dog_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM appointments WHERE dog_id = $1")
            .bind(dog_id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Returns the ids actually deleted.
    pub async fn delete_many(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("DELETE FROM appointments WHERE id = ANY($1) RETURNING id")
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored() -> AppointmentFields {
        AppointmentFields {
            client_id: 1,
            dog_id: 1,
            starts_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()),
            status: AppointmentStatus::Confirmed,
            notes: Some("nervous with dryers".into()),
        }
    }

    #[test]
    fn empty_changes_keep_everything() {
        assert_eq!(AppointmentChanges::default().apply_to(stored()), stored());
    }

    #[test]
    fn null_clears_nullable_columns() {
        let changes = AppointmentChanges {
            starts_at: Some(None),
            notes: Some(None),
            ..AppointmentChanges::default()
        };
        let merged = changes.apply_to(stored());
        assert_eq!(merged.starts_at, None);
        assert_eq!(merged.notes, None);
        // clearing the time on a confirmed row reverts it on save
        assert_eq!(reconcile(merged).status, AppointmentStatus::Pending);
    }

    #[test]
    fn notes_only_edit_still_reconciles() {
        let mut blanked = stored();
        blanked.starts_at = None;
        let changes = AppointmentChanges {
            notes: Some(Some("bath only".into())),
            ..AppointmentChanges::default()
        };
        let saved = reconcile(changes.apply_to(blanked));
        assert_eq!(saved.status, AppointmentStatus::Pending);
        assert_eq!(saved.notes.as_deref(), Some("bath only"));
    }

    #[test]
    fn replace_with_overwrites_all() {
        let mut next = stored();
        next.dog_id = 4;
        next.starts_at = None;
        assert_eq!(AppointmentChanges::replace_with(next.clone()).apply_to(stored()), next);
    }

    #[test]
    fn sort_keys() {
        assert_eq!("starts_at".parse::<AppointmentSort>().unwrap(), AppointmentSort::StartsAt);
        assert!("phone".parse::<AppointmentSort>().is_err());
        assert_eq!(
            AppointmentSort::StartsAt.order_by(SortDirection::Desc),
            "a.starts_at DESC NULLS LAST"
        );
        assert_eq!(
            AppointmentSort::Client.order_by(SortDirection::Asc),
            "c.last_name ASC, c.first_name ASC"
        );
    }
}
