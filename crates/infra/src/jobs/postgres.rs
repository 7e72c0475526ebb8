//! Postgres-backed job store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | JobStoreError | Scenario |
//! |------------|----------------------|---------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent write on the same row |
//! | Database (foreign key violation) | `23503` | `Storage` | Unknown item or printer id |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Row decoding
//!
//! Rows are decoded without enforcing the lifecycle invariant (e.g. an
//! in-progress row with a NULL printer still loads). The completion monitor
//! reports such rows instead of failing the whole listing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use printfarm_core::{ItemId, JobId, PrinterId};
use printfarm_printing::{Item, Job, Status};

use super::store::{JobStore, JobStoreError};

const SELECT_JOB: &str = r#"
    SELECT j.job_id, j.printer_id, j.status_id, j.start_date, j.end_date,
           i.item_id, i.name AS item_name, i.path AS item_path
    FROM job j
    JOIN item i ON i.item_id = j.item_id
"#;

/// Job store over the shared `job`/`item` tables.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Distinguish "row is gone" from "row moved on" after a conditional
    /// update touched nothing.
    async fn rejected_update(&self, job_id: JobId, expected: Status) -> JobStoreError {
        match self.find_by_id(job_id).await {
            Ok(Some(current)) => JobStoreError::Conflict(format!(
                "job {} is {}, expected {}",
                job_id, current.status, expected
            )),
            Ok(None) => JobStoreError::NotFound(job_id),
            Err(e) => e,
        }
    }
}

#[async_trait::async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip_all, fields(status = %status))]
    async fn find_by_status(&self, status: Status) -> Result<Vec<Job>, JobStoreError> {
        let sql = format!("{SELECT_JOB} WHERE j.status_id = $1 ORDER BY j.job_id ASC");
        let rows = sqlx::query(&sql)
            .bind(status.id())
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("find_by_status", e))?;

        rows.iter().map(decode_job).collect()
    }

    #[instrument(skip_all, fields(job_id = %id))]
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let sql = format!("{SELECT_JOB} WHERE j.job_id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(decode_job).transpose()
    }

    async fn exists_by_id(&self, id: JobId) -> Result<bool, JobStoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM job WHERE job_id = $1)")
            .bind(id.get())
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(|e| map_sqlx_error("exists_by_id", e))?;
        Ok(exists)
    }

    #[instrument(skip_all, fields(job_id = %job.id))]
    async fn save(&self, job: &Job) -> Result<Job, JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE job
            SET item_id = $2, printer_id = $3, status_id = $4, start_date = $5, end_date = $6
            WHERE job_id = $1
            "#,
        )
        .bind(job.id.get())
        .bind(job.item.id.get())
        .bind(job.printer_id.map(PrinterId::get))
        .bind(job.status.id())
        .bind(job.started_at)
        .bind(job.ended_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx_error("save", e))?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(job.clone())
    }

    #[instrument(skip_all, fields(item_id = %item.id))]
    async fn insert_waiting(&self, item: Item) -> Result<Job, JobStoreError> {
        let job_id: i64 = sqlx::query_scalar(
            "INSERT INTO job (item_id, status_id) VALUES ($1, $2) RETURNING job_id",
        )
        .bind(item.id.get())
        .bind(Status::Waiting.id())
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx_error("insert_waiting", e))?;

        Ok(Job::waiting(JobId::new(job_id), item))
    }

    #[instrument(skip_all, fields(job_id = %job.id, expected = %expected, to = %job.status))]
    async fn update_if_status(&self, job: &Job, expected: Status) -> Result<Job, JobStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE job
            SET printer_id = $2, status_id = $3, start_date = $4, end_date = $5
            WHERE job_id = $1 AND status_id = $6
            "#,
        )
        .bind(job.id.get())
        .bind(job.printer_id.map(PrinterId::get))
        .bind(job.status.id())
        .bind(job.started_at)
        .bind(job.ended_at)
        .bind(expected.id())
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| map_sqlx_error("update_if_status", e))?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_update(job.id, expected).await);
        }
        Ok(job.clone())
    }

    /// Assign inside one transaction:
    /// 1. Lock the printer row (serializes assigners targeting the same printer)
    /// 2. Reject if another job occupies the printer
    /// 3. Conditionally move the job out of Waiting
    #[instrument(skip_all, fields(job_id = %job.id))]
    async fn assign(&self, job: &Job) -> Result<Job, JobStoreError> {
        let printer_id = match (job.status, job.printer_id) {
            (Status::InProgress, Some(p)) => p,
            _ => {
                return Err(JobStoreError::Conflict(format!(
                    "job {} must be in progress with a printer to be assigned",
                    job.id
                )));
            }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("assign.begin", e))?;

        let locked = sqlx::query("SELECT printer_id FROM printer WHERE printer_id = $1 FOR UPDATE")
            .bind(printer_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("assign.lock_printer", e))?;
        if locked.is_none() {
            return Err(JobStoreError::Conflict(format!(
                "printer {printer_id} is not registered"
            )));
        }

        let occupied: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM job
                WHERE printer_id = $1 AND status_id IN ($2, $3) AND job_id <> $4
            )
            "#,
        )
        .bind(printer_id.get())
        .bind(Status::InProgress.id())
        .bind(Status::AwaitingPickup.id())
        .bind(job.id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("assign.check_printer", e))?;
        if occupied {
            return Err(JobStoreError::Conflict(format!(
                "printer {printer_id} already holds an active job"
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE job
            SET printer_id = $2, status_id = $3, start_date = $4
            WHERE job_id = $1 AND status_id = $5
            "#,
        )
        .bind(job.id.get())
        .bind(printer_id.get())
        .bind(Status::InProgress.id())
        .bind(job.started_at)
        .bind(Status::Waiting.id())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("assign.update", e))?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back and releases the printer lock.
            drop(tx);
            return Err(self.rejected_update(job.id, Status::Waiting).await);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("assign.commit", e))?;
        Ok(job.clone())
    }
}

fn decode_job(row: &sqlx::postgres::PgRow) -> Result<Job, JobStoreError> {
    let decode = |e: sqlx::Error| JobStoreError::Storage(format!("failed to decode job row: {e}"));

    let status_id: i64 = row.try_get("status_id").map_err(decode)?;
    let printer_id: Option<i64> = row.try_get("printer_id").map_err(decode)?;
    let started_at: Option<DateTime<Utc>> = row.try_get("start_date").map_err(decode)?;
    let ended_at: Option<DateTime<Utc>> = row.try_get("end_date").map_err(decode)?;

    Ok(Job {
        id: JobId::new(row.try_get("job_id").map_err(decode)?),
        item: Item {
            id: ItemId::new(row.try_get("item_id").map_err(decode)?),
            name: row.try_get("item_name").map_err(decode)?,
            file_ref: row
                .try_get::<Option<String>, _>("item_path")
                .map_err(decode)?
                .unwrap_or_default(),
        },
        printer_id: printer_id.map(PrinterId::new),
        status: Status::from_id(status_id)?,
        started_at,
        ended_at,
    })
}

/// Map SQLx errors to `JobStoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => JobStoreError::Conflict(msg),
                _ => JobStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
