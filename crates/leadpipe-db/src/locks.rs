//! Per-job, per-stage mutual exclusion via Postgres advisory locks.
//!
//! The lock is transaction-scoped: it is released on [`StageLock::release`],
//! or when the guard is dropped and the transaction rolls back.

use leadpipe_core::Stage;
use sqlx::{PgPool, Postgres, Transaction};

use crate::DbError;

/// Held for the duration of one batch invocation.
pub struct StageLock {
    tx: Transaction<'static, Postgres>,
    key: i64,
}

impl StageLock {
    #[must_use]
    pub fn key(&self) -> i64 {
        self.key
    }

    /// Releases the lock by committing its (otherwise empty) transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the commit fails.
    pub async fn release(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn lock_key(job_id: i64, stage: Stage) -> i64 {
    job_id.wrapping_mul(8).wrapping_add(stage.lock_code())
}

/// Tries to take the batch lock for `(job_id, stage)` without waiting.
///
/// Returns `None` if another invocation holds it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a connection cannot be acquired or the
/// lock query fails.
pub async fn try_lock_stage(
    pool: &PgPool,
    job_id: i64,
    stage: Stage,
) -> Result<Option<StageLock>, DbError> {
    let key = lock_key(job_id, stage);
    let mut tx = pool.begin().await?;
    let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_xact_lock($1)")
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

    if acquired {
        Ok(Some(StageLock { tx, key }))
    } else {
        tx.rollback().await?;
        Ok(None)
    }
}
