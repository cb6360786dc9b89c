//! Durable import job queue
//!
//! A SQLite-backed work queue with at-most-one active claim per job id
//! (the primary key doubles as the dedup key) and bounded redelivery:
//! each job gets `max_attempts` deliveries with exponential backoff
//! before the worker abandons it.

use chrono::Utc;
use shelfmark_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A claimed queue entry
#[derive(Debug, Clone, Copy)]
pub struct QueueClaim {
    pub job_id: Uuid,
    /// Delivery attempt number, counting this claim (1-based)
    pub attempts: i64,
}

/// Enqueue a job; a duplicate enqueue of the same job id is a no-op
pub async fn enqueue(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO import_queue (job_id, enqueued_at, attempts, next_attempt_at)
        VALUES (?, ?, 0, ?)
        "#,
    )
    .bind(job_id.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Claim the oldest due job, marking the delivery attempt
///
/// Returns None when nothing is due. The claim is taken inside a
/// transaction so a concurrent claimer cannot grab the same entry.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<QueueClaim>> {
    let now = Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        SELECT job_id, attempts FROM import_queue
        WHERE claimed_at IS NULL AND next_attempt_at <= ?
        ORDER BY enqueued_at
        LIMIT 1
        "#,
    )
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    let job_id: String = row.get("job_id");
    let attempts: i64 = row.get("attempts");

    sqlx::query("UPDATE import_queue SET claimed_at = ?, attempts = attempts + 1 WHERE job_id = ?")
        .bind(now)
        .bind(&job_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(QueueClaim {
        job_id: Uuid::parse_str(&job_id)
            .map_err(|e| shelfmark_common::Error::Internal(format!("Bad job id '{}': {}", job_id, e)))?,
        attempts: attempts + 1,
    }))
}

/// Remove a successfully processed job from the queue
pub async fn complete(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_queue WHERE job_id = ?")
        .bind(job_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Release a failed claim for redelivery after `delay_secs`
pub async fn release_for_retry(pool: &SqlitePool, job_id: Uuid, delay_secs: i64) -> Result<()> {
    let next_attempt_at = Utc::now().timestamp() + delay_secs;

    sqlx::query("UPDATE import_queue SET claimed_at = NULL, next_attempt_at = ? WHERE job_id = ?")
        .bind(next_attempt_at)
        .bind(job_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Drop a job whose delivery attempts are exhausted
pub async fn abandon(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_queue WHERE job_id = ?")
        .bind(job_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_deduplicated() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();

        enqueue(&pool, job_id).await.unwrap();
        enqueue(&pool, job_id).await.unwrap();

        let claim = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claim.job_id, job_id);
        assert_eq!(claim.attempts, 1);
        // The duplicate did not create a second deliverable entry
        assert!(claim_next(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claimed_job_is_not_redelivered_until_released() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();
        enqueue(&pool, job_id).await.unwrap();

        assert!(claim_next(&pool).await.unwrap().is_some());
        assert!(claim_next(&pool).await.unwrap().is_none());

        release_for_retry(&pool, job_id, 0).await.unwrap();
        let claim = claim_next(&pool).await.unwrap().unwrap();
        assert_eq!(claim.attempts, 2);
    }

    #[tokio::test]
    async fn backoff_delays_redelivery() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();
        enqueue(&pool, job_id).await.unwrap();

        claim_next(&pool).await.unwrap().unwrap();
        release_for_retry(&pool, job_id, 3600).await.unwrap();

        // Not due yet
        assert!(claim_next(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn jobs_are_claimed_oldest_first() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        enqueue(&pool, first).await.unwrap();
        // Force distinct enqueue ordering
        sqlx::query("UPDATE import_queue SET enqueued_at = enqueued_at - 10 WHERE job_id = ?")
            .bind(first.to_string())
            .execute(&pool)
            .await
            .unwrap();
        enqueue(&pool, second).await.unwrap();

        assert_eq!(claim_next(&pool).await.unwrap().unwrap().job_id, first);
        assert_eq!(claim_next(&pool).await.unwrap().unwrap().job_id, second);
    }

    #[tokio::test]
    async fn completed_and_abandoned_jobs_leave_the_queue() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();

        enqueue(&pool, job_id).await.unwrap();
        claim_next(&pool).await.unwrap().unwrap();
        complete(&pool, job_id).await.unwrap();
        assert!(claim_next(&pool).await.unwrap().is_none());

        enqueue(&pool, job_id).await.unwrap();
        claim_next(&pool).await.unwrap().unwrap();
        abandon(&pool, job_id).await.unwrap();
        assert!(claim_next(&pool).await.unwrap().is_none());
    }
}
