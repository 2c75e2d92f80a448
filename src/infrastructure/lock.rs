use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Connection, Postgres, pool::PoolConnection};
use tokio::time::Instant;

use crate::application::services::{DispatchLock, LockError, LockGuard};
use crate::infrastructure::repositories::postgres::PgPool;

/// Advisory key for the "send_mail" lock, shared by every dispatcher
/// instance pointed at the same database.
const SEND_MAIL_LOCK_KEY: i64 = 0x73656e_645f6d61;

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Session-scoped Postgres advisory lock. The lock lives on a dedicated
/// pooled connection; if the holding process dies, its session dies with it
/// and Postgres frees the lock, so a crashed holder cannot wedge dispatch.
pub struct PgAdvisoryLock {
    pool: PgPool,
}

impl PgAdvisoryLock {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    async fn try_acquire(&self) -> anyhow::Result<Option<PoolConnection<Postgres>>> {
        let mut conn = self.pool.acquire().await?;
        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(SEND_MAIL_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await?;
        Ok(locked.then_some(conn))
    }
}

#[async_trait]
impl DispatchLock for PgAdvisoryLock {
    async fn acquire(&self, wait: Option<Duration>) -> Result<Box<dyn LockGuard>, LockError> {
        let deadline = wait.map(|wait| Instant::now() + wait);
        loop {
            if let Some(conn) = self.try_acquire().await.map_err(LockError::Other)? {
                return Ok(Box::new(PgAdvisoryLockGuard { conn }));
            }
            match deadline {
                None => return Err(LockError::AlreadyLocked),
                Some(deadline) if Instant::now() >= deadline => return Err(LockError::Timeout),
                Some(_) => tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await,
            }
        }
    }
}

struct PgAdvisoryLockGuard {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl LockGuard for PgAdvisoryLockGuard {
    async fn release(mut self: Box<Self>) -> anyhow::Result<()> {
        let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(SEND_MAIL_LOCK_KEY)
            .execute(&mut *self.conn)
            .await;
        if unlocked.is_err() {
            // A connection that may still hold the lock must not go back to
            // the pool; closing it ends the session and frees the lock.
            let conn = self.conn.detach();
            let _ = conn.close().await;
        }
        unlocked.map(|_| ()).map_err(Into::into)
    }
}
