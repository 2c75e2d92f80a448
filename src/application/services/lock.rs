use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Cross-process exclusion for `run_pass`. Both lock failures are benign:
/// the engine logs and skips the pass without touching any message state.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("already locked")]
    AlreadyLocked,
    #[error("lock wait timed out")]
    Timeout,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Advisory lock capability guarding a dispatch pass. Implementations must
/// not wedge permanently if a holder crashes: the real lock's session dies
/// with its process and the lock is freed.
#[async_trait]
pub trait DispatchLock: Send + Sync {
    /// Non-blocking when `wait` is `None`; otherwise polls until the bounded
    /// timeout elapses.
    async fn acquire(&self, wait: Option<Duration>) -> Result<Box<dyn LockGuard>, LockError>;
}

#[async_trait]
pub trait LockGuard: Send {
    async fn release(self: Box<Self>) -> anyhow::Result<()>;
}

/// Lock variant for single-process deployments that explicitly disable
/// cross-process exclusion (`--no-lock`).
#[derive(Debug, Default)]
pub struct NoopLock;

struct NoopGuard;

#[async_trait]
impl DispatchLock for NoopLock {
    async fn acquire(&self, _wait: Option<Duration>) -> Result<Box<dyn LockGuard>, LockError> {
        Ok(Box::new(NoopGuard))
    }
}

#[async_trait]
impl LockGuard for NoopGuard {
    async fn release(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
