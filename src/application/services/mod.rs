pub mod lock;
pub mod transport;

pub use lock::{DispatchLock, LockError, LockGuard, NoopLock};
pub use transport::{MailTransport, TransportError};
