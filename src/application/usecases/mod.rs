pub mod enqueue_mail;
pub mod retry_deferred;

pub use enqueue_mail::{EnqueueMailRequest, EnqueueMailUseCase};
pub use retry_deferred::RetryDeferredUseCase;
