pub mod lock;
pub mod repositories;
pub mod transport;
