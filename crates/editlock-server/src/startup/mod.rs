//! Application startup utilities

mod http;
mod logging;
mod shutdown;
mod store;

pub use http::{lock_server, lock_server_on};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
pub use store::init_lock_store;
