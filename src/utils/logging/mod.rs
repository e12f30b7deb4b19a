//! Logging utilities for output and progress tracking
//!
//! Operation and metro level log helpers plus indicatif progress bars.

pub mod log;
pub mod progress;

pub use log::{
    log_metro_failure, log_metro_start, log_operation_complete, log_operation_start, log_warning,
};
pub use progress::{create_main_progress_bar, create_spinner, finish_progress_bar};

/// Initialise `env_logger` with `info` as the default filter. `RUST_LOG`
/// overrides it. Calling this more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
