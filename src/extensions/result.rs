use std::fmt::Display;

pub trait ResultExt<T> {
    /// Logs the error as an operator diagnostic and drops it.
    fn log_failure(self, what: &str) -> Option<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn log_failure(self, what: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{what} did not take effect: {e}");
                None
            }
        }
    }
}
