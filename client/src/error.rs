use std::time::Duration;
use thiserror::Error;

/// Failures specific to nimbus.io requests.  Transport failures are passed through as
/// [`reqwest::Error`] inside the [`anyhow::Error`] returned to the caller.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The response headers arrived, but the status was not one the caller accepts.  The
    /// response body is never read in this case.
    #[error("Invalid HTTP Status: ({code}) {phrase} expecting {expected:?}")]
    Status {
        code: u16,
        phrase: String,
        expected: Vec<u16>,
    },

    /// The consumer of a response stopped the stream before it completed
    #[error("response stream stopped by its consumer")]
    Stopped,

    /// No data arrived on the response stream for the configured idle timeout
    #[error("no data received on response stream for {0:?}")]
    StreamIdle(Duration),

    /// The response relay was dropped before it resolved
    #[error("response relay dropped before completing")]
    Abandoned,
}

/// If this error was due to an unacceptable HTTP status, return that status code.  Errors from
/// any other cause return None.
pub fn err_status_code(err: &anyhow::Error) -> Option<u16> {
    match err.downcast_ref::<RequestError>() {
        Some(RequestError::Status { code, .. }) => Some(*code),
        _ => None,
    }
}
