use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid source URL `{0}`")]
    InvalidSource(String),
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error("empty date range from {start} to {end}")]
    EmptyRange { start: String, end: String },
    #[cfg(feature = "client")]
    #[error("failed to fetch calendar: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("upstream server responded with status {status}")]
    UpstreamStatus { status: u16 },
    #[error("failed to parse calendar: {0}")]
    Parse(String),
}

impl Error {
    /// Whether the error was caused by the request rather than by the upstream calendar.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSource(_) | Error::InvalidDate(_) | Error::EmptyRange { .. }
        )
    }
}
