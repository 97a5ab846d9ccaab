use std::io;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("empty address")]
    EmptyAddress,
    #[error("invalid coordinate: {0}")]
    InvalidCoordinateFormat(String),
    #[error("unable to resolve \"{address}\" after {} attempts", attempts.len())]
    UnresolvableAddress {
        address: String,
        attempts: Vec<String>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("timeout")]
    Timeout,
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request error: {0}")]
    Request(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => ProviderError::Auth(err.to_string()),
                404 => ProviderError::NotFound(err.to_string()),
                429 => ProviderError::RateLimited(err.to_string()),
                _ => ProviderError::Request(err.to_string()),
            }
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HazardError {
    #[error("malformed hazard record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error("hazard feed is not a collection")]
    NotACollection,
}

#[derive(thiserror::Error, Debug)]
pub enum StormError {
    #[error("config error: {0}")]
    Config(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("site not found: {0}")]
    SiteNotFound(String),
    #[error("invalid site: {0}")]
    InvalidSite(String),
    #[error("refresh cycle already in progress")]
    CycleInProgress,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Hazard(#[from] HazardError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<rusqlite::Error> for StormError {
    fn from(err: rusqlite::Error) -> Self {
        StormError::Db(err.to_string())
    }
}

impl From<serde_json::Error> for StormError {
    fn from(err: serde_json::Error) -> Self {
        StormError::Db(err.to_string())
    }
}
