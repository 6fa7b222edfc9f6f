use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch error for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("unrecognized page shape on {portal}: {reason}")]
    Parse { portal: &'static str, reason: String },

    #[error("challenge on {url} not resolved within {waited_secs}s")]
    ChallengeTimeout { url: String, waited_secs: u64 },

    #[error("session store failure for {portal}: {source}")]
    Session {
        portal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("setup error: {reason}")]
    Setup { reason: String },
}

impl ScrapeError {
    /// Short stable label for skip logs and run summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Fetch { .. } => "fetch",
            ScrapeError::UnexpectedStatus { .. } => "status",
            ScrapeError::Parse { .. } => "parse",
            ScrapeError::ChallengeTimeout { .. } => "challenge_timeout",
            ScrapeError::Session { .. } => "session",
            ScrapeError::Setup { .. } => "setup",
        }
    }

    /// Transient conditions worth one more attempt: network failures and
    /// server-side 5xx. Parse mismatches and challenge timeouts are not —
    /// retrying cannot change a structural mismatch.
    pub(crate) fn is_retriable(&self) -> bool {
        match self {
            ScrapeError::Fetch { .. } => true,
            ScrapeError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
