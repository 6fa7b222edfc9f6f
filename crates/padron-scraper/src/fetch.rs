//! HTTP transport used for every portal request.

use std::time::Duration;

use reqwest::header;

use crate::challenge;
use crate::error::ScrapeError;
use crate::session::SessionState;

/// Thin wrapper over [`reqwest::Client`] that owns the request headers the
/// portals expect and round-trips cookies through [`SessionState`].
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Creates a fetcher with the configured timeout and user-agent.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Setup`] if the underlying client cannot be
    /// constructed (e.g. invalid TLS config); this aborts before any network
    /// activity.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ScrapeError::Setup {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Fetcher { client })
    }

    /// Fetches one page, replaying the session's cookies and absorbing any
    /// `Set-Cookie` response headers back into it.
    ///
    /// Non-2xx responses whose body classifies as an anti-bot challenge are
    /// returned as `Ok` so the challenge monitor can take over; interstitial
    /// pages frequently ship behind 403/503 statuses.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::Fetch`] — network/transport failure.
    /// - [`ScrapeError::UnexpectedStatus`] — non-2xx without a challenge body.
    pub async fn get(&self, url: &str, session: &mut SessionState) -> Result<String, ScrapeError> {
        let fetch_err = |source: reqwest::Error| ScrapeError::Fetch {
            url: url.to_owned(),
            source,
        };

        let mut request = self
            .client
            .get(url)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "es-ES,es;q=0.9,en;q=0.8")
            .header(header::REFERER, "https://www.google.com/");

        if !session.cookies.is_empty() {
            let cookie_header = session
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(header::COOKIE, cookie_header);
        }

        let response = request.send().await.map_err(fetch_err)?;
        let status = response.status();

        for value in response.headers().get_all(header::SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                if let Some((name, val)) = raw.split(';').next().and_then(|p| p.split_once('=')) {
                    session
                        .cookies
                        .insert(name.trim().to_owned(), val.trim().to_owned());
                }
            }
        }

        let body = response.text().await.map_err(fetch_err)?;

        if !status.is_success() {
            if challenge::classify(&body).is_blocking() {
                tracing::debug!(url, status = status.as_u16(), "challenge body behind non-2xx");
                return Ok(body);
            }
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(body)
    }
}
