//! Run coordination: discovery, pacing, challenge handling, extraction,
//! and emission for one portal × region pass.

use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use padron_core::{AppConfig, Portal, Region};

use crate::adapter::{adapter_for, CandidateItem, PortalAdapter};
use crate::challenge::{self, ChallengeMonitor};
use crate::emit::{normalize, Emitter};
use crate::error::ScrapeError;
use crate::fetch::Fetcher;
use crate::rate_limit::RateLimiter;
use crate::session::{SessionState, SessionStore};

/// Cooperative cancellation handle shared with signal handlers. Checked
/// between candidates; an in-flight request is allowed to finish so the
/// session state stays coherent.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub portal: Portal,
    pub region: Region,
    /// Stop after this many emitted records.
    pub limit: usize,
    /// Fetch candidate pages for optional enrichment on portals whose
    /// listings already carry the mandatory fields. Off by default; it
    /// doubles the requests against those portals.
    pub details: bool,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub portal: Portal,
    pub region: String,
    /// Candidate pages discovered (before the limit cut).
    pub discovered: usize,
    /// Records written to the output.
    pub emitted: usize,
    /// Candidates dropped for per-item errors or missing mandatory fields.
    pub skipped: usize,
    pub elapsed: Duration,
}

pub struct ScrapeOrchestrator {
    config: AppConfig,
    fetcher: Fetcher,
    limiter: RateLimiter,
    monitor: ChallengeMonitor,
    sessions: SessionStore,
}

impl ScrapeOrchestrator {
    /// Wires up the shared components from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Setup`] when the HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, ScrapeError> {
        let fetcher = Fetcher::new(config.request_timeout_secs, &config.user_agent)?;
        let limiter = RateLimiter::new(config.delay_min_secs, config.delay_max_secs);
        let monitor =
            ChallengeMonitor::new(config.challenge_poll_secs, config.challenge_timeout_secs);
        let sessions = SessionStore::new(config.state_dir.clone());
        Ok(ScrapeOrchestrator {
            config,
            fetcher,
            limiter,
            monitor,
            sessions,
        })
    }

    /// The challenge monitor, exposed so a host can subscribe to status
    /// transitions.
    #[must_use]
    pub fn challenge_monitor(&self) -> &ChallengeMonitor {
        &self.monitor
    }

    /// Runs one portal × region pass and writes NDJSON to `out`.
    ///
    /// Per-item failures are logged and skipped; the run keeps going. Fatal
    /// conditions are session-store write failures and output I/O failures.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Session`] or [`ScrapeError::Setup`] on the
    /// fatal conditions above.
    pub async fn run<W: Write>(
        &self,
        options: &RunOptions,
        out: W,
        cancel: &CancelFlag,
    ) -> Result<RunSummary, ScrapeError> {
        let adapter = adapter_for(options.portal, &self.config);
        self.run_with_adapter(adapter.as_ref(), options, out, cancel)
            .await
    }

    /// [`ScrapeOrchestrator::run`] with a caller-supplied adapter, the seam
    /// used to point a portal at a stand-in server.
    pub async fn run_with_adapter<W: Write>(
        &self,
        adapter: &dyn PortalAdapter,
        options: &RunOptions,
        out: W,
        cancel: &CancelFlag,
    ) -> Result<RunSummary, ScrapeError> {
        let started = Instant::now();
        let interactive = adapter.requires_browser_session() && !self.config.headless;

        tracing::info!(
            portal = %options.portal,
            region = %options.region,
            limit = options.limit,
            "starting scrape run"
        );

        let mut session = if adapter.requires_browser_session() {
            self.sessions.load(options.portal).unwrap_or_default()
        } else {
            SessionState::default()
        };
        if !session.is_empty() {
            tracing::debug!(portal = %options.portal, "resuming persisted session");
        }

        let candidate_budget = (self.config.attempts_factor as usize).saturating_mul(options.limit);
        let candidates = self
            .discover(
                adapter,
                options,
                &mut session,
                interactive,
                candidate_budget,
                cancel,
            )
            .await;
        let discovered = candidates.len();
        tracing::info!(portal = %options.portal, discovered, "discovery finished");

        let mut emitter = Emitter::new(out);
        let mut skipped = 0_usize;

        for item in candidates {
            if emitter.buffered() >= options.limit || cancel.is_cancelled() {
                break;
            }
            match self
                .process_item(adapter, options, item, &mut session, interactive)
                .await
            {
                Ok(Some(record)) => emitter.push(record),
                Ok(None) => skipped += 1,
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        portal = %options.portal,
                        kind = e.kind(),
                        error = %e,
                        "skipping candidate"
                    );
                }
            }
        }

        if adapter.requires_browser_session() && !session.is_empty() {
            self.sessions.save(options.portal, &session)?;
        }

        let emitted = emitter.finish()?;
        let summary = RunSummary {
            portal: options.portal,
            region: options.region.name().to_owned(),
            discovered,
            emitted,
            skipped,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            portal = %summary.portal,
            region = %summary.region,
            discovered = summary.discovered,
            emitted = summary.emitted,
            skipped = summary.skipped,
            elapsed_secs = summary.elapsed.as_secs(),
            "run finished"
        );
        Ok(summary)
    }

    /// Walks the adapter's leg/page schedule until the candidate budget is
    /// met or the schedule is exhausted. Page-level failures end the current
    /// leg, never the run.
    async fn discover(
        &self,
        adapter: &dyn PortalAdapter,
        options: &RunOptions,
        session: &mut SessionState,
        interactive: bool,
        budget: usize,
        cancel: &CancelFlag,
    ) -> Vec<CandidateItem> {
        let mut candidates: Vec<CandidateItem> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        'legs: for leg in 0.. {
            if adapter.search_url(&options.region, leg, 1).is_none() {
                break;
            }
            for page in 1.. {
                if candidates.len() >= budget || cancel.is_cancelled() {
                    break 'legs;
                }
                let Some(url) = adapter.search_url(&options.region, leg, page) else {
                    break;
                };

                self.limiter.wait().await;
                let html = match self
                    .fetch_with_challenge(options.portal, &url, session, interactive)
                    .await
                {
                    Ok(html) => html,
                    Err(e) => {
                        tracing::warn!(
                            portal = %options.portal,
                            leg,
                            page,
                            kind = e.kind(),
                            error = %e,
                            "discovery page failed; ending leg"
                        );
                        break;
                    }
                };

                let items = match adapter.parse_discovery(&html, &options.region, &url) {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!(
                            portal = %options.portal,
                            leg,
                            page,
                            error = %e,
                            "discovery parse failed; ending leg"
                        );
                        break;
                    }
                };
                if items.is_empty() {
                    tracing::debug!(portal = %options.portal, leg, page, "empty page; ending leg");
                    break;
                }

                let mut added = 0_usize;
                for item in items {
                    if seen_urls.insert(item.url.clone()) {
                        candidates.push(item);
                        added += 1;
                    }
                }
                tracing::debug!(portal = %options.portal, leg, page, added, "discovery page parsed");
                if added == 0 {
                    // Pure repeats mean the portal is cycling results.
                    break;
                }
            }
        }
        candidates
    }

    /// Produces one output record from a candidate, fetching its page when
    /// the portal requires or enriches with it. `Ok(None)` means the
    /// candidate had no usable legal name.
    async fn process_item(
        &self,
        adapter: &dyn PortalAdapter,
        options: &RunOptions,
        item: CandidateItem,
        session: &mut SessionState,
        interactive: bool,
    ) -> Result<Option<padron_core::CompanyRecord>, ScrapeError> {
        if adapter.needs_item_fetch() {
            let html = self
                .fetch_item(options.portal, &item.url, session, interactive)
                .await?;
            let extracted = adapter.extract_fields(&html, &item, &options.region)?;
            let merged = item.seed.clone().merge(extracted);
            return Ok(normalize(merged, options.portal, &item.url));
        }

        let Some(base) = normalize(item.seed.clone(), options.portal, &item.url) else {
            return Ok(None);
        };

        if !adapter.supports_detail() || !options.details {
            return Ok(Some(base));
        }

        // Enrichment is best-effort: the listing record stands on its own.
        match self
            .fetch_item(options.portal, &item.url, session, interactive)
            .await
        {
            Ok(html) => match adapter.extract_fields(&html, &item, &options.region) {
                Ok(extra) => {
                    let merged = item.seed.clone().merge(extra);
                    Ok(Some(
                        normalize(merged, options.portal, &item.url).unwrap_or(base),
                    ))
                }
                Err(e) => {
                    tracing::debug!(url = %item.url, error = %e, "enrichment parse failed");
                    Ok(Some(base))
                }
            },
            Err(e) => {
                tracing::debug!(url = %item.url, error = %e, "enrichment fetch failed");
                Ok(Some(base))
            }
        }
    }

    /// One paced candidate-page fetch with bounded retries on transient
    /// failures.
    async fn fetch_item(
        &self,
        portal: Portal,
        url: &str,
        session: &mut SessionState,
        interactive: bool,
    ) -> Result<String, ScrapeError> {
        let mut attempt = 0_u32;
        loop {
            self.limiter.wait().await;
            match self
                .fetch_with_challenge(portal, url, session, interactive)
                .await
            {
                Ok(html) => return Ok(html),
                Err(e) if e.is_retriable() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    tracing::warn!(
                        url,
                        attempt,
                        retries = self.config.fetch_retries,
                        error = %e,
                        "transient fetch failure; retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches a page and routes any anti-bot interstitial through the
    /// challenge monitor, re-fetching once after resolution.
    async fn fetch_with_challenge(
        &self,
        portal: Portal,
        url: &str,
        session: &mut SessionState,
        interactive: bool,
    ) -> Result<String, ScrapeError> {
        let body = self.fetcher.get(url, session).await?;
        let Some(event) = self.monitor.inspect(portal, &body) else {
            return Ok(body);
        };

        self.monitor
            .wait_for_resolution(&self.fetcher, session, &event, url, interactive)
            .await?;

        self.limiter.wait().await;
        let body = self.fetcher.get(url, session).await?;
        if challenge::classify(&body).is_blocking() {
            return Err(ScrapeError::ChallengeTimeout {
                url: url.to_owned(),
                waited_secs: self.config.challenge_timeout_secs,
            });
        }
        Ok(body)
    }
}
