//! Anti-bot challenge detection and the bounded resolution wait.
//!
//! A challenge is an interstitial (CAPTCHA, WAF block, robot check) served
//! in place of normal page content. The monitor converts an indefinite
//! external obstruction into a bounded, observable operation: it re-polls
//! the blocked page on a fixed interval until the interstitial clears or a
//! ceiling forces a timeout. Interactive challenges (Cloudflare, Incapsula,
//! CAPTCHAs) clear when an operator solves them in the attached browser;
//! rate-limit blocks usually clear on their own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use padron_core::Portal;
use tokio::sync::watch;

use crate::error::ScrapeError;
use crate::fetch::Fetcher;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    None,
    RateLimit,
    Waf,
    Captcha,
    RobotCheck,
}

impl ChallengeKind {
    #[must_use]
    pub fn is_blocking(self) -> bool {
        self != ChallengeKind::None
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeKind::None => "none",
            ChallengeKind::RateLimit => "rate_limit",
            ChallengeKind::Waf => "waf",
            ChallengeKind::Captcha => "captcha",
            ChallengeKind::RobotCheck => "robot_check",
        }
    }
}

const CAPTCHA_INDICATORS: [&str; 4] = [
    "g-recaptcha-response",
    "class=\"g-recaptcha\"",
    "captcha-delivery",
    "hcaptcha-box",
];

const ROBOT_CHECK_INDICATORS: [&str; 9] = [
    "challenge-platform",
    "just a moment",
    "cf-challenge",
    "cf_chl_opt",
    "incapsula",
    "_incapsula_resource",
    "incident_id",
    "capado_robots",
    "control robots",
];

const WAF_INDICATORS: [&str; 2] = ["awswaf", "human verification"];

const RATE_LIMIT_INDICATORS: [&str; 1] = ["too many requests"];

/// Classifies page content as a challenge kind.
///
/// Matching is case-insensitive substring search over the indicator lists;
/// CAPTCHA markers take precedence since CAPTCHA pages often embed vendor
/// challenge-platform scripts as well.
#[must_use]
pub fn classify(content: &str) -> ChallengeKind {
    let lower = content.to_ascii_lowercase();
    let any = |indicators: &[&str]| indicators.iter().any(|i| lower.contains(i));

    if any(&CAPTCHA_INDICATORS) {
        ChallengeKind::Captcha
    } else if any(&ROBOT_CHECK_INDICATORS) {
        ChallengeKind::RobotCheck
    } else if any(&WAF_INDICATORS) {
        ChallengeKind::Waf
    } else if any(&RATE_LIMIT_INDICATORS) {
        ChallengeKind::RateLimit
    } else {
        ChallengeKind::None
    }
}

/// Transient marker for one active block. Discarded once the block resolves
/// or times out.
#[derive(Debug, Clone)]
pub struct ChallengeEvent {
    pub portal: Portal,
    pub kind: ChallengeKind,
    pub detected_at: DateTime<Utc>,
}

/// Observable monitor state, published on a watch channel so a host UI can
/// show "waiting for manual action".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Clear,
    Detected(ChallengeKind),
    WaitingForResolution(ChallengeKind),
    Resolved,
    TimedOut,
}

pub struct ChallengeMonitor {
    poll_interval: Duration,
    timeout: Duration,
    status_tx: watch::Sender<MonitorStatus>,
}

impl ChallengeMonitor {
    #[must_use]
    pub fn new(poll_secs: u64, timeout_secs: u64) -> Self {
        let (status_tx, _) = watch::channel(MonitorStatus::Clear);
        ChallengeMonitor {
            poll_interval: Duration::from_secs(poll_secs),
            timeout: Duration::from_secs(timeout_secs),
            status_tx,
        }
    }

    /// Subscribes to status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Inspects fetched content; returns an event when a blocking challenge
    /// is present.
    #[must_use]
    pub fn inspect(&self, portal: Portal, content: &str) -> Option<ChallengeEvent> {
        let kind = classify(content);
        if !kind.is_blocking() {
            return None;
        }
        let _ = self.status_tx.send(MonitorStatus::Detected(kind));
        tracing::warn!(portal = %portal, kind = kind.as_str(), "bot challenge detected");
        Some(ChallengeEvent {
            portal,
            kind,
            detected_at: Utc::now(),
        })
    }

    /// Blocks until the challenged page clears or the ceiling fires.
    ///
    /// Re-fetches and re-classifies `url` every poll interval. `interactive`
    /// marks human-solvable blocks (a browser window is attached and an
    /// operator is expected to act); self-resolving blocks poll quietly.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::ChallengeTimeout`] when the ceiling fires; the
    /// caller skips the current item and continues the run.
    pub async fn wait_for_resolution(
        &self,
        fetcher: &Fetcher,
        session: &mut SessionState,
        event: &ChallengeEvent,
        url: &str,
        interactive: bool,
    ) -> Result<(), ScrapeError> {
        let _ = self
            .status_tx
            .send(MonitorStatus::WaitingForResolution(event.kind));
        if interactive && event.kind != ChallengeKind::RateLimit {
            tracing::warn!(
                portal = %event.portal,
                kind = event.kind.as_str(),
                timeout_secs = self.timeout.as_secs(),
                "waiting for manual challenge resolution in the browser window"
            );
        } else {
            tracing::warn!(
                portal = %event.portal,
                kind = event.kind.as_str(),
                timeout_secs = self.timeout.as_secs(),
                "challenge detected; polling until it self-resolves"
            );
        }

        let mut waited = Duration::ZERO;
        while waited < self.timeout {
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;

            match fetcher.get(url, session).await {
                Ok(content) => {
                    if classify(&content) == ChallengeKind::None {
                        let _ = self.status_tx.send(MonitorStatus::Resolved);
                        tracing::info!(portal = %event.portal, "challenge resolved; resuming");
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::debug!(url, error = %e, "poll fetch failed; block assumed active");
                }
            }

            if waited.as_secs() > 0 && waited.as_secs() % 30 == 0 {
                tracing::info!(
                    waited_secs = waited.as_secs(),
                    "still waiting for challenge resolution"
                );
            }
        }

        let _ = self.status_tx.send(MonitorStatus::TimedOut);
        tracing::error!(
            portal = %event.portal,
            url,
            timeout_secs = self.timeout.as_secs(),
            "challenge not resolved within the ceiling"
        );
        Err(ScrapeError::ChallengeTimeout {
            url: url.to_owned(),
            waited_secs: self.timeout.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cloudflare_as_robot_check() {
        let html = r#"<html><head><title>Just a moment...</title>
            <script src="/cdn-cgi/challenge-platform/h/b/orchestrate"></script></head></html>"#;
        assert_eq!(classify(html), ChallengeKind::RobotCheck);
    }

    #[test]
    fn classifies_incapsula_as_robot_check() {
        let html = r#"<iframe src="/_Incapsula_Resource?SWUDNSAI=31"></iframe>"#;
        assert_eq!(classify(html), ChallengeKind::RobotCheck);
    }

    #[test]
    fn classifies_recaptcha_as_captcha() {
        let html = r#"<div class="g-recaptcha" data-sitekey="x"></div>"#;
        assert_eq!(classify(html), ChallengeKind::Captcha);
    }

    #[test]
    fn captcha_wins_over_vendor_platform_markers() {
        let html = r#"<script src="/cdn-cgi/challenge-platform/x"></script>
            <textarea name="g-recaptcha-response"></textarea>"#;
        assert_eq!(classify(html), ChallengeKind::Captcha);
    }

    #[test]
    fn classifies_aws_waf() {
        let html = "<html><body>awsWaf token required</body></html>";
        assert_eq!(classify(html), ChallengeKind::Waf);
    }

    #[test]
    fn classifies_rate_limit_page() {
        let html = "<h1>429 Too Many Requests</h1>";
        assert_eq!(classify(html), ChallengeKind::RateLimit);
    }

    #[test]
    fn normal_page_is_clear() {
        let html = "<html><body><h1>Empresas de Barcelona</h1></body></html>";
        assert_eq!(classify(html), ChallengeKind::None);
    }

    #[test]
    fn inspect_publishes_detected_status() {
        let monitor = ChallengeMonitor::new(5, 300);
        let rx = monitor.subscribe();
        let event = monitor
            .inspect(Portal::Empresia, "just a moment")
            .expect("blocking challenge expected");
        assert_eq!(event.kind, ChallengeKind::RobotCheck);
        assert_eq!(
            *rx.borrow(),
            MonitorStatus::Detected(ChallengeKind::RobotCheck)
        );
    }

    #[test]
    fn inspect_is_silent_on_clear_content() {
        let monitor = ChallengeMonitor::new(5, 300);
        let rx = monitor.subscribe();
        assert!(monitor.inspect(Portal::Empresia, "<p>normal</p>").is_none());
        assert_eq!(*rx.borrow(), MonitorStatus::Clear);
    }
}
