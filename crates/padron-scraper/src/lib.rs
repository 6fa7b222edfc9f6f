//! Scrape engine: portal adapters, pacing, challenge handling, session
//! persistence, and NDJSON emission, coordinated by the orchestrator.

pub mod adapter;
pub mod challenge;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod portals;
pub mod rate_limit;
pub mod session;

pub use adapter::{adapter_for, CandidateItem, PortalAdapter};
pub use challenge::{classify, ChallengeEvent, ChallengeKind, ChallengeMonitor, MonitorStatus};
pub use emit::{normalize, Emitter};
pub use error::ScrapeError;
pub use fetch::Fetcher;
pub use orchestrator::{CancelFlag, RunOptions, RunSummary, ScrapeOrchestrator};
pub use rate_limit::RateLimiter;
pub use session::{SessionState, SessionStore};
