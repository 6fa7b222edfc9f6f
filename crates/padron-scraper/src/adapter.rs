//! The portal adapter contract.
//!
//! One adapter per portal knows how to build search URLs and how to read
//! the portal's page shapes. Adapters are pure with respect to I/O: they
//! never fetch, sleep, or retry — all timing, session, and challenge
//! handling belongs to the shared components driven by the orchestrator.

use padron_core::{AppConfig, Portal, RecordDraft, Region};

use crate::error::ScrapeError;
use crate::portals::{
    EinformaAdapter, EmpresiaAdapter, EmpresiteAdapter, EuropagesAdapter, LibreborAdapter,
    PaginasAmarillasAdapter,
};

/// A discovered reference to one prospective company page. Consumed exactly
/// once per scrape pass; discarded after extraction.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    /// The company page URL, also the record's `source_url`.
    pub url: String,
    /// Fields already known at discovery time (listing-card data).
    pub seed: RecordDraft,
}

pub trait PortalAdapter: Send + Sync {
    fn portal(&self) -> Portal;

    /// Whether session persistence and the interactive challenge mode apply.
    /// True for portals the original tooling drove through a persistent
    /// browser profile; Empresite works over plain HTTP.
    fn requires_browser_session(&self) -> bool;

    /// Whether the candidate page must be fetched to obtain the mandatory
    /// fields (portals whose listings expose only links).
    fn needs_item_fetch(&self) -> bool {
        false
    }

    /// Whether fetching the candidate page adds optional enrichment on top
    /// of an already-complete discovery seed.
    fn supports_detail(&self) -> bool {
        false
    }

    /// Search-based discovery entry point.
    ///
    /// Discovery runs in legs (search terms, categories) of consecutive
    /// pages. Returns `None` when `leg` or `page` is past the portal's
    /// schedule; the sequence is finite and restartable per call.
    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String>;

    /// Parses one discovery page into candidate items. Pure.
    ///
    /// An empty vec ends the current leg. `page_url` is the fetched URL,
    /// used to resolve relative links.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] when the page shape is unrecognized;
    /// the orchestrator skips the leg, not the run.
    fn parse_discovery(
        &self,
        html: &str,
        region: &Region,
        page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError>;

    /// Extracts fields from a fetched candidate page. Pure.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] when the page shape is unrecognized;
    /// the item is skipped, not retried.
    fn extract_fields(
        &self,
        html: &str,
        item: &CandidateItem,
        region: &Region,
    ) -> Result<RecordDraft, ScrapeError> {
        let _ = (html, item, region);
        Err(ScrapeError::Parse {
            portal: self.portal().as_str(),
            reason: "portal has no item-page extraction".to_owned(),
        })
    }
}

/// Builds the adapter for a portal. The set is fixed and curated; there is
/// no open plugin discovery.
#[must_use]
pub fn adapter_for(portal: Portal, config: &AppConfig) -> Box<dyn PortalAdapter> {
    match portal {
        Portal::Empresite => Box::new(EmpresiteAdapter::new(
            config.employee_min,
            config.employee_max,
        )),
        Portal::Europages => Box::new(EuropagesAdapter::default()),
        Portal::PaginasAmarillas => Box::new(PaginasAmarillasAdapter::default()),
        Portal::Einforma => Box::new(EinformaAdapter::default()),
        Portal::Empresia => Box::new(EmpresiaAdapter::default()),
        Portal::Librebor => Box::new(LibreborAdapter::default()),
    }
}
