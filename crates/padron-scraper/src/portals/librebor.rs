//! LibreBOR (librebor.me).
//!
//! The one portal with a JSON API: the BORME company index is paged per
//! province. Responses carry registry data only (name, CIF, CNAE), so
//! candidate pages are never fetched.

use padron_core::{Portal, RecordDraft, Region};
use serde::Deserialize;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

use super::slugify;

const MAX_PAGES: u32 = 100;

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    results: Vec<ApiCompany>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCompany {
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    cif: Option<String>,
    #[serde(default)]
    cnae: Option<serde_json::Value>,
}

pub struct LibreborAdapter {
    base_url: String,
}

impl Default for LibreborAdapter {
    fn default() -> Self {
        LibreborAdapter {
            base_url: "https://librebor.me".to_owned(),
        }
    }
}

impl LibreborAdapter {
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// BORME indexes provinces under their Basque or Catalan names where
    /// those differ from the common city name.
    fn province_slug(region: &Region) -> String {
        match region.name() {
            "BILBAO" => "bizkaia".to_owned(),
            other => slugify(other),
        }
    }
}

impl PortalAdapter for LibreborAdapter {
    fn portal(&self) -> Portal {
        Portal::Librebor
    }

    fn requires_browser_session(&self) -> bool {
        false
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        if leg > 0 || page == 0 || page > MAX_PAGES {
            return None;
        }
        let prov = Self::province_slug(region);
        Some(format!(
            "{}/borme/api/v1/empresa/provincia/{prov}/?page={page}",
            self.base_url
        ))
    }

    fn parse_discovery(
        &self,
        body: &str,
        region: &Region,
        _page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let page: ApiPage = serde_json::from_str(body).map_err(|e| ScrapeError::Parse {
            portal: self.portal().as_str(),
            reason: format!("invalid API response: {e}"),
        })?;

        let mut items = Vec::with_capacity(page.results.len());
        for company in page.results {
            if company.name.trim().is_empty() {
                continue;
            }
            let url = company.url.clone().unwrap_or_else(|| {
                format!("{}/borme/empresa/{}/", self.base_url, slugify(&company.name))
            });
            let cnae_code = company.cnae.as_ref().and_then(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            let seed = RecordDraft {
                legal_name: Some(company.name.trim().to_owned()),
                cif: company.cif.filter(|c| !c.is_empty()),
                cnae_code,
                city: Some(region.titlecase()),
                province: Some(region.titlecase()),
                region: Some(region.titlecase()),
                ..RecordDraft::default()
            };
            items.push(CandidateItem { url, seed });
        }

        if items.is_empty() && page.next.is_some() {
            tracing::debug!(portal = "librebor", "empty results page with a next link");
        }
        Ok(items)
    }
}
