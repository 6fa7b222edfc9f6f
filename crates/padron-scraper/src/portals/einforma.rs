//! Einforma (einforma.com).
//!
//! Province directory tables. Rows carry the company name and usually its
//! CIF, which is all the portal exposes without a paid report, so candidate
//! pages are never fetched.

use padron_core::{Portal, RecordDraft, Region};
use regex::Regex;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

const MAX_PAGES: u32 = 50;

pub struct EinformaAdapter {
    base_url: String,
}

impl Default for EinformaAdapter {
    fn default() -> Self {
        EinformaAdapter {
            base_url: "https://www.einforma.com".to_owned(),
        }
    }
}

impl EinformaAdapter {
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl PortalAdapter for EinformaAdapter {
    fn portal(&self) -> Portal {
        Portal::Einforma
    }

    fn requires_browser_session(&self) -> bool {
        true
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        if leg > 0 || page == 0 || page > MAX_PAGES {
            return None;
        }
        let prov = region.province_slug();
        if page == 1 {
            Some(format!("{}/informes-empresas/{prov}.html", self.base_url))
        } else {
            Some(format!(
                "{}/informes-empresas/{prov}-{page}.html",
                self.base_url
            ))
        }
    }

    fn parse_discovery(
        &self,
        html: &str,
        region: &Region,
        _page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let link_re = Regex::new(r#"<a[^>]+href="(https?://[^"]*/informes-empresa/[^"]+)"[^>]*>([^<]+)</a>"#)
            .expect("valid regex");
        let rel_link_re =
            Regex::new(r#"<a[^>]+href="(/informes-empresa/[^"]+)"[^>]*>([^<]+)</a>"#)
                .expect("valid regex");
        let cif_re = Regex::new(r"\b([A-Z]\d{7,8})\b").expect("valid regex");

        let mut items = Vec::new();
        for row in html.split("<tr").skip(1) {
            let (href, name) = if let Some(c) = link_re.captures(row) {
                (c[1].to_owned(), c[2].trim().to_owned())
            } else if let Some(c) = rel_link_re.captures(row) {
                (format!("{}{}", self.base_url, &c[1]), c[2].trim().to_owned())
            } else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let seed = RecordDraft {
                legal_name: Some(name),
                cif: cif_re.captures(row).map(|c| c[1].to_owned()),
                city: Some(region.titlecase()),
                province: Some(region.titlecase()),
                region: Some(region.titlecase()),
                ..RecordDraft::default()
            };
            items.push(CandidateItem { url: href, seed });
        }
        Ok(items)
    }
}
