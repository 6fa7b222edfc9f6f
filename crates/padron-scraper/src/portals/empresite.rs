//! Empresite (empresite.eleconomista.es).
//!
//! Locality listings filtered by employee count, paged with `PgNum-<n>`.
//! Listing cards already carry the mandatory fields; the detail page adds
//! CNAE, contact, and website data. Empresite is the only portal served
//! over plain HTTP, so no browser session applies.

use padron_core::{derive_domain, Portal, RecordDraft, Region};
use regex::Regex;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

use super::{clean_phone, resolve_url, truncate};

const MAX_PAGES: u32 = 40;

pub struct EmpresiteAdapter {
    base_url: String,
    employee_min: u32,
    employee_max: u32,
}

impl EmpresiteAdapter {
    #[must_use]
    pub fn new(employee_min: u32, employee_max: u32) -> Self {
        EmpresiteAdapter {
            base_url: "https://empresite.eleconomista.es".to_owned(),
            employee_min,
            employee_max,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl PortalAdapter for EmpresiteAdapter {
    fn portal(&self) -> Portal {
        Portal::Empresite
    }

    fn requires_browser_session(&self) -> bool {
        false
    }

    fn supports_detail(&self) -> bool {
        true
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        if leg > 0 || page == 0 || page > MAX_PAGES {
            return None;
        }
        let mut path = format!("/localidad/{}/", region.name());
        if page > 1 {
            path.push_str(&format!("PgNum-{page}/"));
        }
        Some(format!(
            "{}{}?testfiltros=1&emp_empleados_number={}-{}",
            self.base_url, path, self.employee_min, self.employee_max
        ))
    }

    fn parse_discovery(
        &self,
        html: &str,
        region: &Region,
        page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let name_re =
            Regex::new(r#"<meta\s+itemprop="name"\s+content="([^"]+)""#).expect("valid regex");
        let link_re = Regex::new(r#"<h3[^>]*>\s*<a[^>]+href="([^"]+)""#).expect("valid regex");
        let addr_re =
            Regex::new(r#"<span[^>]+itemprop="address"[^>]*>([^<]+)<"#).expect("valid regex");
        let summary_re =
            Regex::new(r#"<span[^>]+class="[^"]*line-clamp-2[^"]*"[^>]*>([^<]+)<"#)
                .expect("valid regex");

        let mut items = Vec::new();
        for card in html.split("cardCompanyBox").skip(1) {
            let Some(name) = name_re
                .captures(card)
                .map(|c| c[1].trim().to_owned())
                .filter(|n| !n.is_empty())
            else {
                continue;
            };
            let Some(href) = link_re.captures(card).map(|c| c[1].to_owned()) else {
                continue;
            };

            let seed = RecordDraft {
                legal_name: Some(name),
                city: Some(region.titlecase()),
                province: Some(region.titlecase()),
                region: Some(region.titlecase()),
                address: addr_re.captures(card).map(|c| c[1].trim().to_owned()),
                summary: summary_re
                    .captures(card)
                    .map(|c| truncate(c[1].trim(), 500)),
                ..RecordDraft::default()
            };
            items.push(CandidateItem {
                url: resolve_url(page_url, &href),
                seed,
            });
        }
        Ok(items)
    }

    fn extract_fields(
        &self,
        html: &str,
        _item: &CandidateItem,
        _region: &Region,
    ) -> Result<RecordDraft, ScrapeError> {
        if !html.contains("itemprop") && !html.contains("'CNAE'") {
            return Err(ScrapeError::Parse {
                portal: self.portal().as_str(),
                reason: "detail page shape not recognized".to_owned(),
            });
        }

        let mut draft = RecordDraft::default();

        if let Some(c) = Regex::new(r"'CNAE'\s*:\s*'(\d+)'")
            .expect("valid regex")
            .captures(html)
        {
            draft.cnae_code = Some(c[1].to_owned());
        }
        if let Some(c) = Regex::new(r"'GRUPO_SECTOR'\s*:\s*'([^']+)'")
            .expect("valid regex")
            .captures(html)
        {
            draft.industry = Some(c[1].to_owned());
        }

        let phone_raw = Regex::new(r#"itemprop="telephone"[^>]*content="([^"]+)""#)
            .expect("valid regex")
            .captures(html)
            .map(|c| c[1].to_owned())
            .or_else(|| {
                Regex::new(r#"href="tel:([^"]+)""#)
                    .expect("valid regex")
                    .captures(html)
                    .map(|c| c[1].to_owned())
            });
        draft.phone = phone_raw.as_deref().and_then(clean_phone);

        if let Some(c) = Regex::new(r#"href="mailto:([^"?]+)""#)
            .expect("valid regex")
            .captures(html)
        {
            draft.email = Some(c[1].to_owned());
        }

        if let Some(c) = Regex::new(r#"<a[^>]+itemprop="url"[^>]+href="(http[^"]+)""#)
            .expect("valid regex")
            .captures(html)
        {
            let href = c[1].to_owned();
            if !href.contains("empresite") {
                draft.domain = derive_domain(&href);
                draft.website_url = Some(href);
            }
        }

        Ok(draft)
    }
}
