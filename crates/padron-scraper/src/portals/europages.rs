//! Europages (europages.es).
//!
//! Keyword search rotated over a fixed term list; listings only expose
//! company links, so every candidate page must be fetched for its fields.

use padron_core::{derive_domain, Portal, RecordDraft, Region};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

use super::{clean_phone, html_to_text, resolve_url, truncate};

const SEARCH_TERMS: [&str; 15] = [
    "fabricante",
    "distribuidor",
    "industrial",
    "maquinaria",
    "construccion",
    "alimentacion",
    "quimica",
    "textil",
    "transporte",
    "logistica",
    "metalurgia",
    "electronica",
    "embalaje",
    "consultoria",
    "ingenieria",
];

const MAX_PAGES: u32 = 10;

pub struct EuropagesAdapter {
    base_url: String,
}

impl Default for EuropagesAdapter {
    fn default() -> Self {
        EuropagesAdapter {
            base_url: "https://www.europages.es".to_owned(),
        }
    }
}

impl EuropagesAdapter {
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl PortalAdapter for EuropagesAdapter {
    fn portal(&self) -> Portal {
        Portal::Europages
    }

    fn requires_browser_session(&self) -> bool {
        true
    }

    fn needs_item_fetch(&self) -> bool {
        true
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        let term = SEARCH_TERMS.get(leg as usize)?;
        if page == 0 || page > MAX_PAGES {
            return None;
        }
        let q = utf8_percent_encode(term, NON_ALPHANUMERIC);
        let location = utf8_percent_encode(&region.titlecase(), NON_ALPHANUMERIC).to_string();
        let mut url = format!("{}/es/search?q={q}&location={location}", self.base_url);
        if page > 1 {
            url.push_str(&format!("&page={page}"));
        }
        Some(url)
    }

    fn parse_discovery(
        &self,
        html: &str,
        _region: &Region,
        page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let link_re = Regex::new(r#"href="(/es/company/[^"?#]+)""#).expect("valid regex");

        let mut items = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for cap in link_re.captures_iter(html) {
            let mut path = cap[1].to_owned();
            // Product sub-pages link back to the same company profile.
            if let Some(idx) = path.find("/products") {
                path.truncate(idx);
            }
            if !seen.insert(path.clone()) {
                continue;
            }
            items.push(CandidateItem {
                url: resolve_url(page_url, &path),
                seed: RecordDraft::default(),
            });
        }
        Ok(items)
    }

    fn extract_fields(
        &self,
        html: &str,
        item: &CandidateItem,
        region: &Region,
    ) -> Result<RecordDraft, ScrapeError> {
        let name = Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>")
            .expect("valid regex")
            .captures(html)
            .map(|c| {
                html_to_text(&c[1])
                    .trim()
                    .trim_start_matches("SOBRE ")
                    .to_owned()
            })
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ScrapeError::Parse {
                portal: self.portal().as_str(),
                reason: format!("no company name on {}", item.url),
            })?;

        let text = html_to_text(html);
        let mut draft = RecordDraft {
            legal_name: Some(name),
            city: Some(region.titlecase()),
            province: Some(region.titlecase()),
            region: Some(region.titlecase()),
            ..RecordDraft::default()
        };

        if let Some(c) = Regex::new(r"Empleados:?\s*([\d\s\-\u{2013}]+\d)")
            .expect("valid regex")
            .captures(&text)
        {
            draft.employee_count = Some(c[1].trim().to_owned());
        }

        if let Some(c) = Regex::new(r#"<a[^>]+href="(http[^"]+)"[^>]*>[^<]*Visitar\s+(?:el\s+)?sitio\s+web"#)
            .expect("valid regex")
            .captures(html)
        {
            let href = c[1].to_owned();
            if !href.contains("europages") {
                draft.domain = derive_domain(&href);
                draft.website_url = Some(href);
            }
        }

        if let Some(c) = Regex::new(r"(?m)^([^\n]{5,120},\s*\d{5}[^\n]*Espa\u{f1}a)\s*$")
            .expect("valid regex")
            .captures(&text)
        {
            draft.address = Some(c[1].trim().to_owned());
        }

        if let Some(c) = Regex::new(r"\+34[\s\d]{9,14}")
            .expect("valid regex")
            .find(&text)
        {
            draft.phone = clean_phone(c.as_str());
        }

        if let Some(c) = Regex::new(r"(?s)Acerca de la empresa\s*\n(.{20,600}?)\n\n?")
            .expect("valid regex")
            .captures(&text)
        {
            draft.summary = Some(truncate(c[1].trim(), 500));
        }

        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region::new("VALENCIA").unwrap()
    }

    #[test]
    fn search_url_rotates_terms_and_pages() {
        let adapter = EuropagesAdapter::default();
        let first = adapter.search_url(&region(), 0, 1).unwrap();
        assert_eq!(
            first,
            "https://www.europages.es/es/search?q=fabricante&location=Valencia"
        );
        let paged = adapter.search_url(&region(), 2, 3).unwrap();
        assert!(paged.contains("q=industrial"));
        assert!(paged.ends_with("&page=3"));
        assert!(adapter.search_url(&region(), 15, 1).is_none());
        assert!(adapter.search_url(&region(), 0, 11).is_none());
    }

    #[test]
    fn discovery_dedups_company_links_and_strips_product_paths() {
        let adapter = EuropagesAdapter::default();
        let html = r#"
            <a href="/es/company/acme-sl-12345">ACME</a>
            <a href="/es/company/acme-sl-12345/products/widget">widget</a>
            <a href="/es/company/beta-sa-9">Beta</a>
            <a href="/es/other/ignored">x</a>
        "#;
        let items = adapter
            .parse_discovery(html, &region(), "https://www.europages.es/es/search?q=fabricante")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.europages.es/es/company/acme-sl-12345");
        assert_eq!(items[1].url, "https://www.europages.es/es/company/beta-sa-9");
    }

    #[test]
    fn extracts_profile_fields() {
        let adapter = EuropagesAdapter::default();
        let html = r#"
            <h1 class="company-title">SOBRE ACME QUIMICA SL</h1>
            <div>Empleados: 51 - 100</div>
            <div>Calle Colon 12, 46004 Valencia, España</div>
            <div>Tel: +34 960 111 222</div>
            <a href="https://www.acmequimica.es" rel="nofollow">Visitar sitio web</a>
        "#;
        let item = CandidateItem {
            url: "https://www.europages.es/es/company/acme".to_owned(),
            seed: RecordDraft::default(),
        };
        let draft = adapter.extract_fields(html, &item, &region()).unwrap();
        assert_eq!(draft.legal_name.as_deref(), Some("ACME QUIMICA SL"));
        assert_eq!(draft.employee_count.as_deref(), Some("51 - 100"));
        assert_eq!(
            draft.address.as_deref(),
            Some("Calle Colon 12, 46004 Valencia, España")
        );
        assert_eq!(draft.phone.as_deref(), Some("+34960111222"));
        assert_eq!(draft.website_url.as_deref(), Some("https://www.acmequimica.es"));
        assert_eq!(draft.domain.as_deref(), Some("acmequimica.es"));
        assert_eq!(draft.city.as_deref(), Some("Valencia"));
    }

    #[test]
    fn missing_name_is_a_parse_error() {
        let adapter = EuropagesAdapter::default();
        let item = CandidateItem {
            url: "https://www.europages.es/es/company/x".to_owned(),
            seed: RecordDraft::default(),
        };
        let err = adapter
            .extract_fields("<html><body>vacio</body></html>", &item, &region())
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
    }
}
