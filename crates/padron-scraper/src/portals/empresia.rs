//! Empresia (empresia.es).
//!
//! Keyword search scoped by region, one result page per term. Company pages
//! are mostly unstructured, so extraction works over a text rendering.

use padron_core::{derive_domain, Portal, RecordDraft, Region};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

use super::{html_to_text, resolve_url, truncate};

const SEARCH_TERMS: [&str; 16] = [
    "construcciones",
    "transportes",
    "alimentacion",
    "maquinaria",
    "informatica",
    "consultoria",
    "inmobiliaria",
    "textil",
    "quimica",
    "logistica",
    "ingenieria",
    "distribuciones",
    "instalaciones",
    "comercial",
    "servicios",
    "industrias",
];

const WEBSITE_EXCLUDES: [&str; 6] = [
    "empresia",
    "axesor",
    "einforma",
    "infocif",
    "google",
    "facebook",
];

pub struct EmpresiaAdapter {
    base_url: String,
}

impl Default for EmpresiaAdapter {
    fn default() -> Self {
        EmpresiaAdapter {
            base_url: "https://www.empresia.es".to_owned(),
        }
    }
}

impl EmpresiaAdapter {
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl PortalAdapter for EmpresiaAdapter {
    fn portal(&self) -> Portal {
        Portal::Empresia
    }

    fn requires_browser_session(&self) -> bool {
        true
    }

    fn needs_item_fetch(&self) -> bool {
        true
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        let term = SEARCH_TERMS.get(leg as usize)?;
        if page != 1 {
            return None;
        }
        let query = format!("{term} {}", region.name());
        let q = utf8_percent_encode(&query, NON_ALPHANUMERIC);
        Some(format!("{}/buscador?q={q}", self.base_url))
    }

    fn parse_discovery(
        &self,
        html: &str,
        _region: &Region,
        page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let link_re = Regex::new(r#"href="(/empresa/[^"?#]+)""#).expect("valid regex");

        let mut items = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for cap in link_re.captures_iter(html) {
            let path = cap[1].to_owned();
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
        let text = html_to_text(html);

        let name = Regex::new(r"(?m)^Datos de (.+)$")
            .expect("valid regex")
            .captures(&text)
            .map(|c| c[1].trim().to_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ScrapeError::Parse {
                portal: self.portal().as_str(),
                reason: format!("no company header on {}", item.url),
            })?;

        let mut draft = RecordDraft {
            legal_name: Some(name),
            city: Some(region.titlecase()),
            province: Some(region.titlecase()),
            region: Some(region.titlecase()),
            ..RecordDraft::default()
        };

        if let Some(c) = Regex::new(r"(?m)^CIF\n([A-Z]\d{7,8})$")
            .expect("valid regex")
            .captures(&text)
        {
            draft.cif = Some(c[1].to_owned());
        }

        if let Some(c) = Regex::new(r"(?m)^CNAE (\d{3,4}) - (.+)$")
            .expect("valid regex")
            .captures(&text)
        {
            draft.cnae_code = Some(c[1].to_owned());
            draft.industry = Some(c[2].trim().to_owned());
        }

        // The contact block repeats the phone next to a fax number.
        if let Some(c) = Regex::new(r"(?m)^(\d{9})\s+\d{9}$")
            .expect("valid regex")
            .captures(&text)
            .or_else(|| {
                Regex::new(r"(?m)^Tel[eé]fono\n(\d{9})$")
                    .expect("valid regex")
                    .captures(&text)
            })
        {
            draft.phone = Some(c[1].to_owned());
        }

        if let Some(c) = Regex::new(r"(?mi)^n[uú]mero de empleados:?\s*(\d+(?:\s*-\s*\d+)?)")
            .expect("valid regex")
            .captures(&text)
        {
            draft.employee_count = Some(c[1].trim().to_owned());
        }

        if let Some(c) = Regex::new(
            r"(?m)^((?:CALLE|PASEO|AVENIDA|AVDA|PLAZA|CAMINO|POLIGONO|CARRETERA|RONDA)[^\n]+)$",
        )
        .expect("valid regex")
        .captures(&text)
        {
            let line = c[1].trim().to_owned();
            if let Some(p) = Regex::new(r"\(([^)]+)\)\s*$")
                .expect("valid regex")
                .captures(&line)
            {
                let city = p[1].trim().to_owned();
                draft.address = Some(line[..line.rfind('(').unwrap_or(line.len())].trim().to_owned());
                draft.city = Some(titlecase_word(&city));
            } else {
                draft.address = Some(line);
            }
        }

        if let Some(c) = Regex::new(r"(?ms)^Objeto social\n(.+?)$")
            .expect("valid regex")
            .captures(&text)
        {
            draft.summary = Some(truncate(c[1].trim(), 500));
        }

        if let Some(c) = Regex::new(r#"<a[^>]+href="(https?://[^"]+)"[^>]*>\s*(?:Web|Sitio web|P[aá]gina web)"#)
            .expect("valid regex")
            .captures(html)
        {
            let href = c[1].to_owned();
            let lower = href.to_ascii_lowercase();
            if !WEBSITE_EXCLUDES.iter().any(|x| lower.contains(x)) {
                draft.domain = derive_domain(&href);
                draft.website_url = Some(href);
            }
        }

        Ok(draft)
    }
}

fn titlecase_word(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region::new("ZARAGOZA").unwrap()
    }

    #[test]
    fn search_url_is_one_page_per_term() {
        let adapter = EmpresiaAdapter::default();
        let url = adapter.search_url(&region(), 0, 1).unwrap();
        assert_eq!(
            url,
            "https://www.empresia.es/buscador?q=construcciones%20ZARAGOZA"
        );
        assert!(adapter.search_url(&region(), 0, 2).is_none());
        assert!(adapter.search_url(&region(), 16, 1).is_none());
    }

    #[test]
    fn discovery_dedups_company_links() {
        let adapter = EmpresiaAdapter::default();
        let html = r#"
            <a href="/empresa/construcciones-ebro-sl">Construcciones Ebro</a>
            <a href="/empresa/construcciones-ebro-sl">repetido</a>
            <a href="/empresa/aridos-aragon-sa">Aridos Aragon</a>
            <a href="/otros/no">x</a>
        "#;
        let items = adapter
            .parse_discovery(html, &region(), "https://www.empresia.es/buscador?q=x")
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].url,
            "https://www.empresia.es/empresa/construcciones-ebro-sl"
        );
    }

    const PROFILE: &str = r#"
        <html><body>
        <h1>Datos de CONSTRUCCIONES EBRO SL</h1>
        <dl><dt>CIF</dt><dd>B50123456</dd></dl>
        <p>CNAE 4121 - Construcción de edificios residenciales</p>
        <div>CALLE ALCALDE GOMEZ LAGUNA 25 (ZARAGOZA)</div>
        <table><tr><td>976123456</td><td>976654321</td></tr></table>
        <p>Número de empleados: 45</p>
        <h2>Objeto social</h2>
        <p>La construcción completa, reparación y conservación de edificaciones.</p>
        <a href="https://www.cebro.es" rel="nofollow">Web</a>
        </body></html>
    "#;

    #[test]
    fn extracts_profile_from_text_rendering() {
        let adapter = EmpresiaAdapter::default();
        let item = CandidateItem {
            url: "https://www.empresia.es/empresa/construcciones-ebro-sl".to_owned(),
            seed: RecordDraft::default(),
        };
        let draft = adapter.extract_fields(PROFILE, &item, &region()).unwrap();
        assert_eq!(
            draft.legal_name.as_deref(),
            Some("CONSTRUCCIONES EBRO SL")
        );
        assert_eq!(draft.cif.as_deref(), Some("B50123456"));
        assert_eq!(draft.cnae_code.as_deref(), Some("4121"));
        assert_eq!(
            draft.industry.as_deref(),
            Some("Construcción de edificios residenciales")
        );
        assert_eq!(draft.phone.as_deref(), Some("976123456"));
        assert_eq!(draft.employee_count.as_deref(), Some("45"));
        assert_eq!(
            draft.address.as_deref(),
            Some("CALLE ALCALDE GOMEZ LAGUNA 25")
        );
        assert_eq!(draft.city.as_deref(), Some("Zaragoza"));
        assert_eq!(
            draft.summary.as_deref(),
            Some("La construcción completa, reparación y conservación de edificaciones.")
        );
        assert_eq!(draft.website_url.as_deref(), Some("https://www.cebro.es"));
        assert_eq!(draft.domain.as_deref(), Some("cebro.es"));
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let adapter = EmpresiaAdapter::default();
        let item = CandidateItem {
            url: "https://www.empresia.es/empresa/x".to_owned(),
            seed: RecordDraft::default(),
        };
        let err = adapter
            .extract_fields("<html><body>perfil vacío</body></html>", &item, &region())
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
    }
}
