//! Páginas Amarillas (paginasamarillas.es).
//!
//! Category browse over the province directory. Listing articles carry the
//! full field set, so candidate pages are never fetched; companies without
//! their own profile page get a synthesized fragment URL.

use padron_core::{derive_domain, Portal, RecordDraft, Region};
use regex::Regex;

use crate::adapter::{CandidateItem, PortalAdapter};
use crate::error::ScrapeError;

use super::{clean_phone, resolve_url, slugify, truncate};

const CATEGORIES: [&str; 12] = [
    "construccion",
    "transportes",
    "alimentacion",
    "maquinaria",
    "informatica",
    "asesorias",
    "automocion",
    "textil",
    "quimica",
    "muebles",
    "electricidad",
    "hosteleria",
];

const MAX_PAGES: u32 = 20;

pub struct PaginasAmarillasAdapter {
    base_url: String,
}

impl Default for PaginasAmarillasAdapter {
    fn default() -> Self {
        PaginasAmarillasAdapter {
            base_url: "https://www.paginasamarillas.es".to_owned(),
        }
    }
}

impl PaginasAmarillasAdapter {
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl PortalAdapter for PaginasAmarillasAdapter {
    fn portal(&self) -> Portal {
        Portal::PaginasAmarillas
    }

    fn requires_browser_session(&self) -> bool {
        true
    }

    fn search_url(&self, region: &Region, leg: u32, page: u32) -> Option<String> {
        let category = CATEGORIES.get(leg as usize)?;
        if page == 0 || page > MAX_PAGES {
            return None;
        }
        let prov = region.province_slug();
        Some(format!(
            "{}/search/{category}/all-ma/{prov}/all-is/{prov}/all-ba/all-pu/all-nc/{page}",
            self.base_url
        ))
    }

    fn parse_discovery(
        &self,
        html: &str,
        region: &Region,
        page_url: &str,
    ) -> Result<Vec<CandidateItem>, ScrapeError> {
        let name_re = Regex::new(r#"(?s)<h2[^>]*itemprop="name"[^>]*>(.*?)</h2>"#)
            .expect("valid regex");
        let link_re = Regex::new(r#"<a[^>]+data-omniclick="name"[^>]+href="([^"]+)""#)
            .expect("valid regex");
        let phone_re = Regex::new(r#"itemprop="telephone"[^>]*>([^<]+)<"#).expect("valid regex");
        let street_re =
            Regex::new(r#"itemprop="streetAddress"[^>]*>([^<]+)<"#).expect("valid regex");
        let city_re =
            Regex::new(r#"itemprop="addressLocality"[^>]*>([^<]+)<"#).expect("valid regex");
        let web_re = Regex::new(r#"<a[^>]+data-omniclick="web"[^>]+href="(http[^"]+)""#)
            .expect("valid regex");
        let desc_re =
            Regex::new(r#"(?s)<div[^>]+class="[^"]*comment[^"]*"[^>]*>\s*<p>(.*?)</p>"#)
                .expect("valid regex");
        let tag_re = Regex::new(r"<[^>]*>").expect("valid regex");

        let mut items = Vec::new();
        for article in html.split("<article").skip(1) {
            let Some(name) = name_re
                .captures(article)
                .map(|c| tag_re.replace_all(&c[1], " ").trim().to_owned())
                .filter(|n| !n.is_empty())
            else {
                continue;
            };

            let url = link_re
                .captures(article)
                .map(|c| resolve_url(page_url, &c[1]))
                .unwrap_or_else(|| format!("{page_url}#{}", slugify(&name)));

            let website_url = web_re
                .captures(article)
                .map(|c| c[1].to_owned())
                .filter(|w| !w.contains("paginasamarillas"));

            let seed = RecordDraft {
                legal_name: Some(name),
                phone: phone_re
                    .captures(article)
                    .and_then(|c| clean_phone(&c[1])),
                address: street_re.captures(article).map(|c| c[1].trim().to_owned()),
                city: city_re
                    .captures(article)
                    .map(|c| c[1].trim().to_owned())
                    .or_else(|| Some(region.titlecase())),
                province: Some(region.titlecase()),
                region: Some(region.titlecase()),
                domain: website_url.as_deref().and_then(derive_domain),
                website_url,
                summary: desc_re
                    .captures(article)
                    .map(|c| truncate(tag_re.replace_all(&c[1], " ").trim(), 500)),
                ..RecordDraft::default()
            };
            items.push(CandidateItem { url, seed });
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region::new("SEVILLA").unwrap()
    }

    const LISTING: &str = r#"
        <article class="listado-item">
            <h2 itemprop="name"><span>Transportes Giralda SL</span></h2>
            <a data-omniclick="name" href="/ficha/transportes-giralda">ficha</a>
            <span itemprop="telephone">954 11 22 33</span>
            <span itemprop="streetAddress">Av. de la Innovación 7</span>
            <span itemprop="addressLocality">Sevilla</span>
            <a data-omniclick="web" href="https://www.tgiralda.es" target="_blank">web</a>
            <div class="comment box"><p>Transporte frigorífico <b>nacional</b>.</p></div>
        </article>
        <article class="listado-item">
            <h2 itemprop="name">Catering Sin Ficha</h2>
            <span itemprop="telephone">955 44 55 66</span>
        </article>
    "#;

    #[test]
    fn search_url_uses_province_slug_and_category() {
        let adapter = PaginasAmarillasAdapter::default();
        let url = adapter.search_url(&region(), 0, 1).unwrap();
        assert_eq!(
            url,
            "https://www.paginasamarillas.es/search/construccion/all-ma/sevilla/all-is/sevilla/all-ba/all-pu/all-nc/1"
        );
        assert!(adapter.search_url(&region(), 12, 1).is_none());
        assert!(adapter.search_url(&region(), 0, 21).is_none());

        let bilbao = Region::new("BILBAO").unwrap();
        let url = adapter.search_url(&bilbao, 1, 2).unwrap();
        assert!(url.contains("/all-ma/vizcaya/"));
    }

    #[test]
    fn listing_articles_carry_full_seeds() {
        let adapter = PaginasAmarillasAdapter::default();
        let items = adapter
            .parse_discovery(LISTING, &region(), "https://www.paginasamarillas.es/search/transportes/1")
            .unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.url, "https://www.paginasamarillas.es/ficha/transportes-giralda");
        assert_eq!(first.seed.legal_name.as_deref(), Some("Transportes Giralda SL"));
        assert_eq!(first.seed.phone.as_deref(), Some("954112233"));
        assert_eq!(first.seed.address.as_deref(), Some("Av. de la Innovación 7"));
        assert_eq!(first.seed.website_url.as_deref(), Some("https://www.tgiralda.es"));
        assert_eq!(first.seed.domain.as_deref(), Some("tgiralda.es"));
        assert_eq!(
            first.seed.summary.as_deref(),
            Some("Transporte frigorífico  nacional .")
        );
    }

    #[test]
    fn companies_without_profile_links_get_fragment_urls() {
        let adapter = PaginasAmarillasAdapter::default();
        let items = adapter
            .parse_discovery(LISTING, &region(), "https://www.paginasamarillas.es/search/transportes/1")
            .unwrap();
        assert_eq!(
            items[1].url,
            "https://www.paginasamarillas.es/search/transportes/1#catering-sin-ficha"
        );
        assert_eq!(items[1].seed.city.as_deref(), Some("Sevilla"));
    }
}
