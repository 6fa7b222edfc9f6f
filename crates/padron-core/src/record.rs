//! Unified data model shared by every portal adapter.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The closed set of supported portals.
///
/// The string form (lowercase, no separators) is used everywhere a portal
/// identifier appears: `source_portal` on emitted records, session store
/// keys, and CLI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Empresite,
    Europages,
    PaginasAmarillas,
    Einforma,
    Empresia,
    Librebor,
}

impl Portal {
    pub const ALL: [Portal; 6] = [
        Portal::Empresite,
        Portal::Europages,
        Portal::PaginasAmarillas,
        Portal::Einforma,
        Portal::Empresia,
        Portal::Librebor,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Portal::Empresite => "empresite",
            Portal::Europages => "europages",
            Portal::PaginasAmarillas => "paginasamarillas",
            Portal::Einforma => "einforma",
            Portal::Empresia => "empresia",
            Portal::Librebor => "librebor",
        }
    }
}

impl std::fmt::Display for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Portal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empresite" => Ok(Portal::Empresite),
            "europages" => Ok(Portal::Europages),
            "paginasamarillas" => Ok(Portal::PaginasAmarillas),
            "einforma" => Ok(Portal::Einforma),
            "empresia" => Ok(Portal::Empresia),
            "librebor" => Ok(Portal::Librebor),
            other => Err(CoreError::UnknownPortal(other.to_owned())),
        }
    }
}

/// A province/region selector, stored upper-cased.
///
/// Each adapter maps the region onto its own search parameters via
/// [`Region::province_slug`] or the raw [`Region::name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region(String);

impl Region {
    /// Creates a region from a user-supplied name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyRegion`] when the name is empty or
    /// whitespace-only.
    pub fn new(name: &str) -> Result<Self, CoreError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyRegion);
        }
        Ok(Region(trimmed.to_uppercase()))
    }

    /// Upper-cased region name, e.g. `"BARCELONA"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Title-cased form used for the `city`/`province`/`region` record
    /// fields, e.g. `"Barcelona"`.
    #[must_use]
    pub fn titlecase(&self) -> String {
        self.0
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
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

    /// URL slug for province-keyed listing portals.
    ///
    /// Known provinces use the slugs the portals expect (note BILBAO maps to
    /// its province, `vizcaya`); anything else falls back to the lowercased
    /// name.
    #[must_use]
    pub fn province_slug(&self) -> String {
        match self.0.as_str() {
            "BILBAO" => "vizcaya".to_owned(),
            "BARCELONA" | "MADRID" | "VALENCIA" | "SEVILLA" | "MALAGA" | "ALICANTE"
            | "ZARAGOZA" | "MURCIA" => self.0.to_lowercase(),
            other => other.to_lowercase(),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partial record produced by extraction, merged during enrichment.
///
/// Every field is optional; [`RecordDraft::merge`] layers a later extraction
/// over an earlier one, with non-empty later values winning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub legal_name: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub cif: Option<String>,
    pub cnae_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website_url: Option<String>,
    pub domain: Option<String>,
    pub employee_count: Option<String>,
    pub industry: Option<String>,
    pub address: Option<String>,
    pub summary: Option<String>,
}

fn pick(base: Option<String>, over: Option<String>) -> Option<String> {
    over.filter(|s| !s.trim().is_empty()).or(base)
}

impl RecordDraft {
    /// Merges `over` on top of `self`; non-empty values from `over` win.
    #[must_use]
    pub fn merge(self, over: RecordDraft) -> RecordDraft {
        RecordDraft {
            legal_name: pick(self.legal_name, over.legal_name),
            city: pick(self.city, over.city),
            province: pick(self.province, over.province),
            region: pick(self.region, over.region),
            cif: pick(self.cif, over.cif),
            cnae_code: pick(self.cnae_code, over.cnae_code),
            phone: pick(self.phone, over.phone),
            email: pick(self.email, over.email),
            website_url: pick(self.website_url, over.website_url),
            domain: pick(self.domain, over.domain),
            employee_count: pick(self.employee_count, over.employee_count),
            industry: pick(self.industry, over.industry),
            address: pick(self.address, over.address),
            summary: pick(self.summary, over.summary),
        }
    }
}

/// The unified output record, one NDJSON line per company.
///
/// Only `legal_name`, `source_portal`, and `source_url` are mandatory.
/// Absent optional fields are omitted from the serialized line, not
/// emitted as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub legal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnae_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub source_portal: String,
    pub source_url: String,
}

/// Derives a bare host from a website URL.
///
/// Strips the scheme, any userinfo/port, and a leading `www.`, and
/// lower-cases the result. Returns `None` when the input has no recognizable
/// authority component.
#[must_use]
pub fn derive_domain(website_url: &str) -> Option<String> {
    let rest = website_url
        .strip_prefix("https://")
        .or_else(|| website_url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    let host = host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase();
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return None;
    }
    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_string_form_round_trips() {
        for portal in Portal::ALL {
            assert_eq!(portal.as_str().parse::<Portal>().unwrap(), portal);
        }
    }

    #[test]
    fn portal_parse_is_case_insensitive() {
        assert_eq!("EMPRESIA".parse::<Portal>().unwrap(), Portal::Empresia);
    }

    #[test]
    fn portal_parse_rejects_unknown() {
        assert!(matches!(
            "axesor".parse::<Portal>(),
            Err(CoreError::UnknownPortal(_))
        ));
    }

    #[test]
    fn region_upper_cases_and_trims() {
        let region = Region::new("  barcelona ").unwrap();
        assert_eq!(region.name(), "BARCELONA");
        assert_eq!(region.titlecase(), "Barcelona");
    }

    #[test]
    fn region_rejects_empty() {
        assert!(matches!(Region::new("   "), Err(CoreError::EmptyRegion)));
    }

    #[test]
    fn region_slug_maps_bilbao_to_province() {
        assert_eq!(Region::new("BILBAO").unwrap().province_slug(), "vizcaya");
        assert_eq!(Region::new("MADRID").unwrap().province_slug(), "madrid");
        assert_eq!(Region::new("Cuenca").unwrap().province_slug(), "cuenca");
    }

    #[test]
    fn draft_merge_later_non_empty_wins() {
        let base = RecordDraft {
            legal_name: Some("Acme SL".to_owned()),
            phone: Some("930000000".to_owned()),
            ..RecordDraft::default()
        };
        let enrich = RecordDraft {
            phone: Some("910000000".to_owned()),
            cif: Some("B12345678".to_owned()),
            summary: Some(String::new()),
            ..RecordDraft::default()
        };
        let merged = base.merge(enrich);
        assert_eq!(merged.legal_name.as_deref(), Some("Acme SL"));
        assert_eq!(merged.phone.as_deref(), Some("910000000"));
        assert_eq!(merged.cif.as_deref(), Some("B12345678"));
        assert!(merged.summary.is_none(), "empty enrichment must not win");
    }

    #[test]
    fn record_serializes_without_absent_fields() {
        let record = CompanyRecord {
            legal_name: "ACME SL".to_owned(),
            city: Some("Barcelona".to_owned()),
            province: None,
            region: None,
            cif: None,
            cnae_code: None,
            phone: None,
            email: None,
            website_url: None,
            domain: None,
            employee_count: None,
            industry: None,
            address: None,
            summary: None,
            source_portal: "empresia".to_owned(),
            source_url: "https://www.empresia.es/empresa/acme".to_owned(),
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"legal_name\":\"ACME SL\""));
        assert!(line.contains("\"city\":\"Barcelona\""));
        assert!(!line.contains("cif"), "absent optionals must be omitted");
        assert!(!line.contains("null"));
    }

    #[test]
    fn derive_domain_strips_www_and_path() {
        assert_eq!(
            derive_domain("https://www.acme-corp.es/contacto?x=1").as_deref(),
            Some("acme-corp.es")
        );
        assert_eq!(
            derive_domain("http://shop.example.com:8080/").as_deref(),
            Some("shop.example.com")
        );
    }

    #[test]
    fn derive_domain_rejects_unparseable() {
        assert_eq!(derive_domain("not a url"), None);
        assert_eq!(derive_domain("mailto:x@y.es"), None);
        assert_eq!(derive_domain("https://localhost/"), None);
    }
}
