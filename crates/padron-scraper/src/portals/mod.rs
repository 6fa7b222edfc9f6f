//! Portal-specific discovery and extraction.
//!
//! One module per portal; each exposes an adapter implementing
//! [`crate::adapter::PortalAdapter`]. Extraction is regex-based over the raw
//! HTML or over a crude text rendering of it, matching the page shapes the
//! portals serve today.

mod einforma;
mod empresia;
mod empresite;
mod europages;
mod librebor;
mod paginas_amarillas;

pub use einforma::EinformaAdapter;
pub use empresia::EmpresiaAdapter;
pub use empresite::EmpresiteAdapter;
pub use europages::EuropagesAdapter;
pub use librebor::LibreborAdapter;
pub use paginas_amarillas::PaginasAmarillasAdapter;

/// Crude text rendering of an HTML document: scripts and styles dropped,
/// tags become line breaks, common entities decoded, blank runs collapsed.
/// Good enough for the line-oriented field regexes the adapters use.
pub(crate) fn html_to_text(html: &str) -> String {
    let no_scripts = regex::Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>")
        .expect("valid regex")
        .replace_all(html, "\n");
    let no_tags = regex::Regex::new(r"(?s)<[^>]*>")
        .expect("valid regex")
        .replace_all(&no_scripts, "\n");
    let decoded = no_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    let mut out = String::with_capacity(decoded.len());
    for line in decoded.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            out.push('\n');
        }
    }
    out
}

/// Resolves a possibly-relative href against the page it appeared on.
pub(crate) fn resolve_url(page_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    if let Some(rest) = href.strip_prefix('/') {
        if let Some(scheme_split) = page_url.find("://") {
            let scheme = &page_url[..scheme_split];
            let remainder = &page_url[(scheme_split + 3)..];
            let host_end = remainder.find('/').unwrap_or(remainder.len());
            let host = &remainder[..host_end];
            return format!("{scheme}://{host}/{rest}");
        }
    }
    format!("{}/{}", page_url.trim_end_matches('/'), href)
}

/// Normalizes a raw phone capture: keeps digits and `+`, requires at least
/// nine digits.
pub(crate) fn clean_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.chars().filter(char::is_ascii_digit).count() >= 9 {
        Some(cleaned)
    } else {
        None
    }
}

/// Truncates to at most `max` characters on a char boundary.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Lowercase hyphenated slug for synthesized company URLs.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    slug.trim_end_matches('-').to_owned()
}
