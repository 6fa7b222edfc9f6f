//! Normalization and NDJSON emission.
//!
//! Records are buffered per run keyed by `source_url`, so an enriched
//! extraction of a page replaces the earlier listing-only record instead of
//! producing a duplicate line. The buffer is flushed once, in discovery
//! order, when the run finishes.

use std::collections::HashMap;
use std::io::Write;

use padron_core::{CompanyRecord, Portal, RecordDraft};

use crate::error::ScrapeError;

/// Turns a merged draft into an output record.
///
/// Whitespace is trimmed everywhere, empty optionals are dropped, the
/// `legal_name` is upper-cased, and the `domain` is derived from the website
/// when extraction did not set it. Returns `None` when the draft has no
/// usable legal name; such candidates are counted as skipped, not errors.
#[must_use]
pub fn normalize(draft: RecordDraft, portal: Portal, source_url: &str) -> Option<CompanyRecord> {
    let clean = |v: Option<String>| -> Option<String> {
        v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
    };

    let legal_name = clean(draft.legal_name)?.to_uppercase();
    let website_url = clean(draft.website_url);
    let domain = clean(draft.domain)
        .or_else(|| website_url.as_deref().and_then(padron_core::derive_domain));

    Some(CompanyRecord {
        legal_name,
        city: clean(draft.city),
        province: clean(draft.province),
        region: clean(draft.region),
        cif: clean(draft.cif),
        cnae_code: clean(draft.cnae_code),
        phone: clean(draft.phone),
        email: clean(draft.email),
        website_url,
        domain,
        employee_count: clean(draft.employee_count),
        industry: clean(draft.industry),
        address: clean(draft.address),
        summary: clean(draft.summary),
        source_portal: portal.as_str().to_owned(),
        source_url: source_url.to_owned(),
    })
}

/// Buffered NDJSON writer, one JSON object per line.
pub struct Emitter<W: Write> {
    writer: W,
    records: Vec<CompanyRecord>,
    by_url: HashMap<String, usize>,
}

impl<W: Write> Emitter<W> {
    pub fn new(writer: W) -> Self {
        Emitter {
            writer,
            records: Vec::new(),
            by_url: HashMap::new(),
        }
    }

    /// Buffers a record. A record with a `source_url` already buffered
    /// replaces the earlier one in place; discovery order is preserved.
    pub fn push(&mut self, record: CompanyRecord) {
        match self.by_url.get(&record.source_url) {
            Some(&idx) => {
                tracing::debug!(
                    source_url = %record.source_url,
                    "replacing buffered record with enriched extraction"
                );
                self.records[idx] = record;
            }
            None => {
                self.by_url
                    .insert(record.source_url.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.records.len()
    }

    /// Writes every buffered record as one NDJSON line and flushes the
    /// underlying writer. Consumes the emitter; a run flushes exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Setup`] on serialization or I/O failure; output
    /// loss is fatal to the run.
    pub fn finish(mut self) -> Result<usize, ScrapeError> {
        let io_err = |e: std::io::Error| ScrapeError::Setup {
            reason: format!("failed to write output: {e}"),
        };

        let count = self.records.len();
        for record in &self.records {
            let line = serde_json::to_string(record).map_err(|e| ScrapeError::Setup {
                reason: format!("failed to serialize record: {e}"),
            })?;
            self.writer.write_all(line.as_bytes()).map_err(io_err)?;
            self.writer.write_all(b"\n").map_err(io_err)?;
        }
        self.writer.flush().map_err(io_err)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> RecordDraft {
        RecordDraft {
            legal_name: Some(name.to_owned()),
            ..RecordDraft::default()
        }
    }

    #[test]
    fn normalize_requires_a_legal_name() {
        assert!(normalize(RecordDraft::default(), Portal::Empresia, "https://x.es/").is_none());
        let blank = RecordDraft {
            legal_name: Some("   ".to_owned()),
            ..RecordDraft::default()
        };
        assert!(normalize(blank, Portal::Empresia, "https://x.es/").is_none());
    }

    #[test]
    fn legal_name_is_upper_cased_on_emission() {
        let d = RecordDraft {
            legal_name: Some("Talleres Peñalver, S.L.".to_owned()),
            ..RecordDraft::default()
        };
        let record = normalize(d, Portal::PaginasAmarillas, "https://p.es/ficha/x").unwrap();
        assert_eq!(record.legal_name, "TALLERES PEÑALVER, S.L.");
    }

    #[test]
    fn normalize_trims_and_derives_domain() {
        let d = RecordDraft {
            legal_name: Some("  ACME SL  ".to_owned()),
            phone: Some("  ".to_owned()),
            website_url: Some("https://www.acme.es/contacto".to_owned()),
            ..RecordDraft::default()
        };
        let record = normalize(d, Portal::Empresite, "https://e.es/ACME.html").unwrap();
        assert_eq!(record.legal_name, "ACME SL");
        assert!(record.phone.is_none());
        assert_eq!(record.domain.as_deref(), Some("acme.es"));
        assert_eq!(record.source_portal, "empresite");
    }

    #[test]
    fn enriched_record_replaces_base_in_place() {
        let mut emitter = Emitter::new(Vec::new());
        let base =
            normalize(draft("ACME SL"), Portal::Empresite, "https://e.es/ACME.html").unwrap();
        let other =
            normalize(draft("BETA SA"), Portal::Empresite, "https://e.es/BETA.html").unwrap();
        let enriched = normalize(
            RecordDraft {
                phone: Some("930000000".to_owned()),
                ..draft("ACME SL")
            },
            Portal::Empresite,
            "https://e.es/ACME.html",
        )
        .unwrap();

        emitter.push(base);
        emitter.push(other);
        emitter.push(enriched);
        assert_eq!(emitter.buffered(), 2);

        let mut out = Vec::new();
        let emitter = {
            let mut e = Emitter::new(&mut out);
            e.push(
                normalize(draft("ACME SL"), Portal::Empresite, "https://e.es/A.html").unwrap(),
            );
            e.push(
                normalize(
                    RecordDraft {
                        cif: Some("B12345678".to_owned()),
                        ..draft("ACME SL")
                    },
                    Portal::Empresite,
                    "https://e.es/A.html",
                )
                .unwrap(),
            );
            e
        };
        let written = emitter.finish().unwrap();
        assert_eq!(written, 1);
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line.lines().count(), 1);
        assert!(line.contains("\"cif\":\"B12345678\""));
    }

    #[test]
    fn finish_writes_one_line_per_record_in_order() {
        let mut out = Vec::new();
        let mut emitter = Emitter::new(&mut out);
        emitter.push(normalize(draft("Primero"), Portal::Einforma, "https://a.es/1").unwrap());
        emitter.push(normalize(draft("Segundo"), Portal::Einforma, "https://a.es/2").unwrap());
        assert_eq!(emitter.finish().unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Primero"));
        assert!(lines[1].contains("Segundo"));
    }
}
