use std::collections::BTreeMap;

use serde::Serialize;

use crate::gedcom::RecordKind;

/// Räknare för en posttyp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl KindCounts {
    pub fn total(&self) -> usize {
        self.imported + self.updated + self.skipped + self.errors
    }
}

/// Resultat av en GEDCOM-import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    #[serde(skip)]
    pub counts: BTreeMap<RecordKind, KindCounts>,
    /// Fel som räknats per post
    pub errors: Vec<String>,
    /// Datakvalitetsproblem och överhoppade poster
    pub warnings: Vec<String>,
    /// Sant om importen avbröts av ett allvarligt fel efter att data skrivits
    pub partial: bool,
}

impl ImportResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts_for(&self, kind: &RecordKind) -> KindCounts {
        self.counts.get(kind).copied().unwrap_or_default()
    }

    fn entry(&mut self, kind: &RecordKind) -> &mut KindCounts {
        self.counts.entry(kind.clone()).or_default()
    }

    pub fn record_imported(&mut self, kind: &RecordKind) {
        self.entry(kind).imported += 1;
    }

    pub fn record_updated(&mut self, kind: &RecordKind) {
        self.entry(kind).updated += 1;
    }

    pub fn record_skipped(&mut self, kind: &RecordKind, warning: impl Into<String>) {
        self.entry(kind).skipped += 1;
        self.warnings.push(warning.into());
    }

    /// Överhoppad post utan egen varning, t.ex. för avstängda posttyper
    pub fn record_skipped_quietly(&mut self, kind: &RecordKind) {
        self.entry(kind).skipped += 1;
    }

    pub fn record_error(&mut self, kind: &RecordKind, error: impl Into<String>) {
        self.entry(kind).errors += 1;
        self.errors.push(error.into());
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn total_imported(&self) -> usize {
        self.counts.values().map(|c| c.imported).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.counts.values().map(|c| c.updated).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.counts.values().map(|c| c.skipped).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.counts.values().map(|c| c.errors).sum()
    }

    /// Sammanfattning av importen
    pub fn summary(&self) -> String {
        format!(
            "{} importerade, {} uppdaterade{}{}{}",
            self.total_imported(),
            self.total_updated(),
            if self.total_skipped() > 0 {
                format!(", {} överhoppade", self.total_skipped())
            } else {
                String::new()
            },
            if self.total_errors() > 0 {
                format!(", {} fel", self.total_errors())
            } else {
                String::new()
            },
            if self.partial { " (ofullständig)" } else { "" }
        )
    }

    /// Tabell per posttyp för utskrift
    pub fn table(&self) -> String {
        let mut lines = vec![format!(
            "{:<14} {:>10} {:>10} {:>10} {:>6}",
            "Typ", "Importerade", "Uppdaterade", "Överhoppade", "Fel"
        )];
        for (kind, c) in &self.counts {
            lines.push(format!(
                "{:<14} {:>10} {:>10} {:>10} {:>6}",
                kind.label(),
                c.imported,
                c.updated,
                c.skipped,
                c.errors
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_summary() {
        let mut result = ImportResult::new();
        result.record_imported(&RecordKind::Individual);
        result.record_imported(&RecordKind::Individual);
        result.record_updated(&RecordKind::Family);
        result.record_skipped(&RecordKind::Individual, "@I3@ hoppades över");
        result.record_error(&RecordKind::Source, "S1: fel");

        assert_eq!(result.counts_for(&RecordKind::Individual).imported, 2);
        assert_eq!(result.counts_for(&RecordKind::Individual).total(), 3);
        assert_eq!(result.counts_for(&RecordKind::Note), KindCounts::default());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.summary(), "2 importerade, 1 uppdaterade, 1 överhoppade, 1 fel");
        assert!(result.table().contains("Personer"));
    }
}
