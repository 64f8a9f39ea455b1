//! Förhandsgranskning av en GEDCOM-fil
//!
//! Läser hela filen en gång utan att skriva något: räknar poster per typ,
//! samlar identifierare för referenskontroll och plockar ut huvudet.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::assembler::RecordAssembler;
use super::node::{ImportRecord, RecordKind, Xref};

/// Uppgifter från HEAD-posten
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderInfo {
    pub source_program: Option<String>,
    pub source_version: Option<String>,
    pub gedcom_version: Option<String>,
    pub charset: Option<String>,
    pub file_name: Option<String>,
}

impl HeaderInfo {
    fn from_record(record: &ImportRecord) -> Self {
        let node = &record.node;
        Self {
            source_program: node
                .child("SOUR")
                .and_then(|s| s.child_value("NAME").or_else(|| s.text()))
                .map(str::to_string),
            source_version: node.descendant_value(&["SOUR", "VERS"]).map(str::to_string),
            gedcom_version: node.descendant_value(&["GEDC", "VERS"]).map(str::to_string),
            charset: node.child_value("CHAR").map(str::to_string),
            file_name: node.child_value("FILE").map(str::to_string),
        }
    }
}

/// Resultat av förhandsgranskningen
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub header: HeaderInfo,
    pub has_header: bool,
    pub has_trailer: bool,
    #[serde(skip)]
    pub counts: BTreeMap<RecordKind, usize>,
    pub total_records: usize,
    #[serde(skip)]
    pub xrefs: HashMap<RecordKind, HashSet<Xref>>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count(&self, kind: &RecordKind) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    /// Antal poster som kommer att skickas till postladdarna
    pub fn dispatchable_records(&self) -> usize {
        RecordKind::DISPATCHABLE.iter().map(|k| self.count(k)).sum()
    }

    pub fn contains(&self, kind: &RecordKind, id: &Xref) -> bool {
        self.xrefs.get(kind).map(|set| set.contains(id)).unwrap_or(false)
    }

    /// Sammanfattning för utskrift
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(program) = &self.header.source_program {
            match &self.header.source_version {
                Some(version) => lines.push(format!("Källprogram: {} {}", program, version)),
                None => lines.push(format!("Källprogram: {}", program)),
            }
        }
        if let Some(version) = &self.header.gedcom_version {
            lines.push(format!("GEDCOM-version: {}", version));
        }
        if let Some(charset) = &self.header.charset {
            lines.push(format!("Teckenkodning: {}", charset));
        }
        for (kind, count) in &self.counts {
            lines.push(format!("{}: {}", kind.label(), count));
        }
        lines.push(format!(
            "{} poster, {} fel, {} varningar",
            self.total_records,
            self.errors.len(),
            self.warnings.len()
        ));
        lines.join("\n")
    }
}

/// Granska en avkodad GEDCOM-text
pub fn validate(text: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut assembler = RecordAssembler::new(text);

    for record in assembler.by_ref() {
        report.total_records += 1;
        *report.counts.entry(record.kind.clone()).or_insert(0) += 1;

        match record.kind {
            RecordKind::Header => {
                if report.has_header {
                    report.warnings.push(format!("Extra HEAD-post på rad {}", record.line));
                } else {
                    report.has_header = true;
                    report.header = HeaderInfo::from_record(&record);
                }
                if report.total_records != 1 {
                    report.warnings.push("HEAD är inte filens första post".to_string());
                }
            }
            RecordKind::Trailer => report.has_trailer = true,
            _ => {}
        }

        if !record.kind.is_dispatchable() {
            continue;
        }

        match &record.id {
            Some(id) => {
                let seen = report.xrefs.entry(record.kind.clone()).or_default();
                if !seen.insert(id.clone()) {
                    report.errors.push(format!(
                        "Dubblett av identifierare @{}@ ({}) på rad {}",
                        id, record.kind, record.line
                    ));
                }
            }
            None => report
                .warnings
                .push(format!("{} på rad {} saknar identifierare", record.kind, record.line)),
        }
    }

    report
        .warnings
        .extend(assembler.take_warnings().into_iter().map(|w| w.to_string()));

    if !report.has_header {
        report.errors.push("HEAD-post saknas".to_string());
    }
    if !report.has_trailer {
        report.warnings.push("TRLR-post saknas".to_string());
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0 HEAD
1 SOUR Disgen
2 VERS 2023
2 NAME Disgen för Windows
1 GEDC
2 VERS 5.5.1
1 CHAR UTF-8
0 @I1@ INDI
1 NAME John /Doe/
0 @I2@ INDI
1 NAME Jane /Doe/
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
0 @S1@ SOUR
1 TITL Kyrkbok
0 TRLR";

    #[test]
    fn test_counts_and_header() {
        let report = validate(SAMPLE);

        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(report.total_records, 6);
        assert_eq!(report.count(&RecordKind::Individual), 2);
        assert_eq!(report.count(&RecordKind::Family), 1);
        assert_eq!(report.count(&RecordKind::Source), 1);
        assert_eq!(report.dispatchable_records(), 4);

        assert_eq!(report.header.source_program.as_deref(), Some("Disgen för Windows"));
        assert_eq!(report.header.source_version.as_deref(), Some("2023"));
        assert_eq!(report.header.gedcom_version.as_deref(), Some("5.5.1"));
        assert_eq!(report.header.charset.as_deref(), Some("UTF-8"));

        assert!(report.contains(&RecordKind::Individual, &Xref::new("I2")));
        assert!(!report.contains(&RecordKind::Individual, &Xref::new("F1")));
    }

    #[test]
    fn test_missing_head_and_trailer() {
        let report = validate("0 @I1@ INDI\n1 NAME A /B/");
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("TRLR")));
    }

    #[test]
    fn test_duplicate_xref_is_an_error() {
        let report = validate("0 HEAD\n0 @I1@ INDI\n0 @I1@ INDI\n0 @I1@ FAM\n0 TRLR");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("@I1@"));
    }

    #[test]
    fn test_parse_problems_become_warnings() {
        let report = validate("0 HEAD\n0 INDI\n1 NAME X\ngarbage\n1 BIRT\n3 DATE 1900\n0 TRLR");
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 3);
    }
}
