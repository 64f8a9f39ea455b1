//! Bygger posträd av radflödet från lexern
//!
//! En stack indexerad på nivå: en rad blir barn till närmaste nod med lägre
//! nivå. Nivå 0 startar en ny post. CONT/CONC slås ihop med föräldernodens
//! värde här, inte i lexern.

use thiserror::Error;

use super::lexer::{GedcomLine, LexError, Lexer};
use super::node::{ImportRecord, RawNode};

/// Återhämtningsbara problem under sammansättningen
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyWarning {
    #[error(transparent)]
    Malformed(#[from] LexError),

    #[error("Rad {line}: nivåhopp från {from} till {to}, raden läggs under närmaste förälder")]
    UnexpectedLevelJump { line: usize, from: u32, to: u32 },

    #[error("Rad {line}: rad på nivå {level} före första posten ignoreras")]
    OrphanLine { line: usize, level: u32 },
}

impl AssemblyWarning {
    pub fn line(&self) -> usize {
        match self {
            Self::Malformed(e) => e.line(),
            Self::UnexpectedLevelJump { line, .. } | Self::OrphanLine { line, .. } => *line,
        }
    }
}

/// Lat iterator över toppnivåposter
pub struct RecordAssembler<'a> {
    lexer: Lexer<'a>,
    pending: Option<GedcomLine>,
    warnings: Vec<AssemblyWarning>,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lexer: Lexer::new(text),
            pending: None,
            warnings: Vec::new(),
        }
    }

    /// Hämta och töm insamlade varningar
    pub fn take_warnings(&mut self) -> Vec<AssemblyWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn next_line(&mut self) -> Option<GedcomLine> {
        if let Some(line) = self.pending.take() {
            return Some(line);
        }
        loop {
            match self.lexer.next()? {
                Ok(line) => return Some(line),
                Err(e) => {
                    tracing::debug!("{}", e);
                    self.warnings.push(AssemblyWarning::Malformed(e));
                }
            }
        }
    }

    fn line_to_node(line: GedcomLine) -> RawNode {
        let mut node = RawNode::new(line.level, line.tag, line.value);
        node.xref = line.xref;
        node
    }

    /// Fäll ihop stacken till nivå `level` (noder med nivå >= level hängs på sin förälder)
    fn unwind(stack: &mut Vec<RawNode>, level: u32) {
        while stack.len() > 1 && stack.last().map(|n| n.level >= level).unwrap_or(false) {
            if let Some(node) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
        }
    }

    fn append_continuation(target: &mut RawNode, line: &GedcomLine) {
        let mut value = target.value.take().unwrap_or_default();
        if line.tag == "CONT" {
            value.push('\n');
        }
        if let Some(extra) = &line.value {
            value.push_str(extra);
        }
        target.value = Some(value);
    }
}

impl<'a> Iterator for RecordAssembler<'a> {
    type Item = ImportRecord;

    fn next(&mut self) -> Option<Self::Item> {
        // Hitta nästa rad på nivå 0
        let start = loop {
            let line = self.next_line()?;
            if line.level == 0 {
                break line;
            }
            self.warnings.push(AssemblyWarning::OrphanLine {
                line: line.number,
                level: line.level,
            });
        };

        let start_line = start.number;
        let mut stack = vec![Self::line_to_node(start)];

        while let Some(line) = self.next_line() {
            if line.level == 0 {
                self.pending = Some(line);
                break;
            }

            Self::unwind(&mut stack, line.level);
            let parent_level = stack.last().map(|n| n.level).unwrap_or(0);

            if line.level > parent_level + 1 {
                self.warnings.push(AssemblyWarning::UnexpectedLevelJump {
                    line: line.number,
                    from: parent_level,
                    to: line.level,
                });
            }

            if line.tag == "CONT" || line.tag == "CONC" {
                if let Some(target) = stack.last_mut() {
                    Self::append_continuation(target, &line);
                }
                continue;
            }

            stack.push(Self::line_to_node(line));
        }

        Self::unwind(&mut stack, 1);
        let root = stack.pop()?;
        Some(ImportRecord::from_node(root, start_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::node::{RecordKind, Xref};

    fn assemble(text: &str) -> (Vec<ImportRecord>, Vec<AssemblyWarning>) {
        let mut assembler = RecordAssembler::new(text);
        let records: Vec<_> = assembler.by_ref().collect();
        let warnings = assembler.take_warnings();
        (records, warnings)
    }

    #[test]
    fn test_builds_tree_by_level() {
        let text = "0 HEAD\n1 SOUR Test\n0 @I1@ INDI\n1 NAME John /Doe/\n1 BIRT\n2 DATE 1950\n2 PLAC Lund\n1 SEX M\n0 TRLR";
        let (records, warnings) = assemble(text);

        assert!(warnings.is_empty());
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind, RecordKind::Header);

        let indi = &records[1];
        assert_eq!(indi.kind, RecordKind::Individual);
        assert_eq!(indi.id, Some(Xref::new("I1")));
        assert_eq!(indi.line, 3);
        assert_eq!(indi.node.children.len(), 3);
        assert_eq!(indi.node.descendant_value(&["BIRT", "DATE"]), Some("1950"));
        assert_eq!(indi.node.descendant_value(&["BIRT", "PLAC"]), Some("Lund"));
        assert_eq!(indi.node.child_value("SEX"), Some("M"));

        assert_eq!(records[2].kind, RecordKind::Trailer);
    }

    #[test]
    fn test_cont_and_conc() {
        let (records, _) = assemble("0 @I1@ INDI\n1 NOTE Hello\n2 CONT World");
        assert_eq!(records[0].node.child("NOTE").unwrap().value.as_deref(), Some("Hello\nWorld"));

        let (records, _) = assemble("0 @I1@ INDI\n1 NOTE Hello\n2 CONC World");
        assert_eq!(records[0].node.child("NOTE").unwrap().value.as_deref(), Some("HelloWorld"));
    }

    #[test]
    fn test_continuation_on_level_zero_note() {
        let text = "0 @N1@ NOTE Rad ett\n1 CONT\n1 CONT Rad tre\n1 CONC  slut\n0 TRLR";
        let (records, _) = assemble(text);
        assert_eq!(records[0].kind, RecordKind::Note);
        assert_eq!(records[0].node.value.as_deref(), Some("Rad ett\n\nRad tre slut"));
        assert!(records[0].node.children.is_empty());
    }

    #[test]
    fn test_level_jump_attaches_to_current_parent() {
        let text = "0 @I1@ INDI\n1 BIRT\n3 DATE 1900\n1 SEX F";
        let (records, warnings) = assemble(text);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            AssemblyWarning::UnexpectedLevelJump { line: 3, from: 1, to: 3 }
        ));
        let birt = records[0].node.child("BIRT").unwrap();
        assert_eq!(birt.child_value("DATE"), Some("1900"));
        assert_eq!(records[0].node.child_value("SEX"), Some("F"));
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let text = "0 @I1@ INDI\n1 NAME Anna /Berg/\nthis is garbage\n1 SEX F\n0 TRLR";
        let (records, warnings) = assemble(text);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].node.children.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line(), 3);
    }

    #[test]
    fn test_orphan_lines_before_first_record() {
        let (records, warnings) = assemble("1 NAME Nobody\n0 @I1@ INDI");
        assert_eq!(records.len(), 1);
        assert!(matches!(warnings[0], AssemblyWarning::OrphanLine { line: 1, level: 1 }));
    }

    #[test]
    fn test_assembler_is_lazy() {
        let text = "0 @I1@ INDI\n0 @I2@ INDI\n0 @I3@ INDI";
        let mut assembler = RecordAssembler::new(text);
        let first = assembler.next().unwrap();
        assert_eq!(first.id, Some(Xref::new("I1")));
        // Nästa post har redan lästs in som väntande rad men inte byggts
        assert!(assembler.pending.is_some());
        assert_eq!(assembler.count(), 2);
    }
}
