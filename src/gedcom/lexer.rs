//! Radläsare för GEDCOM: `LEVEL [@XREF@] TAG [värde]`

use thiserror::Error;

use super::node::Xref;

/// En rad i GEDCOM-filen
#[derive(Debug, Clone, PartialEq)]
pub struct GedcomLine {
    /// Radnummer (1-baserat)
    pub number: usize,
    pub level: u32,
    pub xref: Option<Xref>,
    pub tag: String,
    pub value: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Felaktig rad {line}: {reason} ({content:?})")]
    MalformedLine {
        line: usize,
        content: String,
        reason: &'static str,
    },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            Self::MalformedLine { line, .. } => *line,
        }
    }
}

/// Lat iterator över rader. Tomma rader hoppas över.
pub struct Lexer<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<GedcomLine, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, raw) in self.lines.by_ref() {
            if raw.trim().is_empty() {
                continue;
            }
            return Some(parse_line(raw, index + 1));
        }
        None
    }
}

/// Parsa en fysisk rad
pub fn parse_line(raw: &str, number: usize) -> Result<GedcomLine, LexError> {
    let malformed = |reason: &'static str| LexError::MalformedLine {
        line: number,
        content: raw.to_string(),
        reason,
    };

    // Ta bort BOM och radslut (\r lämnas kvar av str::lines vid blandade radslut)
    let line = raw.trim_start_matches('\u{feff}').trim_end_matches('\r');
    let line = line.trim_start();

    let (level_str, rest) = split_token(line);
    if level_str.is_empty() || !level_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("nivå saknas eller är inte ett tal"));
    }
    if level_str.len() > 1 && level_str.starts_with('0') {
        return Err(malformed("nivå får inte ha inledande nolla"));
    }
    let level: u32 = level_str.parse().map_err(|_| malformed("nivå är för stor"))?;

    let rest = rest.ok_or_else(|| malformed("tagg saknas"))?;

    let (first, after_first) = split_token(rest);
    let (xref, tag, value) = if first.starts_with('@') {
        let xref = Xref::from_pointer(first).ok_or_else(|| malformed("ogiltig xref"))?;
        let after = after_first.ok_or_else(|| malformed("tagg saknas efter xref"))?;
        let (tag, value) = split_token(after);
        (Some(xref), tag, value)
    } else {
        (None, first, after_first)
    };

    if tag.is_empty() {
        return Err(malformed("tagg saknas"));
    }
    if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed("ogiltiga tecken i tagg"));
    }

    Ok(GedcomLine {
        number,
        level,
        xref,
        tag: tag.to_ascii_uppercase(),
        value: value.map(str::to_string),
    })
}

/// Dela vid första mellanslaget. Resten returneras oförändrad (värden kan
/// börja med mellanslag, t.ex. vid CONC).
fn split_token(s: &str) -> (&str, Option<&str>) {
    match s.find(' ') {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_lines() {
        let line = parse_line("0 @I1@ INDI", 1).unwrap();
        assert_eq!(line.level, 0);
        assert_eq!(line.xref, Some(Xref::new("I1")));
        assert_eq!(line.tag, "INDI");
        assert_eq!(line.value, None);

        let line = parse_line("1 NAME Johan /Andersson/", 2).unwrap();
        assert_eq!(line.level, 1);
        assert_eq!(line.xref, None);
        assert_eq!(line.tag, "NAME");
        assert_eq!(line.value.as_deref(), Some("Johan /Andersson/"));

        let line = parse_line("1 HUSB @I1@", 3).unwrap();
        assert_eq!(line.value.as_deref(), Some("@I1@"));
    }

    #[test]
    fn test_level_zero_note_with_value() {
        let line = parse_line("0 @N1@ NOTE Första raden", 7).unwrap();
        assert_eq!(line.xref, Some(Xref::new("N1")));
        assert_eq!(line.tag, "NOTE");
        assert_eq!(line.value.as_deref(), Some("Första raden"));
        assert_eq!(line.number, 7);
    }

    #[test]
    fn test_value_is_kept_verbatim() {
        let line = parse_line("2 CONC  med inledande mellanslag ", 1).unwrap();
        assert_eq!(line.value.as_deref(), Some(" med inledande mellanslag "));

        let line = parse_line("2 CONT", 1).unwrap();
        assert_eq!(line.value, None);

        let line = parse_line("1 NOTE text\r", 1).unwrap();
        assert_eq!(line.value.as_deref(), Some("text"));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_line("X NAME Johan", 1).is_err());
        assert!(parse_line("1", 1).is_err());
        assert!(parse_line("1 @I1@", 1).is_err());
        assert!(parse_line("01 NAME Johan", 1).is_err());
        assert!(parse_line("1 NA-ME Johan", 1).is_err());
        assert!(parse_line("1 @@ INDI", 1).is_err());

        let err = parse_line("foo bar", 12).unwrap_err();
        assert_eq!(err.line(), 12);
    }

    #[test]
    fn test_lexer_skips_blank_lines_and_keeps_order() {
        let text = "0 HEAD\n\n1 CHAR UTF-8\n   \nbroken\n0 TRLR";
        let lines: Vec<_> = Lexer::new(text).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].as_ref().unwrap().tag, "HEAD");
        assert_eq!(lines[1].as_ref().unwrap().number, 3);
        assert!(lines[2].is_err());
        assert_eq!(lines[3].as_ref().unwrap().tag, "TRLR");
    }

    #[test]
    fn test_roundtrip_of_well_formed_lines() {
        let text = "0 @S1@ SOUR\n1 TITL Kyrkbok, Lund\n1 REPO @R1@\n2 CALN 123";
        for (raw, line) in text.lines().zip(Lexer::new(text)) {
            let line = line.unwrap();
            let mut rebuilt = line.level.to_string();
            if let Some(xref) = &line.xref {
                rebuilt.push_str(&format!(" @{}@", xref));
            }
            rebuilt.push(' ');
            rebuilt.push_str(&line.tag);
            if let Some(value) = &line.value {
                rebuilt.push(' ');
                rebuilt.push_str(value);
            }
            assert_eq!(rebuilt, raw);
        }
    }
}
