//! Teckenkodning för GEDCOM-filer
//!
//! Stöder UTF-8, UTF-16 (LE/BE), ANSEL, ASCII, ANSI/Windows-1252,
//! Windows-1250/1251, ISO-8859-1/2 och Macintosh. ANSEL avkodas med en egen
//! tabell, övriga via `encoding_rs`.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Okänd teckenkodning: {0}")]
    UnknownEncoding(String),

    #[error("Kunde inte avgöra filens teckenkodning (ingen BOM, ingen CHAR-rad och inte giltig UTF-8)")]
    Undetectable,
}

/// Teckenkodningar som förekommer i GEDCOM-filer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GedcomEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Ansel,
    Ascii,
    Windows1250,
    Windows1251,
    Windows1252,
    Iso8859_1,
    Iso8859_2,
    Macintosh,
}

/// Var kodningen hämtades ifrån
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Declared,
    ByteOrderMark,
    Header,
    Sniffed,
}

impl GedcomEncoding {
    /// Tolka en kodningsetikett (CHAR-värde eller användarval)
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
            .collect::<String>()
            .to_ascii_uppercase();

        let encoding = match normalized.as_str() {
            "UTF8" => Self::Utf8,
            "UNICODE" | "UTF16" | "UTF16LE" => Self::Utf16Le,
            "UTF16BE" => Self::Utf16Be,
            "ANSEL" => Self::Ansel,
            "ASCII" | "USASCII" => Self::Ascii,
            "ANSI" | "WINDOWS" | "IBMWINDOWS" | "WINDOWS1252" | "CP1252" => Self::Windows1252,
            // CP437/CP850 saknas i encoding_rs, närmaste motsvarighet används
            "IBMPC" | "IBMDOS" | "CP437" | "CP850" => Self::Windows1252,
            "WINDOWS1250" | "CP1250" => Self::Windows1250,
            "WINDOWS1251" | "CP1251" => Self::Windows1251,
            "ISO88591" | "LATIN1" | "ISO8859" => Self::Iso8859_1,
            "ISO88592" | "LATIN2" => Self::Iso8859_2,
            "MACINTOSH" | "MACROMAN" | "MAC" => Self::Macintosh,
            _ => return None,
        };
        Some(encoding)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Ansel => "ANSEL",
            Self::Ascii => "ASCII",
            Self::Windows1250 => "WINDOWS-1250",
            Self::Windows1251 => "WINDOWS-1251",
            Self::Windows1252 => "WINDOWS-1252",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Iso8859_2 => "ISO-8859-2",
            Self::Macintosh => "MACINTOSH",
        }
    }

    fn codec(&self) -> Option<&'static encoding_rs::Encoding> {
        match self {
            Self::Utf8 => Some(encoding_rs::UTF_8),
            Self::Utf16Le => Some(encoding_rs::UTF_16LE),
            Self::Utf16Be => Some(encoding_rs::UTF_16BE),
            Self::Ansel => None,
            // ISO-8859-1 och ASCII är delmängder av Windows-1252
            Self::Ascii | Self::Windows1252 | Self::Iso8859_1 => Some(encoding_rs::WINDOWS_1252),
            Self::Windows1250 => Some(encoding_rs::WINDOWS_1250),
            Self::Windows1251 => Some(encoding_rs::WINDOWS_1251),
            Self::Iso8859_2 => Some(encoding_rs::ISO_8859_2),
            Self::Macintosh => Some(encoding_rs::MACINTOSH),
        }
    }

    fn is_utf16(&self) -> bool {
        matches!(self, Self::Utf16Le | Self::Utf16Be)
    }
}

impl fmt::Display for GedcomEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resultat av kodningsdetektering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEncoding {
    pub encoding: GedcomEncoding,
    pub source: EncodingSource,
}

/// Avkodad filtext
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: DetectedEncoding,
    /// Sant om ogiltiga byte ersattes med U+FFFD
    pub had_errors: bool,
}

/// Avgör filens teckenkodning
pub fn detect_encoding(bytes: &[u8], declared: Option<&str>) -> Result<DetectedEncoding, EncodingError> {
    if let Some(label) = declared.map(str::trim).filter(|l| !l.is_empty()) {
        let mut encoding = GedcomEncoding::from_label(label)
            .ok_or_else(|| EncodingError::UnknownEncoding(label.to_string()))?;
        // Endiannessen avgörs av filen själv
        if encoding.is_utf16() {
            encoding = sniff_utf16(bytes).unwrap_or(encoding);
        }
        return Ok(DetectedEncoding {
            encoding,
            source: EncodingSource::Declared,
        });
    }

    if let Some(encoding) = bom_encoding(bytes) {
        return Ok(DetectedEncoding {
            encoding,
            source: EncodingSource::ByteOrderMark,
        });
    }

    if let Some(encoding) = sniff_utf16(bytes) {
        return Ok(DetectedEncoding {
            encoding,
            source: EncodingSource::Sniffed,
        });
    }

    if let Some(encoding) = header_charset(bytes).and_then(|label| GedcomEncoding::from_label(&label)) {
        // UNICODE i en fil utan nollbyte är i praktiken UTF-8
        let encoding = if encoding.is_utf16() { GedcomEncoding::Utf8 } else { encoding };
        return Ok(DetectedEncoding {
            encoding,
            source: EncodingSource::Header,
        });
    }

    if std::str::from_utf8(bytes).is_ok() {
        return Ok(DetectedEncoding {
            encoding: GedcomEncoding::Utf8,
            source: EncodingSource::Sniffed,
        });
    }

    Err(EncodingError::Undetectable)
}

/// Avkoda hela filen till en sträng
pub fn decode(bytes: &[u8], declared: Option<&str>) -> Result<DecodedText, EncodingError> {
    let detected = detect_encoding(bytes, declared)?;
    let body = strip_bom(bytes, detected.encoding);

    let (text, had_errors) = match detected.encoding.codec() {
        Some(codec) => {
            let (cow, had_errors) = codec.decode_without_bom_handling(body);
            (cow.into_owned(), had_errors)
        }
        None => (decode_ansel(body).into_owned(), false),
    };

    Ok(DecodedText {
        text,
        encoding: detected,
        had_errors,
    })
}

fn bom_encoding(bytes: &[u8]) -> Option<GedcomEncoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(GedcomEncoding::Utf8)
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some(GedcomEncoding::Utf16Le)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some(GedcomEncoding::Utf16Be)
    } else {
        None
    }
}

fn sniff_utf16(bytes: &[u8]) -> Option<GedcomEncoding> {
    if let Some(encoding) = bom_encoding(bytes).filter(GedcomEncoding::is_utf16) {
        return Some(encoding);
    }
    match bytes {
        [b'0', 0, ..] => Some(GedcomEncoding::Utf16Le),
        [0, b'0', ..] => Some(GedcomEncoding::Utf16Be),
        _ => None,
    }
}

fn strip_bom(bytes: &[u8], encoding: GedcomEncoding) -> &[u8] {
    match (encoding, bom_encoding(bytes)) {
        (GedcomEncoding::Utf8, Some(GedcomEncoding::Utf8)) => &bytes[3..],
        (GedcomEncoding::Utf16Le, Some(GedcomEncoding::Utf16Le))
        | (GedcomEncoding::Utf16Be, Some(GedcomEncoding::Utf16Be)) => &bytes[2..],
        (_, Some(GedcomEncoding::Utf8)) => &bytes[3..],
        _ => bytes,
    }
}

/// Leta upp `1 CHAR` i filhuvudet. Huvudet är ASCII i alla 8-bitarskodningar.
fn header_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(64 * 1024)];
    let head = String::from_utf8_lossy(head);

    let mut in_header = false;
    for line in head.lines() {
        let line = line.trim();
        let mut parts = line.splitn(3, ' ');
        let level = parts.next().unwrap_or_default();
        let tag = parts.next().unwrap_or_default();

        if level == "0" {
            if in_header {
                break;
            }
            in_header = tag == "HEAD";
            continue;
        }

        if in_header && level == "1" && tag == "CHAR" {
            return parts.next().map(|v| v.trim().to_string());
        }
    }

    None
}

/// Avkoda ANSEL (ANSI Z39.47). Kombinerande tecken står före bastecknet i
/// ANSEL men efter i Unicode.
pub fn decode_ansel(bytes: &[u8]) -> Cow<'_, str> {
    if bytes.is_ascii() {
        // ASCII-byte är giltig UTF-8
        return String::from_utf8_lossy(bytes);
    }

    let mut out = String::with_capacity(bytes.len());
    let mut pending_marks: Vec<char> = Vec::new();

    for &b in bytes {
        if let Some(mark) = ansel_combining(b) {
            pending_marks.push(mark);
            continue;
        }

        let base = if b < 0x80 {
            b as char
        } else {
            ansel_spacing(b).unwrap_or('\u{FFFD}')
        };

        push_composed(&mut out, base, &mut pending_marks);
    }

    // Kvarvarande tecken utan bas
    out.extend(pending_marks.drain(..));

    Cow::Owned(out)
}

fn push_composed(out: &mut String, base: char, marks: &mut Vec<char>) {
    if marks.is_empty() {
        out.push(base);
        return;
    }

    let mut current = base;
    let mut leftover = Vec::new();
    // ANSEL listar tecknen i omvänd ordning mot Unicode
    for mark in marks.drain(..).rev() {
        match compose(current, mark) {
            Some(composed) if leftover.is_empty() => current = composed,
            _ => leftover.push(mark),
        }
    }

    out.push(current);
    out.extend(leftover);
}

fn ansel_spacing(b: u8) -> Option<char> {
    let c = match b {
        0xA1 => 'Ł',
        0xA2 => 'Ø',
        0xA3 => 'Đ',
        0xA4 => 'Þ',
        0xA5 => 'Æ',
        0xA6 => 'Œ',
        0xA7 => 'ʹ',
        0xA8 => '·',
        0xA9 => '♭',
        0xAA => '®',
        0xAB => '±',
        0xAC => 'Ơ',
        0xAD => 'Ư',
        0xAE => 'ʼ',
        0xB0 => 'ʻ',
        0xB1 => 'ł',
        0xB2 => 'ø',
        0xB3 => 'đ',
        0xB4 => 'þ',
        0xB5 => 'æ',
        0xB6 => 'œ',
        0xB7 => 'ʺ',
        0xB8 => 'ı',
        0xB9 => '£',
        0xBA => 'ð',
        0xBC => 'ơ',
        0xBD => 'ư',
        0xBE => '□',
        0xBF => '■',
        0xC0 => '°',
        0xC1 => 'ℓ',
        0xC2 => '℗',
        0xC3 => '©',
        0xC4 => '♯',
        0xC5 => '¿',
        0xC6 => '¡',
        0xC7 | 0xCF => 'ß',
        0xC8 => '€',
        _ => return None,
    };
    Some(c)
}

fn ansel_combining(b: u8) -> Option<char> {
    let c = match b {
        0xE0 => '\u{0309}',
        0xE1 => '\u{0300}',
        0xE2 => '\u{0301}',
        0xE3 => '\u{0302}',
        0xE4 => '\u{0303}',
        0xE5 => '\u{0304}',
        0xE6 => '\u{0306}',
        0xE7 => '\u{0307}',
        0xE8 => '\u{0308}',
        0xE9 => '\u{030C}',
        0xEA => '\u{030A}',
        0xEB => '\u{FE20}',
        0xEC => '\u{FE21}',
        0xED => '\u{0315}',
        0xEE => '\u{030B}',
        0xEF => '\u{0310}',
        0xF0 => '\u{0327}',
        0xF1 => '\u{0328}',
        0xF2 => '\u{0323}',
        0xF3 => '\u{0324}',
        0xF4 => '\u{0325}',
        0xF5 => '\u{0333}',
        0xF6 => '\u{0332}',
        0xF7 => '\u{0326}',
        0xF8 => '\u{031C}',
        0xF9 => '\u{032E}',
        0xFA => '\u{FE22}',
        0xFB => '\u{FE23}',
        0xFE => '\u{0313}',
        _ => return None,
    };
    Some(c)
}

/// Sammansätt vanliga latinska bokstäver med diakritiska tecken
fn compose(base: char, mark: char) -> Option<char> {
    let composed = match (mark, base) {
        ('\u{0300}', 'A') => 'À',
        ('\u{0300}', 'a') => 'à',
        ('\u{0300}', 'E') => 'È',
        ('\u{0300}', 'e') => 'è',
        ('\u{0300}', 'I') => 'Ì',
        ('\u{0300}', 'i') => 'ì',
        ('\u{0300}', 'O') => 'Ò',
        ('\u{0300}', 'o') => 'ò',
        ('\u{0300}', 'U') => 'Ù',
        ('\u{0300}', 'u') => 'ù',
        ('\u{0301}', 'A') => 'Á',
        ('\u{0301}', 'a') => 'á',
        ('\u{0301}', 'E') => 'É',
        ('\u{0301}', 'e') => 'é',
        ('\u{0301}', 'I') => 'Í',
        ('\u{0301}', 'i') => 'í',
        ('\u{0301}', 'O') => 'Ó',
        ('\u{0301}', 'o') => 'ó',
        ('\u{0301}', 'U') => 'Ú',
        ('\u{0301}', 'u') => 'ú',
        ('\u{0301}', 'Y') => 'Ý',
        ('\u{0301}', 'y') => 'ý',
        ('\u{0301}', 'C') => 'Ć',
        ('\u{0301}', 'c') => 'ć',
        ('\u{0301}', 'N') => 'Ń',
        ('\u{0301}', 'n') => 'ń',
        ('\u{0301}', 'S') => 'Ś',
        ('\u{0301}', 's') => 'ś',
        ('\u{0301}', 'Z') => 'Ź',
        ('\u{0301}', 'z') => 'ź',
        ('\u{0302}', 'A') => 'Â',
        ('\u{0302}', 'a') => 'â',
        ('\u{0302}', 'E') => 'Ê',
        ('\u{0302}', 'e') => 'ê',
        ('\u{0302}', 'I') => 'Î',
        ('\u{0302}', 'i') => 'î',
        ('\u{0302}', 'O') => 'Ô',
        ('\u{0302}', 'o') => 'ô',
        ('\u{0302}', 'U') => 'Û',
        ('\u{0302}', 'u') => 'û',
        ('\u{0303}', 'A') => 'Ã',
        ('\u{0303}', 'a') => 'ã',
        ('\u{0303}', 'N') => 'Ñ',
        ('\u{0303}', 'n') => 'ñ',
        ('\u{0303}', 'O') => 'Õ',
        ('\u{0303}', 'o') => 'õ',
        ('\u{0308}', 'A') => 'Ä',
        ('\u{0308}', 'a') => 'ä',
        ('\u{0308}', 'E') => 'Ë',
        ('\u{0308}', 'e') => 'ë',
        ('\u{0308}', 'I') => 'Ï',
        ('\u{0308}', 'i') => 'ï',
        ('\u{0308}', 'O') => 'Ö',
        ('\u{0308}', 'o') => 'ö',
        ('\u{0308}', 'U') => 'Ü',
        ('\u{0308}', 'u') => 'ü',
        ('\u{0308}', 'y') => 'ÿ',
        ('\u{030A}', 'A') => 'Å',
        ('\u{030A}', 'a') => 'å',
        ('\u{030A}', 'U') => 'Ů',
        ('\u{030A}', 'u') => 'ů',
        ('\u{0327}', 'C') => 'Ç',
        ('\u{0327}', 'c') => 'ç',
        ('\u{0327}', 'S') => 'Ş',
        ('\u{0327}', 's') => 'ş',
        ('\u{030C}', 'C') => 'Č',
        ('\u{030C}', 'c') => 'č',
        ('\u{030C}', 'S') => 'Š',
        ('\u{030C}', 's') => 'š',
        ('\u{030C}', 'Z') => 'Ž',
        ('\u{030C}', 'z') => 'ž',
        ('\u{030C}', 'R') => 'Ř',
        ('\u{030C}', 'r') => 'ř',
        ('\u{030C}', 'E') => 'Ě',
        ('\u{030C}', 'e') => 'ě',
        ('\u{030C}', 'N') => 'Ň',
        ('\u{030C}', 'n') => 'ň',
        ('\u{0328}', 'A') => 'Ą',
        ('\u{0328}', 'a') => 'ą',
        ('\u{0328}', 'E') => 'Ę',
        ('\u{0328}', 'e') => 'ę',
        ('\u{0307}', 'Z') => 'Ż',
        ('\u{0307}', 'z') => 'ż',
        _ => return None,
    };
    Some(composed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_header() {
        let bytes = b"0 HEAD\n1 SOUR Test\n1 CHAR ANSEL\n0 TRLR\n";
        let detected = detect_encoding(bytes, None).unwrap();
        assert_eq!(detected.encoding, GedcomEncoding::Ansel);
        assert_eq!(detected.source, EncodingSource::Header);

        let bytes = b"0 HEAD\n1 CHAR ANSI\n0 TRLR\n";
        assert_eq!(
            detect_encoding(bytes, None).unwrap().encoding,
            GedcomEncoding::Windows1252
        );
    }

    #[test]
    fn test_declared_overrides_header() {
        let bytes = b"0 HEAD\n1 CHAR ANSEL\n0 TRLR\n";
        let detected = detect_encoding(bytes, Some("windows-1250")).unwrap();
        assert_eq!(detected.encoding, GedcomEncoding::Windows1250);
        assert_eq!(detected.source, EncodingSource::Declared);

        assert_eq!(
            detect_encoding(bytes, Some("EBCDIC")),
            Err(EncodingError::UnknownEncoding("EBCDIC".into()))
        );
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("0 HEAD\n1 NAME Åsa\n".as_bytes());
        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.encoding.source, EncodingSource::ByteOrderMark);
        assert!(decoded.text.starts_with("0 HEAD"));
        assert!(decoded.text.contains("Åsa"));
    }

    #[test]
    fn test_utf16_without_bom() {
        let text = "0 HEAD\n1 CHAR UNICODE\n";
        let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.encoding.encoding, GedcomEncoding::Utf16Le);
        assert_eq!(decoded.text, text);
    }

    #[test]
    fn test_windows_1252() {
        let bytes = b"0 HEAD\n1 CHAR ANSI\n0 @I1@ INDI\n1 NAME G\xF6ran /\xC5kesson/\n";
        let decoded = decode(bytes, None).unwrap();
        assert!(decoded.text.contains("Göran /Åkesson/"));
        assert!(!decoded.had_errors);
    }

    #[test]
    fn test_ansel_combining_marks() {
        // ANSEL: diakrit före bastecken
        let bytes = [b'G', 0xE8, b'o', b'r', 0xE2, b'e', b'n', b' ', 0xEA, b'A', 0xB2];
        assert_eq!(decode_ansel(&bytes), "Görén Åø");
    }

    #[test]
    fn test_ansel_uncomposable_mark_kept_decomposed() {
        let bytes = [0xE5, b'x'];
        assert_eq!(decode_ansel(&bytes), "x\u{0304}");
    }

    #[test]
    fn test_undetectable_encoding() {
        let bytes = [0x30, 0x20, 0x48, 0x45, 0x41, 0x44, 0x0A, 0xFF, 0xFE, 0xC3, 0x28];
        assert_eq!(detect_encoding(&bytes[..], None), Err(EncodingError::Undetectable));
    }
}
