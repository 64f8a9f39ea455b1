//! Normalisering av GEDCOM-datum
//!
//! Tolkar datumgrammatiken i GEDCOM 5.5.1 (dag, månad, år, dubbeldatering,
//! kvalifikatorer och intervall) till en kanonisk sträng och ett sorterbart
//! år. Otolkbara datum ger tom sträng och en varning, aldrig panik.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hur exakt ett datum är
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Exact,
    Approximate,
    Range,
}

impl DatePrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Approximate => "approximate",
            Self::Range => "range",
        }
    }
}

/// Resultat av datumkonvertering
#[derive(Debug, Clone, PartialEq)]
pub struct DateConversion {
    /// Kanonisk form, tom om datumet inte kunde tolkas
    pub date: String,
    /// Sorterbart år (nystilsår vid dubbeldatering, negativt för f.Kr.)
    pub year: Option<i32>,
    pub precision: DatePrecision,
    pub warning: Option<String>,
}

impl DateConversion {
    fn empty() -> Self {
        Self {
            date: String::new(),
            year: None,
            precision: DatePrecision::Exact,
            warning: None,
        }
    }

    fn unparseable(raw: &str) -> Self {
        Self {
            warning: Some(format!("Kunde inte tolka datum: {:?}", raw.trim())),
            ..Self::empty()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.date.is_empty()
    }

    /// Kanoniskt datum eller None om tomt
    pub fn date_opt(&self) -> Option<String> {
        if self.date.is_empty() {
            None
        } else {
            Some(self.date.clone())
        }
    }
}

/// Datumkvalifikatorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateQualifier {
    /// Omkring (ABT)
    About,
    /// Beräknat (CAL)
    Calculated,
    /// Uppskattat (EST)
    Estimated,
    /// Tolkat (INT)
    Interpreted,
    /// Före (BEF)
    Before,
    /// Efter (AFT)
    After,
}

impl DateQualifier {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "ABT" | "ABOUT" | "CIRCA" | "CA" | "C" => Some(Self::About),
            "CAL" | "CALCULATED" => Some(Self::Calculated),
            "EST" | "ESTIMATED" => Some(Self::Estimated),
            "INT" | "INTERPRETED" => Some(Self::Interpreted),
            "BEF" | "BEFORE" => Some(Self::Before),
            "AFT" | "AFTER" => Some(Self::After),
            _ => None,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::About => "ABT",
            Self::Calculated => "CAL",
            Self::Estimated => "EST",
            Self::Interpreted => "INT",
            Self::Before => "BEF",
            Self::After => "AFT",
        }
    }

    fn precision(&self) -> DatePrecision {
        match self {
            Self::Before | Self::After => DatePrecision::Range,
            _ => DatePrecision::Approximate,
        }
    }
}

/// Ett enkelt datum utan kvalifikator
#[derive(Debug, Clone, PartialEq)]
struct SimpleDate {
    calendar: Option<String>,
    day: Option<u32>,
    month: Option<u32>,
    year: i32,
    /// Dubbeldatering, t.ex. "32" i "1731/32"
    dual: Option<String>,
    bc: bool,
}

impl SimpleDate {
    fn sort_year(&self) -> i32 {
        let year = match &self.dual {
            Some(suffix) => new_style_year(self.year, suffix),
            None => self.year,
        };
        if self.bc {
            -year
        } else {
            year
        }
    }

    fn canonical(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(calendar) = &self.calendar {
            parts.push(calendar.clone());
        }
        if let Some(day) = self.day {
            parts.push(day.to_string());
        }
        if let Some(month) = self.month {
            parts.push(MONTHS[(month - 1) as usize].to_string());
        }
        match &self.dual {
            Some(suffix) => parts.push(format!("{}/{}", self.year, suffix)),
            None => parts.push(self.year.to_string()),
        }
        if self.bc {
            parts.push("B.C.".to_string());
        }
        parts.join(" ")
    }
}

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

fn parse_month(s: &str) -> Option<u32> {
    match s {
        "JAN" | "JANUARY" => Some(1),
        "FEB" | "FEBRUARY" => Some(2),
        "MAR" | "MARCH" => Some(3),
        "APR" | "APRIL" => Some(4),
        "MAY" => Some(5),
        "JUN" | "JUNE" => Some(6),
        "JUL" | "JULY" => Some(7),
        "AUG" | "AUGUST" => Some(8),
        "SEP" | "SEPT" | "SEPTEMBER" => Some(9),
        "OCT" | "OCTOBER" => Some(10),
        "NOV" | "NOVEMBER" => Some(11),
        "DEC" | "DECEMBER" => Some(12),
        _ => None,
    }
}

/// 1731/32 → 1732, 1699/00 → 1700
fn new_style_year(year: i32, suffix: &str) -> i32 {
    let Ok(tail) = suffix.parse::<i32>() else {
        return year;
    };
    let modulus = 10_i32.pow(suffix.len() as u32);
    let candidate = year - year.rem_euclid(modulus) + tail;
    if candidate < year {
        candidate + modulus
    } else {
        candidate
    }
}

fn parse_year(token: &str) -> Option<(i32, Option<String>)> {
    let (year_str, dual) = match token.split_once('/') {
        Some((year, suffix)) if !suffix.is_empty() && suffix.len() <= 2 => (year, Some(suffix)),
        Some(_) => return None,
        None => (token, None),
    };

    if year_str.is_empty() || year_str.len() > 4 || !year_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(suffix) = dual {
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let year: i32 = year_str.parse().ok()?;
    if year == 0 {
        return None;
    }
    Some((year, dual.map(str::to_string)))
}

fn parse_simple(tokens: &[String]) -> Option<SimpleDate> {
    let mut tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let calendar = match tokens.first() {
        Some(t) if t.starts_with("@#D") && t.ends_with('@') => {
            let calendar = t.to_string();
            tokens.remove(0);
            Some(calendar)
        }
        _ => None,
    };

    let bc = matches!(tokens.last(), Some(&("B.C" | "BC" | "BCE")));
    if bc {
        tokens.pop();
    }

    let (day, month, year_token) = match tokens.as_slice() {
        [year] => {
            // ISO-format: 1850-05-23
            if let Ok(date) = NaiveDate::parse_from_str(year, "%Y-%m-%d") {
                return Some(SimpleDate {
                    calendar,
                    day: Some(chrono::Datelike::day(&date)),
                    month: Some(chrono::Datelike::month(&date)),
                    year: chrono::Datelike::year(&date),
                    dual: None,
                    bc,
                });
            }
            (None, None, *year)
        }
        [month, year] => (None, Some(parse_month(month)?), *year),
        [day, month, year] => {
            let day: u32 = day.parse().ok()?;
            (Some(day), Some(parse_month(month)?), *year)
        }
        _ => return None,
    };

    let (year, dual) = parse_year(year_token)?;

    if let (Some(day), Some(month)) = (day, month) {
        if !(1..=31).contains(&day) {
            return None;
        }
        // Kontrollera giltigt datum i den gregorianska kalendern
        let gregorian = calendar.as_deref().map_or(true, |c| c == "@#DGREGORIAN@");
        if gregorian && !bc {
            let check_year = match &dual {
                Some(suffix) => new_style_year(year, suffix),
                None => year,
            };
            NaiveDate::from_ymd_opt(check_year, month, day)?;
        }
    }

    Some(SimpleDate {
        calendar,
        day,
        month,
        year,
        dual,
        bc,
    })
}

/// Dela av en avslutande fras inom parentes: "INT 1900 (omkring)"
fn split_phrase(s: &str) -> (&str, Option<&str>) {
    match (s.find('('), s.ends_with(')')) {
        (Some(open), true) => (s[..open].trim(), Some(&s[open..])),
        _ => (s, None),
    }
}

fn normalize_token(token: &str) -> String {
    let upper = token.to_uppercase();
    if upper == "B.C." {
        return "B.C".to_string();
    }
    upper.trim_end_matches('.').to_string()
}

/// Konvertera en GEDCOM-datumsträng
pub fn convert_gedcom_date(raw: &str) -> DateConversion {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DateConversion::empty();
    }

    let (body, phrase) = split_phrase(trimmed);
    let tokens: Vec<String> = body.split_whitespace().map(normalize_token).collect();

    let Some((date, year, precision)) = parse_tokens(&tokens, phrase) else {
        return DateConversion::unparseable(raw);
    };

    DateConversion {
        date,
        year: Some(year),
        precision,
        warning: None,
    }
}

fn parse_tokens(tokens: &[String], phrase: Option<&str>) -> Option<(String, i32, DatePrecision)> {
    let first = tokens.first()?.as_str();

    if let Some(qualifier) = DateQualifier::from_token(first) {
        let date = parse_simple(&tokens[1..])?;
        let mut canonical = format!("{} {}", qualifier.tag(), date.canonical());
        if qualifier == DateQualifier::Interpreted {
            if let Some(phrase) = phrase {
                canonical.push(' ');
                canonical.push_str(phrase);
            }
        } else if phrase.is_some() {
            return None;
        }
        return Some((canonical, date.sort_year(), qualifier.precision()));
    }

    if phrase.is_some() {
        return None;
    }

    match first {
        "BET" | "BETWEEN" => {
            let and = tokens.iter().position(|t| t == "AND")?;
            let start = parse_simple(&tokens[1..and])?;
            let end = parse_simple(&tokens[and + 1..])?;
            Some((
                format!("BET {} AND {}", start.canonical(), end.canonical()),
                start.sort_year(),
                DatePrecision::Range,
            ))
        }
        "FROM" => match tokens.iter().position(|t| t == "TO") {
            Some(to) => {
                let start = parse_simple(&tokens[1..to])?;
                let end = parse_simple(&tokens[to + 1..])?;
                Some((
                    format!("FROM {} TO {}", start.canonical(), end.canonical()),
                    start.sort_year(),
                    DatePrecision::Range,
                ))
            }
            None => {
                let start = parse_simple(&tokens[1..])?;
                Some((format!("FROM {}", start.canonical()), start.sort_year(), DatePrecision::Range))
            }
        },
        "TO" => {
            let end = parse_simple(&tokens[1..])?;
            Some((format!("TO {}", end.canonical()), end.sort_year(), DatePrecision::Range))
        }
        _ => {
            let date = parse_simple(tokens)?;
            Some((date.canonical(), date.sort_year(), DatePrecision::Exact))
        }
    }
}
