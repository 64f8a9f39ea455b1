use serde::{Deserialize, Serialize};
use std::fmt;

/// Vilken sorts entitet en händelse, källhänvisning eller länk hör till
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Family,
    Source,
    Repository,
    Note,
    Media,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Family => "family",
            Self::Source => "source",
            Self::Repository => "repository",
            Self::Note => "note",
            Self::Media => "media",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "person" => Some(Self::Person),
            "family" => Some(Self::Family),
            "source" => Some(Self::Source),
            "repository" => Some(Self::Repository),
            "note" => Some(Self::Note),
            "media" => Some(Self::Media),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// En händelse eller ett attribut (födelse, vigsel, yrke, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Option<i64>,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub tree_id: String,
    /// GEDCOM-tagg, t.ex. BIRT eller OCCU. För EVEN används TYPE om den finns.
    pub event_type: String,
    pub event_date: Option<String>,
    pub event_year: Option<i32>,
    pub event_place: Option<String>,
    /// Attributvärde eller beskrivning
    pub details: Option<String>,
}

impl Event {
    pub fn new(
        entity_id: impl Into<String>,
        entity_type: EntityType,
        tree_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id: None,
            entity_id: entity_id.into(),
            entity_type,
            tree_id: tree_id.into(),
            event_type: event_type.into(),
            event_date: None,
            event_year: None,
            event_place: None,
            details: None,
        }
    }

    /// Samma händelse oavsett id (används vid sammanslagning)
    pub fn same_as(&self, other: &Event) -> bool {
        self.event_type == other.event_type
            && self.event_date == other.event_date
            && self.event_place == other.event_place
            && self.details == other.details
    }
}

/// Svensk benämning för vanliga händelsetaggar
pub fn event_label(tag: &str) -> &str {
    match tag {
        "BIRT" => "Födelse",
        "CHR" => "Dop",
        "BAPM" => "Dop",
        "DEAT" => "Död",
        "BURI" => "Begravning",
        "CREM" => "Kremering",
        "MARR" => "Vigsel",
        "ENGA" => "Förlovning",
        "DIV" => "Skilsmässa",
        "OCCU" => "Yrke",
        "RESI" => "Bostad",
        "EMIG" => "Utflyttning",
        "IMMI" => "Inflyttning",
        "CENS" => "Folkräkning",
        "CONF" => "Konfirmation",
        other => other,
    }
}
