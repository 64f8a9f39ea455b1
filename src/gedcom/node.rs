//! Datastrukturer för GEDCOM-noder och poster

use std::fmt;

/// GEDCOM-identifierare utan omslutande `@` (t.ex. "I1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Xref(String);

impl Xref {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Tolka ett pekarvärde som `@I1@`. Escape-sekvenser (`@#D...@`) och
    /// tomma pekare (`@@`) räknas inte som pekare.
    pub fn from_pointer(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() < 3 || !value.starts_with('@') || !value.ends_with('@') {
            return None;
        }
        let inner = &value[1..value.len() - 1];
        if inner.is_empty() || inner.starts_with('#') || inner.contains('@') {
            return None;
        }
        Some(Self(inner.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Xref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Xref {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Typ av toppnivåpost
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Individual,
    Family,
    Source,
    Repository,
    Note,
    Media,
    Header,
    Submitter,
    Trailer,
    Other(String),
}

impl RecordKind {
    /// Alla typer som har en egen postladdare
    pub const DISPATCHABLE: [RecordKind; 6] = [
        RecordKind::Individual,
        RecordKind::Family,
        RecordKind::Source,
        RecordKind::Repository,
        RecordKind::Note,
        RecordKind::Media,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "INDI" => Self::Individual,
            "FAM" => Self::Family,
            "SOUR" => Self::Source,
            "REPO" => Self::Repository,
            "NOTE" | "SNOTE" => Self::Note,
            "OBJE" => Self::Media,
            "HEAD" => Self::Header,
            "SUBM" | "SUBN" => Self::Submitter,
            "TRLR" => Self::Trailer,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Individual => "INDI",
            Self::Family => "FAM",
            Self::Source => "SOUR",
            Self::Repository => "REPO",
            Self::Note => "NOTE",
            Self::Media => "OBJE",
            Self::Header => "HEAD",
            Self::Submitter => "SUBM",
            Self::Trailer => "TRLR",
            Self::Other(tag) => tag,
        }
    }

    /// Nyckel som används i databasen (id-mappning, länktabeller)
    pub fn key(&self) -> &str {
        match self {
            Self::Individual => "person",
            Self::Family => "family",
            Self::Source => "source",
            Self::Repository => "repository",
            Self::Note => "note",
            Self::Media => "media",
            Self::Header => "header",
            Self::Submitter => "submitter",
            Self::Trailer => "trailer",
            Self::Other(tag) => tag,
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "person" => Self::Individual,
            "family" => Self::Family,
            "source" => Self::Source,
            "repository" => Self::Repository,
            "note" => Self::Note,
            "media" => Self::Media,
            "header" => Self::Header,
            "submitter" => Self::Submitter,
            "trailer" => Self::Trailer,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        Self::DISPATCHABLE.contains(self)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Individual => "Personer",
            Self::Family => "Familjer",
            Self::Source => "Källor",
            Self::Repository => "Arkiv",
            Self::Note => "Anteckningar",
            Self::Media => "Media",
            Self::Header => "Huvud",
            Self::Submitter => "Inlämnare",
            Self::Trailer => "Avslutning",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// En nod i GEDCOM-trädet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNode {
    pub level: u32,
    /// Radens egen identifierare (`0 @I1@ INDI`)
    pub xref: Option<Xref>,
    pub tag: String,
    pub value: Option<String>,
    /// Mål om värdet är en pekare (`1 HUSB @I1@`)
    pub pointer: Option<Xref>,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn new(level: u32, tag: impl Into<String>, value: Option<String>) -> Self {
        let pointer = value.as_deref().and_then(Xref::from_pointer);
        Self {
            level,
            xref: None,
            tag: tag.into(),
            value,
            pointer,
            children: Vec::new(),
        }
    }

    /// Första barnet med given tagg
    pub fn child(&self, tag: &str) -> Option<&RawNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Alla barn med given tagg
    pub fn children_with<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a RawNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Icke-tomt värde för första barnet med given tagg
    pub fn child_value(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(|c| c.text())
    }

    /// Följ en taggsökväg, t.ex. `["FILE", "FORM"]`
    pub fn descendant(&self, path: &[&str]) -> Option<&RawNode> {
        let mut node = self;
        for tag in path {
            node = node.child(tag)?;
        }
        Some(node)
    }

    pub fn descendant_value(&self, path: &[&str]) -> Option<&str> {
        self.descendant(path).and_then(|n| n.text())
    }

    /// Trimmat värde, None om tomt. Pekare räknas inte som text.
    pub fn text(&self) -> Option<&str> {
        if self.pointer.is_some() {
            return None;
        }
        self.value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Värdet oförändrat (används för anteckningar där radbrytningar ska bevaras)
    pub fn raw_text(&self) -> Option<&str> {
        if self.pointer.is_some() {
            return None;
        }
        self.value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Antal noder i delträdet inklusive denna
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RawNode::node_count).sum::<usize>()
    }
}

/// En toppnivåpost från filen
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub kind: RecordKind,
    pub id: Option<Xref>,
    pub node: RawNode,
    /// Radnummer där posten börjar
    pub line: usize,
}

impl ImportRecord {
    pub fn from_node(node: RawNode, line: usize) -> Self {
        Self {
            kind: RecordKind::from_tag(&node.tag),
            id: node.xref.clone(),
            node,
            line,
        }
    }

    /// Beskrivning för logg och varningar
    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) => format!("{} @{}@ (rad {})", self.kind, id, self.line),
            None => format!("{} (rad {})", self.kind, self.line),
        }
    }
}
