//! Källor, arkiv, anteckningar och mediaobjekt

use serde::{Deserialize, Serialize};

use super::person::fill;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub gedcom_id: String,
    pub tree_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication: Option<String>,
    pub abbreviation: Option<String>,
    pub text: Option<String>,
    pub imported_at: Option<String>,
}

impl Source {
    pub fn new(gedcom_id: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            gedcom_id: gedcom_id.into(),
            tree_id: tree_id.into(),
            ..Default::default()
        }
    }

    pub fn fill_missing(&mut self, other: &Source) {
        fill(&mut self.title, &other.title);
        fill(&mut self.author, &other.author);
        fill(&mut self.publication, &other.publication);
        fill(&mut self.abbreviation, &other.abbreviation);
        fill(&mut self.text, &other.text);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub gedcom_id: String,
    pub tree_id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub imported_at: Option<String>,
}

impl Repository {
    pub fn new(gedcom_id: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            gedcom_id: gedcom_id.into(),
            tree_id: tree_id.into(),
            ..Default::default()
        }
    }

    pub fn fill_missing(&mut self, other: &Repository) {
        fill(&mut self.name, &other.name);
        fill(&mut self.address, &other.address);
        fill(&mut self.city, &other.city);
        fill(&mut self.state, &other.state);
        fill(&mut self.postal_code, &other.postal_code);
        fill(&mut self.country, &other.country);
        fill(&mut self.phone, &other.phone);
        fill(&mut self.email, &other.email);
        fill(&mut self.website, &other.website);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub gedcom_id: String,
    pub tree_id: String,
    pub text: String,
    pub imported_at: Option<String>,
}

impl Note {
    pub fn new(gedcom_id: impl Into<String>, tree_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            gedcom_id: gedcom_id.into(),
            tree_id: tree_id.into(),
            text: text.into(),
            imported_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub gedcom_id: String,
    pub tree_id: String,
    /// Sökväg som den står i filen
    pub file_path: Option<String>,
    /// Sökväg i den hanterade mediakatalogen, om filen kopierades
    pub stored_path: Option<String>,
    pub format: Option<String>,
    pub title: Option<String>,
    pub imported_at: Option<String>,
}

impl Media {
    pub fn new(gedcom_id: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            gedcom_id: gedcom_id.into(),
            tree_id: tree_id.into(),
            ..Default::default()
        }
    }

    pub fn fill_missing(&mut self, other: &Media) {
        fill(&mut self.file_path, &other.file_path);
        fill(&mut self.stored_path, &other.stored_path);
        fill(&mut self.format, &other.format);
        fill(&mut self.title, &other.title);
    }
}
