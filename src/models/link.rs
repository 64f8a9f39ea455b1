//! Källhänvisningar och kopplingar mellan entiteter

use serde::{Deserialize, Serialize};

use super::event::EntityType;

/// Källhänvisning (SOUR under en post eller händelse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub citation_id: Option<i64>,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub tree_id: String,
    pub source_id: String,
    pub page: Option<String>,
    /// QUAY 0-3
    pub quality: Option<i32>,
    pub text: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLink {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub tree_id: String,
    pub note_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLink {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub tree_id: String,
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLink {
    pub source_id: String,
    pub tree_id: String,
    pub repository_id: String,
    pub call_number: Option<String>,
}
