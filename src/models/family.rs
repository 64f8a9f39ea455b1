use serde::{Deserialize, Serialize};
use std::fmt;

use super::person::fill;

/// En importerad familj, unik på (family_id, tree_id)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub family_id: String,
    pub tree_id: String,
    pub husband_id: Option<String>,
    pub wife_id: Option<String>,
    pub marriage_date: Option<String>,
    pub marriage_year: Option<i32>,
    pub marriage_place: Option<String>,
    pub imported_at: Option<String>,
}

impl Family {
    pub fn new(family_id: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            family_id: family_id.into(),
            tree_id: tree_id.into(),
            ..Default::default()
        }
    }

    pub fn fill_missing(&mut self, other: &Family) {
        fill(&mut self.husband_id, &other.husband_id);
        fill(&mut self.wife_id, &other.wife_id);
        fill(&mut self.marriage_date, &other.marriage_date);
        fill(&mut self.marriage_year, &other.marriage_year);
        fill(&mut self.marriage_place, &other.marriage_place);
    }
}

/// Roll i en familj
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Husband,
    Wife,
    Child,
}

impl MemberRole {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "HUSB" => Some(Self::Husband),
            "WIFE" => Some(Self::Wife),
            "CHIL" => Some(Self::Child),
            _ => None,
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "husband" => Some(Self::Husband),
            "wife" => Some(Self::Wife),
            "child" => Some(Self::Child),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Husband => "husband",
            Self::Wife => "wife",
            Self::Child => "child",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Husband => "Make",
            Self::Wife => "Maka",
            Self::Child => "Barn",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Medlemskap i en familj
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub family_id: String,
    pub tree_id: String,
    pub person_id: String,
    pub role: MemberRole,
    /// Härstamning för barn (birth, adopted, foster, ...)
    pub pedigree: Option<String>,
    pub sort_order: i32,
}
