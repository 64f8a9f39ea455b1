use serde::{Deserialize, Serialize};

/// En importerad person, unik på (person_id, tree_id)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: String,
    pub tree_id: String,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    /// M, F, U eller X
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_year: Option<i32>,
    pub death_place: Option<String>,
    pub living: bool,
    pub private: bool,
    pub imported_at: Option<String>,
}

impl Person {
    pub fn new(person_id: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            tree_id: tree_id.into(),
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        match (&self.given_name, &self.surname) {
            (Some(f), Some(s)) => format!("{} {}", f, s),
            (Some(f), None) => f.clone(),
            (None, Some(s)) => s.clone(),
            (None, None) => "Okänd".to_string(),
        }
    }

    pub fn years_display(&self) -> String {
        match (self.birth_year, self.death_year) {
            (Some(b), Some(d)) => format!("{}-{}", b, d),
            (Some(b), None) => format!("{}-", b),
            (None, Some(d)) => format!("-{}", d),
            (None, None) => String::new(),
        }
    }

    /// Ta bort datum och orter (för levande personer)
    pub fn redact(&mut self) {
        self.birth_date = None;
        self.birth_year = None;
        self.birth_place = None;
        self.death_date = None;
        self.death_year = None;
        self.death_place = None;
        self.private = true;
    }

    /// Fyll tomma fält från `other`. Levande-flaggan följer den nyare posten
    /// bara om den befintliga saknar dödsuppgifter.
    pub fn fill_missing(&mut self, other: &Person) {
        fill(&mut self.given_name, &other.given_name);
        fill(&mut self.surname, &other.surname);
        fill(&mut self.sex, &other.sex);
        fill(&mut self.birth_date, &other.birth_date);
        fill(&mut self.birth_year, &other.birth_year);
        fill(&mut self.birth_place, &other.birth_place);
        fill(&mut self.death_date, &other.death_date);
        fill(&mut self.death_year, &other.death_year);
        fill(&mut self.death_place, &other.death_place);
        if self.death_date.is_some() || self.death_year.is_some() {
            self.living = false;
        } else {
            self.living = self.living && other.living;
        }
        self.private = self.private || other.private;
    }
}

pub(crate) fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}
