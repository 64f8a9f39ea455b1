//! Mappning från GEDCOM-id i filen till id i trädet
//!
//! Med Replace/Merge/Skip behåller poster sina id:n (om inte en matchning mot
//! en befintlig person ger ett annat). KeepBoth ger nya id:n åt poster som
//! krockar med befintliga, AppendWithOffset åt alla. Mappningar sparas per
//! jobb så att ett återupptaget jobb pekar ut samma mål.

use std::collections::{HashMap, HashSet};

use crate::db::{ImportStore, StoreResult};
use crate::models::{DuplicatePolicy, EntityType, MatchStrategy, Person};

pub struct IdMapper {
    job_id: String,
    tree_id: String,
    policy: DuplicatePolicy,
    mappings: HashMap<(EntityType, String), String>,
    /// Befintliga id:n i trädet, laddas vid första behov
    existing: HashMap<EntityType, HashSet<String>>,
    /// Id:n som finns i filen (får inte användas för nya id:n)
    incoming: HashMap<EntityType, HashSet<String>>,
    minted: HashMap<EntityType, HashSet<String>>,
    offsets: HashMap<EntityType, i64>,
}

impl IdMapper {
    pub fn new(job_id: impl Into<String>, tree_id: impl Into<String>, policy: DuplicatePolicy) -> Self {
        Self {
            job_id: job_id.into(),
            tree_id: tree_id.into(),
            policy,
            mappings: HashMap::new(),
            existing: HashMap::new(),
            incoming: HashMap::new(),
            minted: HashMap::new(),
            offsets: HashMap::new(),
        }
    }

    /// Ladda sparade mappningar för jobbet
    pub fn load(&mut self, store: &dyn ImportStore) -> StoreResult<usize> {
        let rows = store.load_id_mappings(&self.job_id)?;
        let count = rows.len();
        for (kind, original, mapped) in rows {
            if mapped != original {
                self.minted.entry(kind).or_default().insert(mapped.clone());
            }
            self.mappings.insert((kind, original), mapped);
        }
        Ok(count)
    }

    /// Registrera id:n som finns i filen
    pub fn reserve_incoming<'a>(&mut self, kind: EntityType, ids: impl IntoIterator<Item = &'a str>) {
        let set = self.incoming.entry(kind).or_default();
        set.extend(ids.into_iter().map(str::to_string));
    }

    /// Redan bestämt mål för ett id
    pub fn mapped(&self, kind: EntityType, original: &str) -> Option<&str> {
        self.mappings.get(&(kind, original.to_string())).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mål-id för en post eller pekare
    pub fn target(&mut self, store: &dyn ImportStore, kind: EntityType, original: &str) -> StoreResult<String> {
        self.target_matched(store, kind, original, None)
    }

    /// Mål-id där `matched` är en befintlig post som matchats på innehåll
    pub fn target_matched(
        &mut self,
        store: &dyn ImportStore,
        kind: EntityType,
        original: &str,
        matched: Option<&str>,
    ) -> StoreResult<String> {
        if let Some(mapped) = self.mapped(kind, original) {
            return Ok(mapped.to_string());
        }

        let collides = matched.is_some() || self.existing(store, kind)?.contains(original);

        let target = match self.policy {
            DuplicatePolicy::AppendWithOffset => self.mint(store, kind, original)?,
            DuplicatePolicy::KeepBoth if collides => self.mint(store, kind, original)?,
            _ => matched.unwrap_or(original).to_string(),
        };

        if self.policy.mints_ids() || target != original {
            store.save_id_mapping(&self.job_id, kind, original, &target)?;
        }
        self.mappings.insert((kind, original.to_string()), target.clone());
        Ok(target)
    }

    fn existing(&mut self, store: &dyn ImportStore, kind: EntityType) -> StoreResult<&HashSet<String>> {
        if !self.existing.contains_key(&kind) {
            let ids: HashSet<String> = store.ids(kind, &self.tree_id)?.into_iter().collect();
            self.existing.insert(kind, ids);
        }
        Ok(self.existing.entry(kind).or_default())
    }

    fn is_taken(&self, kind: EntityType, id: &str) -> bool {
        [&self.existing, &self.incoming, &self.minted]
            .iter()
            .any(|sets| sets.get(&kind).map(|s| s.contains(id)).unwrap_or(false))
    }

    /// Största numeriska suffix bland befintliga och inkommande id:n
    fn offset(&mut self, store: &dyn ImportStore, kind: EntityType) -> StoreResult<i64> {
        if let Some(offset) = self.offsets.get(&kind) {
            return Ok(*offset);
        }
        self.existing(store, kind)?;
        let offset = [&self.existing, &self.incoming, &self.minted]
            .iter()
            .filter_map(|sets| sets.get(&kind))
            .flat_map(|set| set.iter())
            .filter_map(|id| split_numeric(id).map(|(_, n)| n))
            .max()
            .unwrap_or(0);
        self.offsets.insert(kind, offset);
        Ok(offset)
    }

    fn mint(&mut self, store: &dyn ImportStore, kind: EntityType, original: &str) -> StoreResult<String> {
        let offset = self.offset(store, kind)?;

        let mut n = 1;
        let mut candidate = shifted(original, offset, n);
        while self.is_taken(kind, &candidate) {
            n += 1;
            candidate = shifted(original, offset, n);
        }

        self.minted.entry(kind).or_default().insert(candidate.clone());
        Ok(candidate)
    }
}

/// N:te kandidaten för ett nytt id. Suffix som skulle flöda över får "-N".
fn shifted(original: &str, offset: i64, n: i64) -> String {
    let number = split_numeric(original).and_then(|(prefix, number)| {
        number
            .checked_add(offset)
            .and_then(|v| v.checked_add(n - 1))
            .map(|v| (prefix, v))
    });
    match number {
        Some((prefix, v)) => format!("{}{}", prefix, v),
        None => format!("{}-{}", original, n),
    }
}

/// "I123" → ("I", 123)
fn split_numeric(id: &str) -> Option<(&str, i64)> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let number = id[digits_start..].parse().ok()?;
    Some((&id[..digits_start], number))
}

fn normalize_name(s: Option<&str>) -> String {
    s.unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hittar befintliga personer som motsvarar en importerad person
pub struct PersonMatcher {
    strategy: MatchStrategy,
    candidates: Option<Vec<Person>>,
    claimed: HashSet<String>,
}

impl PersonMatcher {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            candidates: None,
            claimed: HashSet::new(),
        }
    }

    /// Id för en befintlig person med annat id som matchar, om någon
    pub fn find_match(&mut self, store: &dyn ImportStore, person: &Person) -> StoreResult<Option<String>> {
        if self.strategy == MatchStrategy::Id {
            return Ok(None);
        }

        // Ett befintligt id är alltid samma person
        if store.exists(EntityType::Person, &person.person_id, &person.tree_id)? {
            return Ok(None);
        }

        if self.candidates.is_none() {
            self.candidates = Some(store.persons(&person.tree_id)?);
        }
        let candidates = self.candidates.as_deref().unwrap_or_default();

        let given = normalize_name(person.given_name.as_deref());
        let surname = normalize_name(person.surname.as_deref());
        if given.is_empty() && surname.is_empty() {
            return Ok(None);
        }

        let has_birth = |p: &Person| p.birth_date.is_some() || p.birth_year.is_some();
        if !has_birth(person) {
            return Ok(None);
        }

        let found = candidates.iter().find(|c| {
            if c.person_id == person.person_id || self.claimed.contains(&c.person_id) {
                return false;
            }
            if normalize_name(c.given_name.as_deref()) != given
                || normalize_name(c.surname.as_deref()) != surname
            {
                return false;
            }
            match self.strategy {
                MatchStrategy::Standard => {
                    let date = match (&c.birth_date, &person.birth_date) {
                        (Some(a), Some(b)) => a == b,
                        (None, None) => c.birth_year.is_some() && c.birth_year == person.birth_year,
                        _ => false,
                    };
                    date && c.birth_place == person.birth_place
                }
                MatchStrategy::Fuzzy => match (c.birth_year, person.birth_year) {
                    (Some(a), Some(b)) => (a - b).abs() <= 2,
                    _ => false,
                },
                MatchStrategy::Id => false,
            }
        });

        let found = found.map(|c| c.person_id.clone());
        if let Some(id) = &found {
            self.claimed.insert(id.clone());
        }
        Ok(found)
    }
}
