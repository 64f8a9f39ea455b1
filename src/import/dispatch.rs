//! Gemensam ram för postladdarna

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RecordKind, Xref};
use crate::models::DuplicatePolicy;

use super::context::ImportContext;
use super::error::DispatchError;

/// Vad som hände med en post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Imported(String),
    Updated(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    /// Samma id förekom tidigare i filen
    DuplicateInRun(Xref),
    /// Posten finns redan och policyn är Skip
    ExistingKept(String),
    /// Levande person som inte importeras
    Private(Xref),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => write!(f, "saknar identifierare, hoppades över"),
            Self::DuplicateInRun(id) => write!(f, "@{}@ förekommer redan i filen, hoppades över", id),
            Self::ExistingKept(id) => write!(f, "{} finns redan och lämnades orörd", id),
            Self::Private(id) => write!(f, "@{}@ är en levande person och importerades inte", id),
        }
    }
}

/// Laddare för en posttyp
pub trait RecordDispatcher {
    fn kind(&self) -> RecordKind;

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError>;

    /// Posten bearbetades i en tidigare körning av samma jobb. Registrera
    /// det som upplösningen behöver utan att skriva posten igen.
    fn replay(&mut self, record: &ImportRecord, _ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        self.processed().insert_record(record);
        Ok(())
    }

    /// Körs en gång efter att alla poster bearbetats
    fn finalize(&mut self, _ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        Ok(())
    }

    fn processed(&mut self) -> &mut ProcessedIds;
}

/// Id:n som redan bearbetats i körningen, per posttyp
#[derive(Debug, Default)]
pub struct ProcessedIds {
    ids: HashSet<Xref>,
}

impl ProcessedIds {
    /// Falskt om id:t redan fanns
    pub fn insert(&mut self, id: &Xref) -> bool {
        self.ids.insert(id.clone())
    }

    fn insert_record(&mut self, record: &ImportRecord) {
        if let Some(id) = &record.id {
            self.ids.insert(id.clone());
        }
    }

    pub fn contains(&self, id: &Xref) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Om posten ska bearbetas
pub enum Admission {
    Accept(Xref),
    Reject(SkipReason),
}

/// Kontrollera typ, id och dubbletter innan posten läses
pub fn admit(
    expected: &RecordKind,
    record: &ImportRecord,
    processed: &mut ProcessedIds,
) -> Result<Admission, DispatchError> {
    if &record.kind != expected {
        return Err(DispatchError::WrongRecordType {
            expected: expected.clone(),
            found: record.kind.clone(),
        });
    }

    let Some(id) = &record.id else {
        return Ok(Admission::Reject(SkipReason::MissingId));
    };

    if !processed.insert(id) {
        return Ok(Admission::Reject(SkipReason::DuplicateInRun(id.clone())));
    }

    Ok(Admission::Accept(id.clone()))
}

/// Hur huvudraden skrevs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Inserted,
    /// Befintlig rad skrevs över, ägda rader är borttagna
    Replaced,
    /// Tomma fält fylldes i, ägda rader finns kvar
    Merged,
    Kept,
}

impl WriteMode {
    pub fn outcome(self, id: String) -> DispatchOutcome {
        match self {
            Self::Inserted => DispatchOutcome::Imported(id),
            Self::Replaced | Self::Merged => DispatchOutcome::Updated(id),
            Self::Kept => DispatchOutcome::Skipped(SkipReason::ExistingKept(id)),
        }
    }

    /// Ska ägda rader skrivas?
    pub fn writes_owned(self) -> bool {
        self != Self::Kept
    }
}

/// Skriv huvudraden enligt dubblettpolicyn
pub fn write_row(ctx: &mut ImportContext<'_>, row: StoreRow) -> Result<WriteMode, DispatchError> {
    let store = ctx.store;
    let Some(mut existing) = store.find(row.entity_type(), row.id(), row.tree_id())? else {
        store.upsert(&row)?;
        return Ok(WriteMode::Inserted);
    };

    match ctx.settings.duplicate_policy {
        DuplicatePolicy::Merge => {
            existing.fill_missing(&row);
            store.upsert(&existing)?;
            Ok(WriteMode::Merged)
        }
        DuplicatePolicy::Skip => Ok(WriteMode::Kept),
        DuplicatePolicy::Replace | DuplicatePolicy::KeepBoth | DuplicatePolicy::AppendWithOffset => {
            store.upsert(&row)?;
            store.clear_owned(row.entity_type(), row.id(), row.tree_id())?;
            Ok(WriteMode::Replaced)
        }
    }
}

/// Postladdarna, en per posttyp
pub struct DispatcherRegistry {
    dispatchers: BTreeMap<RecordKind, Box<dyn RecordDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self {
            dispatchers: BTreeMap::new(),
        }
    }

    /// Alla sex laddare
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::individual::IndividualDispatcher::default()));
        registry.register(Box::new(super::family::FamilyDispatcher::default()));
        registry.register(Box::new(super::source::SourceDispatcher::default()));
        registry.register(Box::new(super::repository::RepositoryDispatcher::default()));
        registry.register(Box::new(super::note::NoteDispatcher::default()));
        registry.register(Box::new(super::media::MediaDispatcher::default()));
        registry
    }

    pub fn register(&mut self, dispatcher: Box<dyn RecordDispatcher>) {
        self.dispatchers.insert(dispatcher.kind(), dispatcher);
    }

    pub fn get_mut(&mut self, kind: &RecordKind) -> Option<&mut (dyn RecordDispatcher + 'static)> {
        self.dispatchers.get_mut(kind).map(|d| d.as_mut())
    }

    pub fn finalize_all(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        for dispatcher in self.dispatchers.values_mut() {
            dispatcher.finalize(ctx)?;
        }
        Ok(())
    }
}

impl Default for DispatcherRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
