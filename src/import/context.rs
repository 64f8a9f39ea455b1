use chrono::Datelike;

use crate::db::ImportStore;
use crate::gedcom::{RecordKind, ValidationReport};
use crate::models::{EntityType, ImportSettings};
use crate::services::MediaStorage;

use super::error::DispatchError;
use super::id_map::{IdMapper, PersonMatcher};
use super::resolver::ReferenceResolver;
use super::result::ImportResult;

/// Delat tillstånd för postladdarna under en körning
pub struct ImportContext<'a> {
    pub tree_id: String,
    pub settings: &'a ImportSettings,
    pub store: &'a dyn ImportStore,
    pub media: Option<&'a dyn MediaStorage>,
    /// Resultatet av valideringspasset, används för att kontrollera pekare
    pub report: &'a ValidationReport,
    pub ids: IdMapper,
    pub matcher: PersonMatcher,
    pub resolver: ReferenceResolver,
    pub result: ImportResult,
    pub current_year: i32,
}

impl<'a> ImportContext<'a> {
    pub fn new(
        job_id: &str,
        tree_id: &str,
        settings: &'a ImportSettings,
        store: &'a dyn ImportStore,
        report: &'a ValidationReport,
    ) -> Self {
        let mut ids = IdMapper::new(job_id, tree_id, settings.duplicate_policy);
        for (kind, xrefs) in &report.xrefs {
            if let Some(entity_type) = entity_type_of(kind) {
                ids.reserve_incoming(entity_type, xrefs.iter().map(|x| x.as_str()));
            }
        }

        Self {
            tree_id: tree_id.to_string(),
            settings,
            store,
            media: None,
            report,
            ids,
            matcher: PersonMatcher::new(settings.match_strategy),
            resolver: ReferenceResolver::default(),
            result: ImportResult::new(),
            current_year: chrono::Local::now().year(),
        }
    }

    pub fn with_media(mut self, media: &'a dyn MediaStorage) -> Self {
        self.media = Some(media);
        self
    }

    /// Mål-id för en pekare eller post
    pub fn target_id(&mut self, entity_type: EntityType, original: &str) -> Result<String, DispatchError> {
        Ok(self.ids.target(self.store, entity_type, original)?)
    }

    /// Varning med postens beskrivning som prefix
    pub fn warn(&mut self, context: &str, message: impl AsRef<str>) {
        self.result.warn(format!("{}: {}", context, message.as_ref()));
    }

    /// Ta hand om ett fel för en enskild post
    ///
    /// Utan transaktion räknas felet och körningen fortsätter. I
    /// transaktionsläge, och för fel där databasen inte går att nå,
    /// returneras felet så att körningen avbryts.
    pub fn absorb(&mut self, kind: &RecordKind, context: &str, error: DispatchError) -> Result<(), DispatchError> {
        if self.settings.use_transactions || error.is_fatal() {
            return Err(error);
        }
        tracing::warn!("{}: {}", context, error);
        self.result.record_error(kind, format!("{}: {}", context, error));
        Ok(())
    }

    /// Kör referensupplösningen en gång
    pub fn resolve_references(&mut self) -> Result<(), DispatchError> {
        let resolver = std::mem::take(&mut self.resolver);
        resolver.resolve(self)
    }
}

/// Tabelltyp för en posttyp
pub fn entity_type_of(kind: &RecordKind) -> Option<EntityType> {
    match kind {
        RecordKind::Individual => Some(EntityType::Person),
        RecordKind::Family => Some(EntityType::Family),
        RecordKind::Source => Some(EntityType::Source),
        RecordKind::Repository => Some(EntityType::Repository),
        RecordKind::Note => Some(EntityType::Note),
        RecordKind::Media => Some(EntityType::Media),
        _ => None,
    }
}
