//! NOTE-poster

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RecordKind};
use crate::models::{EntityType, Note};

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher};
use super::error::DispatchError;
use super::substructures::{write_owned, Owner};

#[derive(Default)]
pub struct NoteDispatcher {
    processed: ProcessedIds,
}

impl RecordDispatcher for NoteDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Note
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Note, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();

        // Radbrytningar från CONT behålls
        let text = record.node.raw_text().unwrap_or_default().to_string();
        if text.trim().is_empty() {
            ctx.warn(&context, "tom anteckning");
        }

        let target = ctx.target_id(EntityType::Note, id.as_str())?;
        let note = Note::new(target.as_str(), ctx.tree_id.as_str(), text);
        let mode = write_row(ctx, StoreRow::Note(note))?;

        let owner = Owner {
            entity_type: EntityType::Note,
            entity_id: &target,
            node: &record.node,
            event_tags: &[],
            details: true,
            context: &context,
        };
        write_owned(ctx, &owner, mode)?;

        Ok(mode.outcome(target))
    }

    fn processed(&mut self) -> &mut ProcessedIds {
        &mut self.processed
    }
}
