//! OBJE-poster

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RecordKind};
use crate::models::EntityType;

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher};
use super::error::DispatchError;
use super::substructures::{media_from_node, store_media_file, write_owned, Owner};

#[derive(Default)]
pub struct MediaDispatcher {
    processed: ProcessedIds,
}

impl RecordDispatcher for MediaDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Media
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Media, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();

        let target = ctx.target_id(EntityType::Media, id.as_str())?;
        let mut media = media_from_node(&record.node, &target, &ctx.tree_id);
        if media.file_path.is_none() {
            ctx.warn(&context, "saknar FILE");
        }
        store_media_file(ctx, &mut media, &context);

        let mode = write_row(ctx, StoreRow::Media(media))?;

        let owner = Owner {
            entity_type: EntityType::Media,
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
