//! REPO-poster (arkiv)

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RawNode, RecordKind};
use crate::models::{EntityType, Repository};

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher};
use super::error::DispatchError;
use super::substructures::{write_owned, Owner};

#[derive(Default)]
pub struct RepositoryDispatcher {
    processed: ProcessedIds,
}

/// Gatuadress: ADDR med fortsättningsrader, annars ADR1/ADR2
fn street_address(addr: &RawNode) -> Option<String> {
    if let Some(text) = addr.raw_text() {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if !lines.is_empty() {
            return Some(lines.join(", "));
        }
    }

    let parts: Vec<&str> = ["ADR1", "ADR2"]
        .iter()
        .filter_map(|tag| addr.child_value(tag))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn repository_from_node(node: &RawNode, id: &str, tree_id: &str) -> Repository {
    let mut repository = Repository::new(id, tree_id);
    repository.name = node.child_value("NAME").map(str::to_string);

    let addr = node.child("ADDR");
    if let Some(addr) = addr {
        repository.address = street_address(addr);
        repository.city = addr.child_value("CITY").map(str::to_string);
        repository.state = addr.child_value("STAE").map(str::to_string);
        repository.postal_code = addr.child_value("POST").map(str::to_string);
        repository.country = addr.child_value("CTRY").map(str::to_string);
    }

    // 5.5.1 har kontaktuppgifter på postnivå, äldre program under ADDR
    let contact = |tag: &str| {
        node.child_value(tag)
            .or_else(|| addr.and_then(|a| a.child_value(tag)))
            .map(str::to_string)
    };
    repository.phone = contact("PHON");
    repository.email = contact("EMAIL");
    repository.website = contact("WWW");
    repository
}

impl RecordDispatcher for RepositoryDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Repository
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Repository, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();

        let target = ctx.target_id(EntityType::Repository, id.as_str())?;
        let repository = repository_from_node(&record.node, &target, &ctx.tree_id);
        if repository.name.is_none() {
            ctx.warn(&context, "arkivet saknar namn");
        }

        let mode = write_row(ctx, StoreRow::Repository(repository))?;

        let owner = Owner {
            entity_type: EntityType::Repository,
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
