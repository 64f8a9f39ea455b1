//! SOUR-poster

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RawNode, RecordKind};
use crate::models::{EntityType, Source};

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher};
use super::error::DispatchError;
use super::resolver::RepositoryRef;
use super::substructures::{write_owned, Owner};

#[derive(Default)]
pub struct SourceDispatcher {
    processed: ProcessedIds,
}

fn source_from_node(node: &RawNode, id: &str, tree_id: &str) -> Source {
    let text_of = |tag: &str| node.child(tag).and_then(|c| c.raw_text()).map(|t| t.trim().to_string());

    let mut source = Source::new(id, tree_id);
    source.title = text_of("TITL");
    source.author = text_of("AUTH");
    source.publication = text_of("PUBL");
    source.abbreviation = node.child_value("ABBR").map(str::to_string);
    source.text = text_of("TEXT");
    source
}

fn repository_refs(node: &RawNode, source_id: &str, line: usize) -> Vec<RepositoryRef> {
    node.children_with("REPO")
        .filter_map(|repo| {
            repo.pointer.as_ref().map(|pointer| RepositoryRef {
                source_id: source_id.to_string(),
                pointer: pointer.clone(),
                call_number: repo.child_value("CALN").map(str::to_string),
                line,
            })
        })
        .collect()
}

impl RecordDispatcher for SourceDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Source
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Source, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();
        let node = &record.node;

        let target = ctx.target_id(EntityType::Source, id.as_str())?;
        let source = source_from_node(node, &target, &ctx.tree_id);
        if source.title.is_none() && source.abbreviation.is_none() {
            ctx.warn(&context, "källan saknar titel");
        }

        let mode = write_row(ctx, StoreRow::Source(source))?;
        if !mode.writes_owned() {
            return Ok(mode.outcome(target));
        }

        for repo in node.children_with("REPO").filter(|r| r.pointer.is_none()) {
            if let Some(name) = repo.text() {
                ctx.warn(&context, format!("REPO utan pekare ignorerades: {}", name));
            }
        }
        for repository in repository_refs(node, &target, record.line) {
            ctx.resolver.register_repository(repository);
        }

        let owner = Owner {
            entity_type: EntityType::Source,
            entity_id: &target,
            node,
            event_tags: &[],
            details: true,
            context: &context,
        };
        write_owned(ctx, &owner, mode)?;

        Ok(mode.outcome(target))
    }

    fn replay(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        let Some(id) = &record.id else {
            return Ok(());
        };
        if !self.processed.insert(id) {
            return Ok(());
        }

        let target = ctx.target_id(EntityType::Source, id.as_str())?;
        for repository in repository_refs(&record.node, &target, record.line) {
            ctx.resolver.register_repository(repository);
        }
        Ok(())
    }

    fn processed(&mut self) -> &mut ProcessedIds {
        &mut self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gedcom::RecordAssembler;

    #[test]
    fn test_source_fields() {
        let text = "0 @S1@ SOUR\n1 TITL Husförhörslängd\n2 CONC  Uppsala 1850\n1 AUTH Svenska kyrkan\n1 ABBR HFL\n1 REPO @R1@\n2 CALN AI:12\n1 REPO @R2@\n";
        let record = RecordAssembler::new(text).next().unwrap();

        let source = source_from_node(&record.node, "S1", "t1");
        assert_eq!(source.title.as_deref(), Some("Husförhörslängd Uppsala 1850"));
        assert_eq!(source.author.as_deref(), Some("Svenska kyrkan"));
        assert_eq!(source.abbreviation.as_deref(), Some("HFL"));
        assert!(source.publication.is_none());

        let refs = repository_refs(&record.node, "S1", record.line);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].call_number.as_deref(), Some("AI:12"));
        assert!(refs[1].call_number.is_none());
    }
}
