//! FAM-poster

use crate::db::StoreRow;
use crate::gedcom::{ImportRecord, RawNode, RecordKind};
use crate::models::{DuplicatePolicy, EntityType, Family, MemberRole};

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher, WriteMode};
use super::error::DispatchError;
use super::resolver::MemberRef;
use super::substructures::{event_facts, write_owned, Owner, FAMILY_EVENTS};

#[derive(Default)]
pub struct FamilyDispatcher {
    processed: ProcessedIds,
}

/// HUSB, WIFE och CHIL i filordning
fn member_refs(node: &RawNode, family_id: &str, merge: bool, line: usize) -> (Vec<MemberRef>, Vec<String>) {
    let mut refs = Vec::new();
    let mut problems = Vec::new();
    let mut child_order = 0;

    for child in &node.children {
        let Some(role) = MemberRole::from_tag(&child.tag) else {
            continue;
        };
        let Some(pointer) = &child.pointer else {
            problems.push(format!("{} utan pekare ignorerades", child.tag));
            continue;
        };

        let sort_order = if role == MemberRole::Child {
            child_order += 1;
            child_order
        } else {
            0
        };

        refs.push(MemberRef {
            family_id: family_id.to_string(),
            role,
            pointer: pointer.clone(),
            pedigree: child.child_value("PEDI").map(|p| p.to_lowercase()),
            sort_order,
            merge,
            line,
        });
    }

    (refs, problems)
}

impl RecordDispatcher for FamilyDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Family
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Family, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();
        let node = &record.node;

        let target = ctx.target_id(EntityType::Family, id.as_str())?;
        let mut family = Family::new(target.as_str(), ctx.tree_id.as_str());

        if let Some(marriage) = node.child("MARR") {
            let facts = event_facts(marriage, ctx, &context);
            family.marriage_date = facts.date;
            family.marriage_year = facts.year;
            family.marriage_place = facts.place;
        }

        let mode = write_row(ctx, StoreRow::Family(family))?;
        if mode == WriteMode::Kept {
            return Ok(mode.outcome(target));
        }

        // Medlemmar skrivs om från filen vid ersättning
        if mode == WriteMode::Replaced {
            ctx.store.clear_family_members(&target, &ctx.tree_id)?;
        }

        let (refs, problems) = member_refs(node, &target, mode == WriteMode::Merged, record.line);
        for problem in problems {
            ctx.warn(&context, problem);
        }
        for member in refs {
            ctx.resolver.register_member(member);
        }

        let owner = Owner {
            entity_type: EntityType::Family,
            entity_id: &target,
            node,
            event_tags: FAMILY_EVENTS,
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

        // Medlemmar löses först i slutet. Befintliga makar behålls vid Merge och Skip.
        let target = ctx.target_id(EntityType::Family, id.as_str())?;
        let merge = matches!(ctx.settings.duplicate_policy, DuplicatePolicy::Merge | DuplicatePolicy::Skip);
        let (refs, _) = member_refs(&record.node, &target, merge, record.line);
        for member in refs {
            ctx.resolver.register_member(member);
        }
        Ok(())
    }

    fn processed(&mut self) -> &mut ProcessedIds {
        &mut self.processed
    }
}
