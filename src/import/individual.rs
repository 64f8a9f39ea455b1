//! INDI-poster

use tracing::debug;

use crate::db::StoreRow;
use crate::gedcom::name::name_from_record;
use crate::gedcom::{convert_gedcom_date, ImportRecord, RawNode, RecordKind};
use crate::models::{EntityType, LivingPrivacy, Person};

use super::context::ImportContext;
use super::dispatch::{admit, write_row, Admission, DispatchOutcome, ProcessedIds, RecordDispatcher, SkipReason};
use super::error::DispatchError;
use super::substructures::{event_facts, write_owned, Owner, INDIVIDUAL_EVENTS};

/// Händelser som betyder att personen är död
const DEATH_EVENTS: [&str; 3] = ["DEAT", "BURI", "CREM"];

/// Händelser som ger födelseår, i prioritetsordning
const BIRTH_EVENTS: [&str; 3] = ["BIRT", "CHR", "BAPM"];

/// Födelseår från första födelsehändelse med tolkbart datum
fn birth_year(node: &RawNode) -> Option<i32> {
    BIRTH_EVENTS.iter().find_map(|tag| {
        node.children_with(tag)
            .filter_map(|e| e.child_value("DATE"))
            .find_map(|raw| convert_gedcom_date(raw).year)
    })
}

/// Är personen vid liv?
///
/// Död om någon dödshändelse finns, eller om födelseåret ligger minst
/// `threshold` år bakåt. Utan födelseår räknas personen som levande.
pub fn is_living(node: &RawNode, current_year: i32, threshold: i32) -> bool {
    if DEATH_EVENTS.iter().any(|tag| node.child(tag).is_some()) {
        return false;
    }
    match birth_year(node) {
        Some(year) => current_year - year < threshold,
        None => true,
    }
}

#[derive(Default)]
pub struct IndividualDispatcher {
    processed: ProcessedIds,
}

impl IndividualDispatcher {
    fn extract(&self, node: &RawNode, id: &str, ctx: &mut ImportContext<'_>, context: &str) -> Person {
        let mut person = Person::new(id, ctx.tree_id.as_str());

        let name = name_from_record(node);
        if name.is_empty() {
            ctx.warn(context, "saknar namn");
        }
        person.given_name = Some(name.given).filter(|s| !s.is_empty());
        person.surname = Some(name.surname).filter(|s| !s.is_empty());

        person.sex = node.child_value("SEX").map(|s| s.to_uppercase());
        if let Some(sex) = person.sex.as_deref() {
            if !matches!(sex, "M" | "F" | "U" | "X") {
                ctx.warn(context, format!("okänt kön: {}", sex));
            }
        }

        if let Some(birth) = node.child("BIRT") {
            let facts = event_facts(birth, ctx, context);
            person.birth_date = facts.date;
            person.birth_year = facts.year;
            person.birth_place = facts.place;
        }
        if person.birth_year.is_none() {
            person.birth_year = birth_year(node);
        }

        if let Some(death) = node.child("DEAT") {
            let facts = event_facts(death, ctx, context);
            person.death_date = facts.date;
            person.death_year = facts.year;
            person.death_place = facts.place;
        }

        person.living = is_living(node, ctx.current_year, ctx.settings.living_threshold_years);
        person
    }
}

impl RecordDispatcher for IndividualDispatcher {
    fn kind(&self) -> RecordKind {
        RecordKind::Individual
    }

    fn process(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        let id = match admit(&RecordKind::Individual, record, &mut self.processed)? {
            Admission::Accept(id) => id,
            Admission::Reject(reason) => return Ok(DispatchOutcome::Skipped(reason)),
        };
        let context = record.describe();

        let mut person = self.extract(&record.node, id.as_str(), ctx, &context);

        let mut details = true;
        if person.living {
            match ctx.settings.living_privacy {
                LivingPrivacy::Keep => {}
                LivingPrivacy::RedactDetails => {
                    person.redact();
                    details = false;
                }
                LivingPrivacy::Skip => {
                    ctx.resolver.exclude_person(id.clone());
                    return Ok(DispatchOutcome::Skipped(SkipReason::Private(id)));
                }
            }
        }

        let store = ctx.store;
        let matched = ctx.matcher.find_match(store, &person)?;
        if let Some(existing) = &matched {
            debug!("{} matchades mot befintlig person {}", context, existing);
        }
        let target = ctx.ids.target_matched(store, EntityType::Person, id.as_str(), matched.as_deref())?;
        person.person_id = target.clone();

        let mode = write_row(ctx, StoreRow::Person(person))?;

        let owner = Owner {
            entity_type: EntityType::Person,
            entity_id: &target,
            node: &record.node,
            event_tags: INDIVIDUAL_EVENTS,
            details,
            context: &context,
        };
        write_owned(ctx, &owner, mode)?;

        Ok(mode.outcome(target))
    }

    fn replay(&mut self, record: &ImportRecord, ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        let Some(id) = &record.id else {
            return Ok(());
        };
        self.processed.insert(id);

        let living = is_living(&record.node, ctx.current_year, ctx.settings.living_threshold_years);
        if living && ctx.settings.living_privacy == LivingPrivacy::Skip {
            ctx.resolver.exclude_person(id.clone());
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

    fn first_node(text: &str) -> RawNode {
        RecordAssembler::new(text).next().unwrap().node
    }

    #[test]
    fn test_living_inference() {
        let dead = first_node("0 @I1@ INDI\n1 BIRT\n2 DATE 1990\n1 DEAT Y\n");
        assert!(!is_living(&dead, 2024, 100));

        let buried = first_node("0 @I1@ INDI\n1 BURI\n2 PLAC Uppsala\n");
        assert!(!is_living(&buried, 2024, 100));

        let old = first_node("0 @I1@ INDI\n1 BIRT\n2 DATE 12 MAR 1880\n");
        assert!(!is_living(&old, 2024, 100));

        let young = first_node("0 @I1@ INDI\n1 BIRT\n2 DATE ABT 1950\n");
        assert!(is_living(&young, 2024, 100));

        let christened = first_node("0 @I1@ INDI\n1 CHR\n2 DATE 1901\n");
        assert!(!is_living(&christened, 2024, 100));

        let unknown = first_node("0 @I1@ INDI\n1 NAME Okänd //\n");
        assert!(is_living(&unknown, 2024, 100));
    }

    #[test]
    fn test_birth_year_skips_unparseable_dates() {
        let node = first_node("0 @I1@ INDI\n1 BIRT\n2 DATE okänt\n1 BAPM\n2 DATE 3 JUN 1855\n");
        assert_eq!(birth_year(&node), Some(1855));
    }
}
