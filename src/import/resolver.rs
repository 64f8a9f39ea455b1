//! Upplösning av korsreferenser efter att alla poster lästs
//!
//! Familjer och källor pekar på poster som kan komma senare i filen.
//! Pekarna samlas under körningen och skrivs när alla id:n är kända.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::db::StoreRow;
use crate::gedcom::{RecordKind, Xref};
use crate::models::{EntityType, FamilyMember, MemberRole, RepositoryLink};

use super::context::ImportContext;
use super::error::DispatchError;

/// HUSB, WIFE eller CHIL i en familj
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    /// Familjens id i trädet
    pub family_id: String,
    pub role: MemberRole,
    pub pointer: Xref,
    pub pedigree: Option<String>,
    pub sort_order: i32,
    /// Befintliga makar behålls
    pub merge: bool,
    pub line: usize,
}

/// REPO under en källa
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryRef {
    /// Källans id i trädet
    pub source_id: String,
    pub pointer: Xref,
    pub call_number: Option<String>,
    pub line: usize,
}

#[derive(Debug, Default)]
struct Spouses {
    husband: Option<String>,
    wife: Option<String>,
    merge: bool,
}

#[derive(Debug, Default)]
pub struct ReferenceResolver {
    members: Vec<MemberRef>,
    repositories: Vec<RepositoryRef>,
    /// Personer som medvetet inte importerades
    excluded: HashSet<Xref>,
}

/// Summering av en upplösning
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveSummary {
    pub members: usize,
    pub repositories: usize,
    pub orphans: usize,
    pub omitted: usize,
}

impl ReferenceResolver {
    pub fn register_member(&mut self, member: MemberRef) {
        self.members.push(member);
    }

    pub fn register_repository(&mut self, repository: RepositoryRef) {
        self.repositories.push(repository);
    }

    pub fn exclude_person(&mut self, id: Xref) {
        self.excluded.insert(id);
    }

    pub fn pending(&self) -> usize {
        self.members.len() + self.repositories.len()
    }

    pub fn resolve(self, ctx: &mut ImportContext<'_>) -> Result<(), DispatchError> {
        let mut summary = ResolveSummary::default();
        let mut spouses: BTreeMap<String, Spouses> = BTreeMap::new();

        for member in self.members {
            let context = format!("Familj {} (rad {})", member.family_id, member.line);

            if self.excluded.contains(&member.pointer) {
                summary.omitted += 1;
                continue;
            }
            if !ctx.report.contains(&RecordKind::Individual, &member.pointer) {
                summary.orphans += 1;
                ctx.warn(
                    &context,
                    format!(
                        "Föräldralös referens: {} @{}@ finns inte i filen",
                        member.role.label().to_lowercase(),
                        member.pointer
                    ),
                );
                continue;
            }

            let person_id = match ctx.target_id(EntityType::Person, member.pointer.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    ctx.absorb(&RecordKind::Family, &context, e)?;
                    continue;
                }
            };

            let row = FamilyMember {
                family_id: member.family_id.clone(),
                tree_id: ctx.tree_id.clone(),
                person_id: person_id.clone(),
                role: member.role,
                pedigree: member.pedigree.clone(),
                sort_order: member.sort_order,
            };
            if let Err(e) = ctx.store.add_family_member(&row) {
                ctx.absorb(&RecordKind::Family, &context, e.into())?;
                continue;
            }
            summary.members += 1;

            let entry = spouses.entry(member.family_id.clone()).or_default();
            entry.merge = member.merge;
            match member.role {
                MemberRole::Husband => {
                    entry.husband.get_or_insert(person_id);
                }
                MemberRole::Wife => {
                    entry.wife.get_or_insert(person_id);
                }
                MemberRole::Child => {}
            }
        }

        for (family_id, found) in spouses {
            if let Err(e) = write_spouses(ctx, &family_id, found) {
                ctx.absorb(&RecordKind::Family, &format!("Familj {}", family_id), e)?;
            }
        }

        for repository in self.repositories {
            let context = format!("Källa {} (rad {})", repository.source_id, repository.line);

            if !ctx.report.contains(&RecordKind::Repository, &repository.pointer) {
                summary.orphans += 1;
                ctx.warn(
                    &context,
                    format!("Föräldralös referens: arkiv @{}@ finns inte i filen", repository.pointer),
                );
                continue;
            }

            let linked = ctx
                .target_id(EntityType::Repository, repository.pointer.as_str())
                .and_then(|repository_id| {
                    Ok(ctx.store.link_repository(&RepositoryLink {
                        source_id: repository.source_id.clone(),
                        tree_id: ctx.tree_id.clone(),
                        repository_id,
                        call_number: repository.call_number.clone(),
                    })?)
                });
            match linked {
                Ok(()) => summary.repositories += 1,
                Err(e) => ctx.absorb(&RecordKind::Source, &context, e)?,
            }
        }

        info!(
            "Referenser upplösta: {} familjemedlemmar, {} arkivlänkar, {} föräldralösa",
            summary.members, summary.repositories, summary.orphans
        );
        if summary.omitted > 0 {
            debug!("{} referenser till ej importerade personer utelämnades", summary.omitted);
        }
        Ok(())
    }
}

fn write_spouses(ctx: &mut ImportContext<'_>, family_id: &str, found: Spouses) -> Result<(), DispatchError> {
    let store = ctx.store;
    let (mut husband, mut wife) = (found.husband, found.wife);

    if found.merge {
        if let Some(StoreRow::Family(existing)) = store.find(EntityType::Family, family_id, &ctx.tree_id)? {
            husband = existing.husband_id.or(husband);
            wife = existing.wife_id.or(wife);
        }
    }

    store.set_spouses(family_id, &ctx.tree_id, husband.as_deref(), wife.as_deref())?;
    Ok(())
}
