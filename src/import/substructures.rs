//! Händelser, anteckningar, källhänvisningar och medialänkar under en post

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::db::StoreRow;
use crate::gedcom::{convert_gedcom_date, RawNode};
use crate::models::{Citation, EntityType, Event, Media, MediaLink, Note, NoteLink, Source};
use crate::utils::file_ops::{file_name_of, get_file_extension};

use super::context::ImportContext;
use super::dispatch::WriteMode;
use super::error::DispatchError;

pub const INDIVIDUAL_EVENTS: &[&str] = &[
    "BIRT", "CHR", "BAPM", "DEAT", "BURI", "CREM", "ADOP", "BARM", "BASM", "BLES", "CHRA", "CONF",
    "FCOM", "ORDN", "NATU", "EMIG", "IMMI", "CENS", "PROB", "WILL", "GRAD", "RETI", "EVEN", "RESI",
    "OCCU", "EDUC", "RELI", "TITL", "NATI",
];

pub const FAMILY_EVENTS: &[&str] = &[
    "MARR", "MARB", "MARC", "MARL", "MARS", "ENGA", "DIV", "DIVF", "ANUL", "CENS", "EVEN",
];

/// Attribut vars värde är själva uppgiften
const ATTRIBUTES: &[&str] = &["OCCU", "EDUC", "RELI", "TITL", "NATI", "RESI"];

/// Id för innehåll utan egen identifierare: prefix + 12 hex-tecken av SHA-256
pub fn content_id(prefix: &str, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", prefix, hex)
}

/// Datum, år och plats för en händelsenod
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFacts {
    pub date: Option<String>,
    pub year: Option<i32>,
    pub place: Option<String>,
}

/// Läs DATE och PLAC under en händelse. Varningar för datum läggs i resultatet.
pub fn event_facts(node: &RawNode, ctx: &mut ImportContext<'_>, context: &str) -> EventFacts {
    let mut facts = EventFacts {
        place: node.child_value("PLAC").map(str::to_string),
        ..Default::default()
    };

    if let Some(raw) = node.child_value("DATE") {
        let conversion = convert_gedcom_date(raw);
        if let Some(warning) = &conversion.warning {
            ctx.warn(context, format!("{} {}", node.tag, warning));
        }
        facts.date = conversion.date_opt();
        facts.year = conversion.year;
    }

    facts
}

fn event_details(node: &RawNode) -> Option<String> {
    let value = node.text().filter(|v| !v.eq_ignore_ascii_case("Y"));
    let kind = node.child_value("TYPE");

    match (kind, value) {
        (Some(k), Some(v)) if ATTRIBUTES.contains(&node.tag.as_str()) => Some(format!("{} ({})", v, k)),
        (Some(k), Some(v)) => Some(format!("{}: {}", k, v)),
        (Some(k), None) => Some(k.to_string()),
        (None, Some(v)) => Some(v.to_string()),
        (None, None) => None,
    }
}

/// Ägaren till raderna som skrivs
pub struct Owner<'n> {
    pub entity_type: EntityType,
    pub entity_id: &'n str,
    pub node: &'n RawNode,
    /// Händelsetaggar som läses för posttypen
    pub event_tags: &'n [&'n str],
    /// Falskt för personer vars uppgifter döljs
    pub details: bool,
    /// Beskrivning för varningar
    pub context: &'n str,
}

/// Skriv ägda rader efter att huvudraden skrivits
///
/// Vid sammanslagning läggs bara händelser och källhänvisningar till som
/// inte redan finns. Länkar är unika i databasen.
pub fn write_owned(ctx: &mut ImportContext<'_>, owner: &Owner<'_>, mode: WriteMode) -> Result<(), DispatchError> {
    if !mode.writes_owned() {
        return Ok(());
    }
    let merge = mode == WriteMode::Merged;

    if owner.details {
        write_events(ctx, owner, merge)?;
        write_citations(ctx, owner, merge)?;
    }
    write_notes(ctx, owner)?;
    write_media_links(ctx, owner)?;
    Ok(())
}

fn write_events(ctx: &mut ImportContext<'_>, owner: &Owner<'_>, merge: bool) -> Result<(), DispatchError> {
    let store = ctx.store;
    let existing = if merge {
        store.events(owner.entity_type, owner.entity_id, &ctx.tree_id)?
    } else {
        Vec::new()
    };

    for child in owner.node.children.iter().filter(|c| owner.event_tags.contains(&c.tag.as_str())) {
        let facts = event_facts(child, ctx, owner.context);
        let mut event = Event::new(owner.entity_id, owner.entity_type, ctx.tree_id.as_str(), child.tag.as_str());
        event.event_date = facts.date;
        event.event_year = facts.year;
        event.event_place = facts.place;
        event.details = event_details(child);

        if existing.iter().any(|e| e.same_as(&event)) {
            continue;
        }
        store.insert_event(&event)?;
    }
    Ok(())
}

/// SOUR-noder på posten och under dess händelser
fn citation_nodes<'n>(owner: &Owner<'n>) -> Vec<&'n RawNode> {
    let mut nodes: Vec<&RawNode> = owner.node.children_with("SOUR").collect();
    for event in owner.node.children.iter().filter(|c| owner.event_tags.contains(&c.tag.as_str())) {
        nodes.extend(event.children_with("SOUR"));
    }
    nodes
}

fn write_citations(ctx: &mut ImportContext<'_>, owner: &Owner<'_>, merge: bool) -> Result<(), DispatchError> {
    let nodes = citation_nodes(owner);
    if nodes.is_empty() {
        return Ok(());
    }

    let store = ctx.store;
    let existing = if merge {
        store.citations(owner.entity_type, owner.entity_id, &ctx.tree_id)?
    } else {
        Vec::new()
    };

    for node in nodes {
        let source_id = match &node.pointer {
            Some(pointer) => ctx.target_id(EntityType::Source, pointer.as_str())?,
            None => match node.raw_text() {
                Some(text) => inline_source(ctx, text)?,
                None => {
                    ctx.warn(owner.context, "SOUR utan källa ignorerades");
                    continue;
                }
            },
        };

        let quality = match node.child_value("QUAY") {
            Some(q) => match q.parse::<i32>() {
                Ok(q) if (0..=3).contains(&q) => Some(q),
                _ => {
                    ctx.warn(owner.context, format!("Ogiltig QUAY: {}", q));
                    None
                }
            },
            None => None,
        };

        let date = node
            .descendant_value(&["DATA", "DATE"])
            .map(|raw| {
                let conversion = convert_gedcom_date(raw);
                conversion.date_opt().unwrap_or_else(|| raw.to_string())
            });

        let citation = Citation {
            citation_id: None,
            entity_id: owner.entity_id.to_string(),
            entity_type: owner.entity_type,
            tree_id: ctx.tree_id.clone(),
            source_id,
            page: node.child_value("PAGE").map(str::to_string),
            quality,
            text: node
                .descendant(&["DATA", "TEXT"])
                .and_then(|t| t.raw_text())
                .map(str::to_string),
            date,
        };

        if existing
            .iter()
            .any(|c| c.source_id == citation.source_id && c.page == citation.page)
        {
            continue;
        }
        store.insert_citation(&citation)?;
    }
    Ok(())
}

/// Källa angiven som text direkt under SOUR
fn inline_source(ctx: &mut ImportContext<'_>, text: &str) -> Result<String, DispatchError> {
    let id = content_id("S", text);
    let store = ctx.store;
    if !store.exists(EntityType::Source, &id, &ctx.tree_id)? {
        let mut source = Source::new(id.as_str(), ctx.tree_id.as_str());
        source.title = Some(text.trim().to_string());
        store.upsert(&StoreRow::Source(source))?;
    }
    Ok(id)
}

fn write_notes(ctx: &mut ImportContext<'_>, owner: &Owner<'_>) -> Result<(), DispatchError> {
    for node in owner.node.children_with("NOTE") {
        let note_id = match &node.pointer {
            Some(pointer) => ctx.target_id(EntityType::Note, pointer.as_str())?,
            None => match node.raw_text() {
                Some(text) => {
                    let id = content_id("N", text);
                    let store = ctx.store;
                    if !store.exists(EntityType::Note, &id, &ctx.tree_id)? {
                        store.upsert(&StoreRow::Note(Note::new(id.as_str(), ctx.tree_id.as_str(), text)))?;
                    }
                    id
                }
                None => continue,
            },
        };

        ctx.store.link_note(&NoteLink {
            entity_id: owner.entity_id.to_string(),
            entity_type: owner.entity_type,
            tree_id: ctx.tree_id.clone(),
            note_id,
        })?;
    }
    Ok(())
}

fn write_media_links(ctx: &mut ImportContext<'_>, owner: &Owner<'_>) -> Result<(), DispatchError> {
    for node in owner.node.children_with("OBJE") {
        let media_id = match &node.pointer {
            Some(pointer) => ctx.target_id(EntityType::Media, pointer.as_str())?,
            None => match inline_media(ctx, node, owner.context)? {
                Some(id) => id,
                None => {
                    ctx.warn(owner.context, "OBJE utan FILE ignorerades");
                    continue;
                }
            },
        };

        ctx.store.link_media(&MediaLink {
            entity_id: owner.entity_id.to_string(),
            entity_type: owner.entity_type,
            tree_id: ctx.tree_id.clone(),
            media_id,
        })?;
    }
    Ok(())
}

/// Läs FILE, FORM och TITL från en OBJE-nod (5.5.1 under FILE, 5.5 på samma nivå)
pub fn media_from_node(node: &RawNode, media_id: &str, tree_id: &str) -> Media {
    let mut media = Media::new(media_id, tree_id);
    let file = node.child("FILE");
    media.file_path = file.and_then(|f| f.text()).map(str::to_string);
    media.format = file
        .and_then(|f| f.child_value("FORM"))
        .or_else(|| node.child_value("FORM"))
        .map(str::to_string)
        .or_else(|| {
            let name = media.file_path.as_deref().and_then(file_name_of)?;
            get_file_extension(Path::new(name))
        });
    media.title = file
        .and_then(|f| f.child_value("TITL"))
        .or_else(|| node.child_value("TITL"))
        .map(str::to_string);
    media
}

/// Kopiera in mediafilen om det är påslaget. Varning om filen inte hittas.
pub fn store_media_file(ctx: &mut ImportContext<'_>, media: &mut Media, context: &str) {
    if !ctx.settings.copy_media_files {
        return;
    }
    let (Some(storage), Some(path)) = (ctx.media, media.file_path.clone()) else {
        return;
    };

    match storage.locate(&path) {
        Some(found) => match storage.store(&found) {
            Ok(stored) => media.stored_path = Some(stored.display().to_string()),
            Err(e) => ctx.warn(context, format!("Kunde inte kopiera {}: {}", path, e)),
        },
        None => ctx.warn(context, format!("Mediafil hittades inte: {}", path)),
    }
}

fn inline_media(ctx: &mut ImportContext<'_>, node: &RawNode, context: &str) -> Result<Option<String>, DispatchError> {
    let Some(file) = node.descendant_value(&["FILE"]) else {
        return Ok(None);
    };

    let id = content_id("M", file);
    let store = ctx.store;
    if !store.exists(EntityType::Media, &id, &ctx.tree_id)? {
        let mut media = media_from_node(node, &id, &ctx.tree_id);
        store_media_file(ctx, &mut media, context);
        store.upsert(&StoreRow::Media(media))?;
    }
    Ok(Some(id))
}
