//! Namnhantering för GEDCOM-personer

use serde::{Deserialize, Serialize};

use super::node::RawNode;

/// Förnamn och efternamn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub given: String,
    pub surname: String,
}

impl PersonName {
    pub fn is_empty(&self) -> bool {
        self.given.is_empty() && self.surname.is_empty()
    }

    pub fn full_name(&self) -> String {
        match (self.given.is_empty(), self.surname.is_empty()) {
            (false, false) => format!("{} {}", self.given, self.surname),
            (false, true) => self.given.clone(),
            (true, false) => self.surname.clone(),
            (true, true) => String::new(),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dela upp ett GEDCOM-namn i formatet "Förnamn /Efternamn/ Suffix".
///
/// Efternamnet är segmentet mellan snedstrecken. Övriga delar blir
/// förnamn, med hopslagna mellanslag.
pub fn process_gedcom_name(raw: &str) -> PersonName {
    let name = raw.trim();

    let Some(slash_pos) = name.find('/') else {
        return PersonName {
            given: collapse_whitespace(name),
            surname: String::new(),
        };
    };

    let before = &name[..slash_pos];
    let rest = &name[slash_pos + 1..];

    let (surname, after) = match rest.find('/') {
        Some(end_slash) => (&rest[..end_slash], &rest[end_slash + 1..]),
        // Saknat avslutande snedstreck: resten är efternamn
        None => (rest, ""),
    };

    PersonName {
        given: collapse_whitespace(&format!("{} {}", before, after)),
        surname: collapse_whitespace(surname),
    }
}

/// Namn för en INDI-post: första NAME, med GIVN/SURN som reserv
pub fn name_from_record(node: &RawNode) -> PersonName {
    let Some(name_node) = node.child("NAME") else {
        return PersonName::default();
    };

    let mut name = name_node
        .text()
        .map(process_gedcom_name)
        .unwrap_or_default();

    if name.given.is_empty() {
        if let Some(givn) = name_node.child_value("GIVN") {
            name.given = collapse_whitespace(givn);
        }
    }
    if name.surname.is_empty() {
        if let Some(surn) = name_node.child_value("SURN") {
            name.surname = collapse_whitespace(surn);
        }
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name() {
        let name = process_gedcom_name("John /Smith/");
        assert_eq!(name.given, "John");
        assert_eq!(name.surname, "Smith");

        let name = process_gedcom_name("Anna Maria /Svensson/");
        assert_eq!(name.given, "Anna Maria");
        assert_eq!(name.surname, "Svensson");

        let name = process_gedcom_name("/Andersson/");
        assert_eq!(name.given, "");
        assert_eq!(name.surname, "Andersson");
    }

    #[test]
    fn test_name_without_slashes() {
        let name = process_gedcom_name("Jane Doe");
        assert_eq!(name.given, "Jane Doe");
        assert_eq!(name.surname, "");
    }

    #[test]
    fn test_suffix_and_whitespace() {
        let name = process_gedcom_name("  Karl   Johan  /von  Berg/  Jr ");
        assert_eq!(name.given, "Karl Johan Jr");
        assert_eq!(name.surname, "von Berg");

        let name = process_gedcom_name("Per /Olsson");
        assert_eq!(name.surname, "Olsson");
    }

    #[test]
    fn test_name_from_record_falls_back_to_parts() {
        let mut name = RawNode::new(1, "NAME", Some("/Berg/".into()));
        name.children.push(RawNode::new(2, "GIVN", Some("Lisa".into())));
        name.children.push(RawNode::new(2, "SURN", Some("Berg".into())));
        let mut indi = RawNode::new(0, "INDI", None);
        indi.children.push(name);
        indi.children.push(RawNode::new(1, "NAME", Some("Annat /Namn/".into())));

        let parsed = name_from_record(&indi);
        assert_eq!(parsed.given, "Lisa");
        assert_eq!(parsed.surname, "Berg");
        assert_eq!(parsed.full_name(), "Lisa Berg");

        assert!(name_from_record(&RawNode::new(0, "INDI", None)).is_empty());
    }
}
