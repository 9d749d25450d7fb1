//! Structural validation of a repaired chunk payload.
//!
//! A payload passes only when it contains exactly one `<character>` per
//! index in the chunk's range, each carrying a non-empty name. The specific
//! failed condition is logged for the operator; orchestration consumes only
//! the boolean.

use std::collections::BTreeSet;

/// Check a payload against its chunk range. Empty payloads fail.
pub fn validate_payload(xml: &str, start: u32, end: u32) -> bool {
    let document = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(start, end, error = %e, "Payload is not well-formed XML");
            return false;
        }
    };

    let expected: BTreeSet<u32> = (start..=end).collect();
    let mut found: BTreeSet<u32> = BTreeSet::new();

    for character in document
        .descendants()
        .filter(|n| n.has_tag_name("character"))
    {
        if character.attribute("name").map_or(true, |n| n.trim().is_empty()) {
            tracing::warn!(start, end, "Character missing a non-empty name attribute");
            return false;
        }

        let index = match character.attribute("index").and_then(|i| i.trim().parse::<u32>().ok()) {
            Some(index) => index,
            None => {
                tracing::warn!(start, end, "Character missing a numeric index attribute");
                return false;
            }
        };

        if !expected.contains(&index) {
            tracing::warn!(start, end, index, "Character index out of range");
            return false;
        }
        if !found.insert(index) {
            tracing::warn!(start, end, index, "Duplicate character index");
            return false;
        }
    }

    if found != expected {
        let missing: Vec<u32> = expected.difference(&found).copied().collect();
        tracing::warn!(start, end, ?missing, "Characters missing from payload");
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(characters: &[(&str, &str)]) -> String {
        let mut xml = String::from("<characters>");
        for (index, name) in characters {
            xml.push_str(&format!(
                r#"<character index="{index}" name="{name}"><state value="0">absent</state><state value="1">present</state></character>"#
            ));
        }
        xml.push_str("</characters>");
        xml
    }

    #[test]
    fn exact_coverage_validates() {
        let xml = payload(&[("2", "Head shape"), ("3", "Tail spine"), ("4", "Carapace")]);
        assert!(validate_payload(&xml, 2, 4));
    }

    #[test]
    fn empty_name_fails() {
        let xml = payload(&[("2", "Head shape"), ("3", ""), ("4", "Carapace")]);
        assert!(!validate_payload(&xml, 2, 4));
    }

    #[test]
    fn missing_name_attribute_fails() {
        let xml = r#"<characters><character index="2"><state value="0">a</state></character></characters>"#;
        assert!(!validate_payload(xml, 2, 2));
    }

    #[test]
    fn duplicate_index_fails() {
        let xml = payload(&[("2", "Head shape"), ("3", "Tail spine"), ("3", "Tail spine again")]);
        assert!(!validate_payload(&xml, 2, 4));
    }

    #[test]
    fn out_of_range_index_fails() {
        let xml = payload(&[("2", "Head"), ("3", "Tail"), ("4", "Carapace"), ("5", "Extra")]);
        assert!(!validate_payload(&xml, 2, 4));
    }

    #[test]
    fn missing_index_from_range_fails() {
        let xml = payload(&[("2", "Head"), ("4", "Carapace")]);
        assert!(!validate_payload(&xml, 2, 4));
    }

    #[test]
    fn missing_index_attribute_fails() {
        let xml = r#"<characters><character name="Head"><state value="0">a</state></character></characters>"#;
        assert!(!validate_payload(xml, 1, 1));
    }

    #[test]
    fn malformed_xml_fails() {
        assert!(!validate_payload("<characters><character", 1, 1));
    }

    #[test]
    fn empty_payload_fails() {
        assert!(!validate_payload("", 1, 3));
    }

    #[test]
    fn single_character_range() {
        let xml = payload(&[("7", "Septomaxilla")]);
        assert!(validate_payload(&xml, 7, 7));
    }
}
