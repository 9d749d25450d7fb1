//! Label aggregation — flatten stored payloads into CHARSTATELABELS lines.
//!
//! Aggregation runs even for partially failed jobs and emits whatever was
//! stored, in ascending chunk order. NEXUS quoting forbids apostrophes
//! inside quoted names, so they become `?`.

use super::types::{CharacterLabel, ChunkKey, StateLabel};

/// Parse every stored payload, in the given (ascending) order, into a flat
/// label list. Unparseable payloads are skipped with a warning; chunk gates
/// have already recorded them as unresolved.
pub fn collect_labels(payloads: &[(ChunkKey, String)]) -> Vec<CharacterLabel> {
    let mut labels: Vec<CharacterLabel> = Vec::new();

    for (key, payload) in payloads {
        let document = match roxmltree::Document::parse(payload) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(chunk = %key, error = %e, "Skipping unparseable payload during aggregation");
                continue;
            }
        };

        for character in document
            .descendants()
            .filter(|n| n.has_tag_name("character"))
        {
            let name = character
                .attribute("name")
                .unwrap_or_default()
                .replace('\'', "?");

            // The payload's own index wins; position is the fallback.
            let index = character
                .attribute("index")
                .and_then(|i| i.trim().parse::<u32>().ok())
                .unwrap_or(labels.len() as u32 + 1);

            let states = character
                .children()
                .filter(|n| n.has_tag_name("state"))
                .map(|state| StateLabel {
                    value: state.attribute("value").unwrap_or_default().to_string(),
                    description: state.text().unwrap_or_default().to_string(),
                })
                .collect();

            labels.push(CharacterLabel { index, name, states });
        }
    }

    labels
}

/// Format labels as CHARSTATELABELS lines.
///
/// Each line reads `\t\t{index} '{name}' / 'state' 'state',`; the final
/// line's terminal separator becomes `;` so the block is syntactically
/// closed.
pub fn format_labels(labels: &[CharacterLabel]) -> Vec<String> {
    let mut lines: Vec<String> = labels
        .iter()
        .map(|label| {
            let states = label
                .states
                .iter()
                .map(|s| format!("'{}'", s.description))
                .collect::<Vec<_>>()
                .join(" ");
            format!("\t\t{} '{}' / {},", label.index, label.name, states)
        })
        .collect();

    if let Some(last) = lines.last_mut() {
        if let Some(stripped) = last.strip_suffix(',') {
            *last = format!("{stripped};");
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(start: u32, names: &[&str]) -> (ChunkKey, String) {
        let end = start + names.len() as u32 - 1;
        let mut xml = String::from("<characters>");
        for (offset, name) in names.iter().enumerate() {
            xml.push_str(&format!(
                r#"<character index="{}" name="{name}"><state value="0">absent</state><state value="1">present</state></character>"#,
                start + offset as u32
            ));
        }
        xml.push_str("</characters>");
        (ChunkKey::new(start, end), xml)
    }

    #[test]
    fn labels_flatten_in_chunk_order() {
        let payloads = vec![
            payload(1, &["Head", "Tail", "Carapace"]),
            payload(4, &["Paddle", "Spine", "Telson"]),
        ];
        let labels = collect_labels(&payloads);

        assert_eq!(labels.len(), 6);
        let indices: Vec<u32> = labels.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(labels[3].name, "Paddle");
        assert_eq!(labels[0].states.len(), 2);
        assert_eq!(labels[0].states[1].value, "1");
        assert_eq!(labels[0].states[1].description, "present");
    }

    #[test]
    fn index_attribute_preferred_over_position() {
        let payloads = vec![(
            ChunkKey::new(7, 8),
            r#"<characters><character index="8" name="B"/><character index="7" name="A"/></characters>"#.to_string(),
        )];
        let labels = collect_labels(&payloads);
        assert_eq!(labels[0].index, 8);
        assert_eq!(labels[1].index, 7);
    }

    #[test]
    fn missing_index_falls_back_to_position() {
        let payloads = vec![(
            ChunkKey::new(1, 2),
            r#"<characters><character name="A"/><character name="B"/></characters>"#.to_string(),
        )];
        let labels = collect_labels(&payloads);
        assert_eq!(labels[0].index, 1);
        assert_eq!(labels[1].index, 2);
    }

    #[test]
    fn apostrophes_become_question_marks() {
        let payloads = vec![(
            ChunkKey::new(1, 1),
            r#"<characters><character index="1" name="Meckel's cartilage"/></characters>"#.to_string(),
        )];
        let labels = collect_labels(&payloads);
        assert_eq!(labels[0].name, "Meckel?s cartilage");
    }

    #[test]
    fn unparseable_payload_is_skipped() {
        let payloads = vec![
            (ChunkKey::new(1, 1), "<characters><broken".to_string()),
            payload(2, &["Tail"]),
        ];
        let labels = collect_labels(&payloads);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].name, "Tail");
    }

    #[test]
    fn formatted_lines_end_with_separator_except_last() {
        let payloads = vec![payload(1, &["Head", "Tail", "Carapace"])];
        let lines = format_labels(&collect_labels(&payloads));

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "\t\t1 'Head' / 'absent' 'present',");
        assert_eq!(lines[1], "\t\t2 'Tail' / 'absent' 'present',");
        assert_eq!(lines[2], "\t\t3 'Carapace' / 'absent' 'present';");
    }

    #[test]
    fn only_the_terminal_separator_is_rewritten() {
        let payloads = vec![(
            ChunkKey::new(1, 1),
            r#"<characters><character index="1" name="heart-, kidney-shaped vacuity"><state value="0">round</state></character></characters>"#.to_string(),
        )];
        let lines = format_labels(&collect_labels(&payloads));
        assert_eq!(lines[0], "\t\t1 'heart-, kidney-shaped vacuity' / 'round';");
    }

    #[test]
    fn empty_label_set_formats_to_nothing() {
        assert!(format_labels(&[]).is_empty());
    }
}
