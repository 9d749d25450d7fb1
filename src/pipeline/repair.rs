//! Response repair — carve the XML fragment out of free-form model output
//! and normalize the handful of malformed escapes the model actually emits.
//!
//! Phylogenetic state descriptions are full of comparisons (">3.2",
//! "<2.76", "≤", "≥") that models copy into attribute-adjacent text without
//! entity-escaping. The replacement table below is the complete set of
//! observed breakages; anything else that fails to parse stays a failed
//! chunk and is retried.

use crate::error::PipelineError;

const START_TAG: &str = "<characters>";
const END_TAG: &str = "</characters>";

/// Escape normalizations, applied in order. Each maps a malformed sequence
/// that follows a closing attribute quote to its entity-escaped form.
const REPAIRS: &[(&str, &str)] = &[
    ("\"><", "\">&lt;"),
    ("\">>", "\">&gt;"),
    ("\"> <", "\">&lt;"),
    ("\"> >", "\">&gt;"),
    ("≤", "&lt;="),
    ("≥", "&gt;="),
];

/// Extract and repair the `<characters>` fragment from one model response.
///
/// Returns the repaired fragment text, guaranteed well-formed. A response
/// with no fragment, or one that stays unparseable after repair, is a
/// `Format` error — the caller stores an empty payload and the chunk is
/// retried on the next pass. Repair is idempotent: a clean fragment comes
/// back byte-identical.
pub fn repair_fragment(response: &str) -> Result<String, PipelineError> {
    let start = response
        .find(START_TAG)
        .ok_or_else(|| PipelineError::Format("No <characters> fragment in response".to_string()))?;
    let end = response[start..]
        .find(END_TAG)
        .map(|offset| start + offset + END_TAG.len())
        .ok_or_else(|| PipelineError::Format("Unclosed <characters> fragment".to_string()))?;

    let mut fragment = response[start..end].to_string();
    for (malformed, escaped) in REPAIRS {
        fragment = fragment.replace(malformed, escaped);
    }

    roxmltree::Document::parse(&fragment)
        .map_err(|e| PipelineError::Format(format!("Fragment not well-formed after repair: {e}")))?;

    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"<characters>
    <character index="1" name="Pallial line">
        <state value="0">sinuous</state>
        <state value="1">straight</state>
    </character>
</characters>"#;

    #[test]
    fn extracts_fragment_from_surrounding_prose() {
        let response = format!("Sure, here is the XML you asked for:\n\n{CLEAN}\n\nLet me know!");
        assert_eq!(repair_fragment(&response).unwrap(), CLEAN);
    }

    #[test]
    fn clean_fragment_is_byte_identical() {
        assert_eq!(repair_fragment(CLEAN).unwrap(), CLEAN);
    }

    #[test]
    fn repair_is_idempotent() {
        let once = repair_fragment(CLEAN).unwrap();
        let twice = repair_fragment(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn bare_lt_after_quote_is_escaped() {
        let response = r#"<characters><character index="1" name="Paddle ratio"><state value="1"><2.76</state></character></characters>"#;
        let repaired = repair_fragment(response).unwrap();
        assert!(repaired.contains(r#"<state value="1">&lt;2.76</state>"#));
    }

    #[test]
    fn bare_gt_after_quote_is_escaped() {
        let response = r#"<characters><character index="1" name="Paddle ratio"><state value="0">>3.2</state></character></characters>"#;
        let repaired = repair_fragment(response).unwrap();
        assert!(repaired.contains(r#"<state value="0">&gt;3.2</state>"#));
    }

    #[test]
    fn spaced_variants_are_escaped() {
        let lt = r#"<characters><character index="1" name="n"><state value="0"> <1.5</state></character></characters>"#;
        let repaired = repair_fragment(lt).unwrap();
        assert!(repaired.contains("&lt;1.5"));

        let gt = r#"<characters><character index="1" name="n"><state value="0"> >1.5</state></character></characters>"#;
        let repaired = repair_fragment(gt).unwrap();
        assert!(repaired.contains("&gt;1.5"));
    }

    #[test]
    fn comparison_glyphs_become_entities() {
        let response = "<characters><character index=\"1\" name=\"n\"><state value=\"0\">≤40%</state><state value=\"1\">≥60%</state></character></characters>";
        let repaired = repair_fragment(response).unwrap();
        assert!(repaired.contains("&lt;=40%"));
        assert!(repaired.contains("&gt;=60%"));
        assert!(!repaired.contains('≤'));
        assert!(!repaired.contains('≥'));
    }

    #[test]
    fn response_without_fragment_fails() {
        let result = repair_fragment("I could not find any characters in this text.");
        assert!(matches!(result, Err(PipelineError::Format(_))));
    }

    #[test]
    fn unclosed_fragment_fails() {
        let result = repair_fragment("<characters><character index=\"1\" name=\"n\">");
        assert!(matches!(result, Err(PipelineError::Format(_))));
    }

    #[test]
    fn irreparable_markup_fails() {
        // Stray '<' in the middle of text, not adjacent to a quote: outside
        // the repair table, so parsing must fail.
        let response = r#"<characters><character index="1" name="n"><state value="0">a < b</state></character></characters>"#;
        assert!(matches!(repair_fragment(response), Err(PipelineError::Format(_))));
    }
}
