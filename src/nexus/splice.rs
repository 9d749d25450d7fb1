//! Splice a CHARSTATELABELS block into a NEXUS document.
//!
//! Two line-anchored markers drive the edit: an existing `CHARSTATELABELS`
//! block (up to its closing `;` line) is removed if present, and the new
//! block is inserted immediately before the `MATRIX` line, mirroring its
//! indentation. A document without a `MATRIX` anchor comes back unchanged —
//! a no-op signal, not an error.

/// Outcome of a splice attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceResult {
    pub text: String,
    /// False when no `MATRIX` anchor was found; `text` is then the input.
    pub inserted: bool,
}

/// Replace/insert the CHARSTATELABELS block of `document` with `labels`
/// (pre-formatted lines, as produced by label aggregation).
pub fn splice_labels(document: &str, labels: &[String]) -> SpliceResult {
    let mut lines: Vec<String> = document.lines().map(str::to_string).collect();

    remove_existing_block(&mut lines);

    let anchor = lines
        .iter()
        .position(|line| line.trim_start().starts_with("MATRIX"));
    let Some(matrix_index) = anchor else {
        return SpliceResult {
            text: document.to_string(),
            inserted: false,
        };
    };

    let indent: String = lines[matrix_index]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    let mut block = Vec::with_capacity(labels.len() + 1);
    block.push(format!("{indent}\tCHARSTATELABELS"));
    for label in labels {
        block.push(format!("{indent}{label}"));
    }
    lines.splice(matrix_index..matrix_index, block);

    SpliceResult {
        text: lines.join("\n"),
        inserted: true,
    }
}

/// Delete a pre-existing CHARSTATELABELS block: from its header line through
/// the next line starting with `;` at the same nesting.
fn remove_existing_block(lines: &mut Vec<String>) {
    let mut block_start = None;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("CHARSTATELABELS") {
            block_start = Some(i);
        } else if let Some(start) = block_start {
            if trimmed.starts_with(';') {
                lines.drain(start..=i);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXUS: &str = "#NEXUS\nBEGIN CHARACTERS;\n\tDIMENSIONS NCHAR=2;\n\tMATRIX\n\ttaxon_a 01\n\t;\nEND;\n";

    fn labels() -> Vec<String> {
        vec![
            "\t\t1 'Head' / 'absent' 'present',".to_string(),
            "\t\t2 'Tail' / 'absent' 'present';".to_string(),
        ]
    }

    #[test]
    fn inserts_block_before_matrix() {
        let result = splice_labels(NEXUS, &labels());
        assert!(result.inserted);

        let lines: Vec<&str> = result.text.lines().collect();
        let header = lines.iter().position(|l| l.trim() == "CHARSTATELABELS").unwrap();
        let matrix = lines.iter().position(|l| l.trim_start().starts_with("MATRIX")).unwrap();
        assert_eq!(matrix, header + 3, "block sits immediately before MATRIX");
    }

    #[test]
    fn inserted_lines_mirror_matrix_indentation() {
        let result = splice_labels(NEXUS, &labels());

        // MATRIX is indented with one tab; every inserted line starts with it.
        for line in result.text.lines().filter(|l| l.contains("'Head'") || l.contains("'Tail'")) {
            assert!(line.starts_with("\t\t\t"), "label line keeps anchor indent: {line:?}");
        }
        assert!(result.text.contains("\t\tCHARSTATELABELS"));
    }

    #[test]
    fn output_grows_by_exactly_the_block() {
        let result = splice_labels(NEXUS, &labels());
        let inserted: usize = labels().iter().map(|l| l.len() + 2).sum::<usize>() // "\t" indent + line + "\n"
            + "\t\tCHARSTATELABELS\n".len();
        // lines() + join("\n") drops the trailing newline, hence the -1.
        assert_eq!(result.text.len(), NEXUS.len() + inserted - 1);
    }

    #[test]
    fn existing_block_is_replaced_not_duplicated() {
        let with_block = "#NEXUS\nBEGIN CHARACTERS;\n\tCHARSTATELABELS\n\t\t1 'Old' / 'x' 'y';\n\t;\n\tMATRIX\n\ttaxon_a 01\n\t;\nEND;\n";
        let result = splice_labels(with_block, &labels());

        assert!(result.inserted);
        assert!(!result.text.contains("'Old'"));
        assert_eq!(result.text.matches("CHARSTATELABELS").count(), 1);
        assert!(result.text.contains("'Head'"));
    }

    #[test]
    fn missing_anchor_returns_input_unchanged() {
        let no_matrix = "#NEXUS\nBEGIN TAXA;\n\tTAXLABELS taxon_a;\nEND;\n";
        let result = splice_labels(no_matrix, &labels());

        assert!(!result.inserted);
        assert_eq!(result.text, no_matrix);
    }

    #[test]
    fn empty_label_list_still_writes_header() {
        let result = splice_labels(NEXUS, &[]);
        assert!(result.inserted);
        assert!(result.text.contains("CHARSTATELABELS"));
    }
}
