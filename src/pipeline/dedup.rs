//! Line-level deduplication of streamed answers.
//!
//! Multimodal models answering over several retrieved pages tend to repeat
//! the same sentence once per page. The answer is cleaned once, after the
//! stream is exhausted: every line is trimmed, blank lines are dropped, and a
//! line is kept only the first time its trimmed form appears.

use std::collections::HashSet;

/// Remove blank and repeated lines, keeping first-occurrence order.
///
/// Output lines are joined with `\n` without a trailing newline.
pub fn deduplicate_lines(text: &str) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let line = line.trim();
        if !line.is_empty() && seen.insert(line) {
            kept.push(line);
        }
    }

    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn removes_trimmed_duplicates_and_blanks() {
        assert_eq!(deduplicate_lines("a\na\nb\n\n a \n"), "a\nb");
    }

    #[test]
    fn empty_input() {
        assert_eq!(deduplicate_lines(""), "");
        assert_eq!(deduplicate_lines("\n\n   \n"), "");
    }

    #[test]
    fn preserves_first_occurrence_order() {
        assert_eq!(deduplicate_lines("c\nb\nc\na\nb"), "c\nb\na");
    }

    #[test]
    fn handles_crlf() {
        assert_eq!(deduplicate_lines("x\r\ny\r\nx\r\n"), "x\ny");
    }

    #[test]
    fn inner_whitespace_is_significant() {
        assert_eq!(deduplicate_lines("a b\na  b"), "a b\na  b");
    }

    proptest! {
        #[test]
        fn idempotent(input in ".{0,200}") {
            let once = deduplicate_lines(&input);
            prop_assert_eq!(deduplicate_lines(&once), once);
        }

        #[test]
        fn no_blank_or_repeated_lines(lines in prop::collection::vec("[ab ]{0,3}", 0..30)) {
            let out = deduplicate_lines(&lines.join("\n"));
            let mut seen = HashSet::new();
            for line in out.split('\n').filter(|_| !out.is_empty()) {
                prop_assert!(!line.is_empty());
                prop_assert_eq!(line, line.trim());
                prop_assert!(seen.insert(line.to_string()));
            }
        }
    }
}
