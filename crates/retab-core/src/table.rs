//! Tabular projection of the clean snapshot, plus the incremental feed that
//! keeps it current fragment by fragment.
//!
//! [`project`] is the pure projection. [`TableFeed`] produces identical
//! results over a stream of appends without rescanning the whole accumulator
//! each time: text up to the last safe row boundary is settled once and
//! never reprocessed, and only the unsettled tail is re-derived.

use crate::reconcile::first_open_marker;
use crate::sanitize::strip_artifacts;

/// Split a clean snapshot into rows of cells.
///
/// Lines that are empty after trimming are discarded; remaining lines split
/// on the tab delimiter with empty fields preserved, so a blank trailing
/// field still appears as an empty string. Ragged rows pass through
/// unchanged -- validation against a column list is the consumer's job.
pub fn project(clean: &str) -> Vec<Vec<String>> {
    clean
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Incrementally maintained clean snapshot and row table.
///
/// Invariants, checked against the pure functions in tests:
/// `snapshot()` equals `sanitize` over the concatenation of all pushed
/// fragments, and `rows()` equals `project(&snapshot())`.
#[derive(Debug, Default)]
pub struct TableFeed {
    /// Sanitized text that can no longer change. Starts at the first
    /// non-whitespace output and always ends on a row boundary.
    settled: String,
    /// Rows projected from `settled`; never rewritten once pushed.
    settled_rows: Vec<Vec<String>>,
    /// Raw tail whose interpretation may still change with future fragments.
    tail: String,
}

impl TableFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw fragment and advance the settled boundary when safe.
    pub fn push(&mut self, fragment: &str) {
        self.tail.push_str(fragment);
        self.try_settle();
    }

    /// Clean snapshot of everything pushed so far.
    pub fn snapshot(&self) -> String {
        let mut out = self.settled.clone();
        out.push_str(&strip_artifacts(&self.tail));
        out.trim().to_string()
    }

    /// Live row table: settled rows plus whatever the tail currently parses
    /// to. Settled rows only ever gain successors; the trailing rows may
    /// still grow cells or be reshaped as more text arrives.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let tail_clean = strip_artifacts(&self.tail);
        let mut tail_part = tail_clean.trim_end();
        if self.settled.is_empty() {
            tail_part = tail_part.trim_start();
        }
        let mut rows = self.settled_rows.clone();
        rows.extend(project(tail_part));
        rows
    }

    /// Move the prefix of the tail up to the last safe row boundary into the
    /// settled region.
    ///
    /// A cut is safe only when nothing before it can be reshaped by future
    /// fragments: no control marker is still open, the sanitized prefix ends
    /// on a newline that survived sanitization, and the last settled line
    /// does not end in whitespace the final trim could reach back into. When
    /// any guard fails the tail is simply kept raw -- correctness never
    /// depends on settling, only the amount of reprocessing does.
    fn try_settle(&mut self) {
        let limit = first_open_marker(&self.tail).unwrap_or(self.tail.len());
        let Some(newline) = self.tail[..limit].rfind('\n') else {
            return;
        };
        let mut cleaned = strip_artifacts(&self.tail[..=newline]);
        if self.settled.is_empty() {
            cleaned = cleaned.trim_start().to_string();
        }
        if !cleaned.is_empty() {
            if !row_boundary_safe(&cleaned) || first_open_marker(&cleaned).is_some() {
                return;
            }
            for line in cleaned.split('\n').filter(|line| !line.trim().is_empty()) {
                self.settled_rows
                    .push(line.split('\t').map(str::to_string).collect());
            }
            self.settled.push_str(&cleaned);
        }
        self.tail.drain(..=newline);
    }
}

/// Whether settling `cleaned` leaves the settled region immune to the final
/// trim: it must end with a newline, and the last character before the
/// trailing newlines must not itself be whitespace.
fn row_boundary_safe(cleaned: &str) -> bool {
    if !cleaned.ends_with('\n') {
        return false;
    }
    match cleaned.chars().rev().find(|c| *c != '\n') {
        None => true,
        Some(c) => !c.is_whitespace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;

    #[test]
    fn project_preserves_empty_fields() {
        assert_eq!(
            project("a\tb\t\nc\t\td"),
            vec![
                vec!["a".to_string(), "b".to_string(), String::new()],
                vec!["c".to_string(), String::new(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn project_discards_blank_lines() {
        assert_eq!(
            project("a\tb\n\n   \nc\td"),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn project_passes_ragged_rows_through() {
        let rows = project("a\nb\tc\td");
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn project_empty_input() {
        assert!(project("").is_empty());
    }

    /// Oracle check: a feed must agree with the pure pipeline at every
    /// prefix, no matter how the text is chopped up.
    fn assert_feed_matches_pure(fragments: &[&str]) {
        let mut feed = TableFeed::new();
        let mut raw = String::new();
        for fragment in fragments {
            feed.push(fragment);
            raw.push_str(fragment);
            let expected = sanitize(&raw);
            assert_eq!(feed.snapshot(), expected, "snapshot diverged at {raw:?}");
            assert_eq!(feed.rows(), project(&expected), "rows diverged at {raw:?}");
        }
    }

    #[test]
    fn feed_matches_pure_pipeline_on_plain_rows() {
        assert_feed_matches_pure(&["2024/01/01\tA\t5\n", "2024/01/01\tB\t3\n"]);
    }

    #[test]
    fn feed_matches_pure_pipeline_on_token_sized_fragments() {
        assert_feed_matches_pure(&[
            "202", "4/01/01\tA", "\t5", "\n2024/01/01", "\tB\t3\n", "[[MIS", "SING:",
            " 无]", "]",
        ]);
    }

    #[test]
    fn feed_matches_pure_pipeline_with_fences() {
        assert_feed_matches_pure(&["```tsv\na\tb\n", "c\td\n", "```"]);
        assert_feed_matches_pure(&["``", "`tsv\na\tb\nc", "\td\n``", "`"]);
    }

    #[test]
    fn feed_matches_pure_pipeline_with_leading_noise() {
        assert_feed_matches_pure(&["  \n", "\n a\tb\n", "c\td"]);
    }

    #[test]
    fn feed_matches_pure_pipeline_with_partial_trailing_line() {
        assert_feed_matches_pure(&["a\tb\nc\t", "d"]);
    }

    #[test]
    fn feed_matches_pure_pipeline_with_marker_mid_stream() {
        assert_feed_matches_pure(&["a\tb\n[[MISSING: x]]\n", "c\td\n"]);
    }

    #[test]
    fn settled_rows_never_rewrite() {
        let mut feed = TableFeed::new();
        feed.push("a\tb\nc\t");
        let first = feed.rows();
        assert_eq!(first[0], vec!["a".to_string(), "b".to_string()]);
        feed.push("d\ne\tf\n");
        let second = feed.rows();
        assert_eq!(second[0], first[0]);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn row_count_grows_monotonically() {
        let fragments = ["a\tb\n", "c\td\n", "e\t", "f\n"];
        let mut feed = TableFeed::new();
        let mut last = 0;
        for fragment in fragments {
            feed.push(fragment);
            let count = feed.rows().len();
            assert!(count >= last, "row count shrank from {last} to {count}");
            last = count;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn open_marker_blocks_settling_but_not_correctness() {
        let mut feed = TableFeed::new();
        // The marker capture may legally span newlines, so nothing after the
        // opener can settle until the terminator arrives.
        feed.push("a\tb\n[[MISSING: x\ny\n");
        assert_eq!(feed.rows().len(), 3);
        feed.push("z]]\n");
        let raw = "a\tb\n[[MISSING: x\ny\nz]]\n";
        assert_eq!(feed.snapshot(), sanitize(raw));
        assert_eq!(feed.rows(), project(&sanitize(raw)));
    }
}
