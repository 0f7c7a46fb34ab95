//! Output sanitization: strips formatting artifacts from streamed text.
//!
//! The backend is instructed to emit plain delimited text, but models still
//! open or close markdown fences at arbitrary points -- including mid-stream
//! with only the opening half visible -- and the reconciliation control
//! marker travels in-band. [`sanitize`] removes both so the result is safe
//! for tabular projection and export.

use std::sync::LazyLock;

use regex::Regex;

/// Fenced-block marker with an optional language tag, e.g. "```tsv\n",
/// "```TSV", or a bare "```". Matched anywhere, not only at line starts.
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*\n?").expect("fence pattern is valid"));

/// A complete reconciliation control marker. The capture admits no `]`, so a
/// match always sits against the full `]]` terminator.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[MISSING:[^\]]*\]\]").expect("marker pattern is valid"));

/// Remove fence and control-marker artifacts, without trimming.
///
/// Removal passes repeat until a fixpoint: deleting an artifact can join the
/// surrounding text into a new artifact occurrence, which then has to go too.
/// Each pass strictly shrinks the string, so the loop terminates.
pub(crate) fn strip_artifacts(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let defenced = FENCE.replace_all(&current, "");
        let pass = MARKER.replace_all(defenced.as_ref(), "").into_owned();
        if pass == current {
            return current;
        }
        current = pass;
    }
}

/// Clean snapshot of a raw accumulator at any instant, including partial or
/// incomplete input.
///
/// Idempotent (`sanitize(sanitize(x)) == sanitize(x)`) and total: never
/// panics, for any input. Partial markers and lone backticks are ordinary
/// text until their terminator arrives.
pub fn sanitize(raw: &str) -> String {
    strip_artifacts(raw).trim().to_string()
}
