//! Roster reconciliation side channel.
//!
//! When a run carries a roster, the prompt directs the backend to append one
//! trailing control marker, `[[MISSING: <names or "none">]]`, naming every
//! expected participant that produced no data. The marker arrives in-band
//! and may be split across fragments at any position, so a match is only
//! accepted once the full `]]` terminator is present in the accumulated
//! text -- a marker still being streamed in must never fire.

use std::sync::LazyLock;

use regex::Regex;

/// Literal opener of the control marker.
pub(crate) const MARKER_OPENER: &str = "[[MISSING:";

/// Complete control marker with its capture. The capture admits no `]`, so
/// the match is always bounded by the full `]]` terminator.
static MARKER_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[MISSING:([^\]]*)\]\]").expect("marker pattern is valid"));

/// Capture values meaning "nobody is missing".
const NONE_TOKENS: &[&str] = &["none", "无"];

/// Outcome of the reconciliation side channel for one run.
///
/// The transition is one-directional: once `Complete` or `Incomplete` is
/// reached it never reverts to `Unknown` within the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// No complete control marker observed yet.
    Unknown,
    /// Marker observed; every expected participant reported.
    Complete,
    /// Marker observed; these participants produced no data.
    Incomplete(Vec<String>),
}

/// Reconcile against the **raw**, unsanitized accumulator.
///
/// The marker is searched in raw text because other output may still be
/// inside an unterminated fence when it arrives.
pub fn reconcile(raw: &str) -> ReconciliationResult {
    match MARKER_CAPTURE.captures(raw) {
        None => ReconciliationResult::Unknown,
        Some(caps) => parse_capture(caps.get(1).map_or("", |m| m.as_str())),
    }
}

/// Interpret a confirmed marker capture.
fn parse_capture(capture: &str) -> ReconciliationResult {
    let trimmed = capture.trim();
    if NONE_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
    {
        return ReconciliationResult::Complete;
    }
    let names: Vec<String> = trimmed
        .split([',', '，'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        ReconciliationResult::Complete
    } else {
        ReconciliationResult::Incomplete(names)
    }
}

/// Byte offset of the first marker opener that may still complete with
/// future text, if any.
///
/// An opener is "open" while the text after it has no `]` at all, or ends on
/// a lone `]` whose second half may still arrive. A lone `]` followed by
/// anything else kills that opener for good (the capture admits no `]`), but
/// a later opener -- including one inside the dead capture -- may still
/// match, exactly as the pattern in [`reconcile`] would.
pub(crate) fn first_open_marker(text: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = text[from..].find(MARKER_OPENER) {
        let start = from + found;
        let body_start = start + MARKER_OPENER.len();
        let body = &text[body_start..];
        match body.find(']') {
            None => return Some(start),
            Some(close) => {
                let after = &body[close + 1..];
                if after.is_empty() {
                    return Some(start);
                }
                if after.starts_with(']') {
                    // Complete marker; keep scanning past its terminator.
                    from = body_start + close + 2;
                } else {
                    from = start + 1;
                }
            }
        }
    }
    None
}

/// Incremental marker matcher.
///
/// Consumes appended raw text and reaches the same verdict as [`reconcile`]
/// over the full accumulator, holding only a bounded amount of state instead
/// of rescanning on every fragment.
#[derive(Debug)]
pub struct MarkerWatch {
    state: WatchState,
}

#[derive(Debug)]
enum WatchState {
    /// Looking for the opener. `carry` holds the longest trailing piece that
    /// is a proper prefix of the opener.
    Seeking { carry: String },
    /// Opener seen; accumulating the capture until the `]]` terminator.
    Capturing { capture: String },
    Resolved(ReconciliationResult),
}

impl MarkerWatch {
    pub fn new() -> Self {
        Self {
            state: WatchState::Seeking {
                carry: String::new(),
            },
        }
    }

    /// Feed the next raw fragment.
    pub fn push(&mut self, fragment: &str) {
        let state = std::mem::replace(
            &mut self.state,
            WatchState::Seeking {
                carry: String::new(),
            },
        );
        match state {
            WatchState::Resolved(result) => self.state = WatchState::Resolved(result),
            WatchState::Seeking { carry } => {
                let mut buf = carry;
                buf.push_str(fragment);
                match buf.find(MARKER_OPENER) {
                    Some(at) => {
                        self.state = WatchState::Capturing {
                            capture: buf[at + MARKER_OPENER.len()..].to_string(),
                        };
                        self.resolve_capture();
                    }
                    None => {
                        self.state = WatchState::Seeking {
                            carry: opener_prefix_suffix(&buf).to_string(),
                        };
                    }
                }
            }
            WatchState::Capturing { mut capture } => {
                capture.push_str(fragment);
                self.state = WatchState::Capturing { capture };
                self.resolve_capture();
            }
        }
    }

    /// The current verdict; `Unknown` until a complete marker has streamed in.
    pub fn verdict(&self) -> ReconciliationResult {
        match &self.state {
            WatchState::Resolved(result) => result.clone(),
            _ => ReconciliationResult::Unknown,
        }
    }

    /// Check a capture-in-progress against the `]]` terminator, mirroring
    /// the `[^\]]*` capture rule: the first `]` either starts the terminator
    /// or invalidates this opener.
    fn resolve_capture(&mut self) {
        enum Outcome {
            Resolved(ReconciliationResult),
            DeadOpener(String),
        }
        let outcome = {
            let WatchState::Capturing { capture } = &self.state else {
                return;
            };
            let Some(close) = capture.find(']') else {
                return;
            };
            if close + 1 >= capture.len() {
                // Lone trailing `]`: the second half may still arrive.
                return;
            }
            if capture.as_bytes()[close + 1] == b']' {
                Outcome::Resolved(parse_capture(&capture[..close]))
            } else {
                Outcome::DeadOpener(format!("{MARKER_OPENER}{capture}"))
            }
        };
        match outcome {
            Outcome::Resolved(result) => self.state = WatchState::Resolved(result),
            Outcome::DeadOpener(dead) => {
                // A later opener inside the dead capture may still match, so
                // everything past the opener's first byte gets rescanned.
                self.state = WatchState::Seeking {
                    carry: String::new(),
                };
                self.push(&dead[1..]);
            }
        }
    }
}

impl Default for MarkerWatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Longest suffix of `text` that is a proper prefix of the marker opener.
fn opener_prefix_suffix(text: &str) -> &str {
    for len in (1..MARKER_OPENER.len()).rev() {
        let prefix = &MARKER_OPENER[..len];
        if text.ends_with(prefix) {
            return prefix;
        }
    }
    ""
}
