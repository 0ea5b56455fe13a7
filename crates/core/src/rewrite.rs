//! In-place task rewriting driven by backend-supplied dynamic filters.
//!
//! The backend marks substitutable keywords in the task text and offers
//! candidate replacements for each. `highlight` splits the task into plain
//! and interactive segments for rendering; `replace` produces the rewritten
//! task for a relaunch. Pure text transformation, no network.

use std::collections::BTreeMap;

/// Filter keyword → ordered candidate replacements. Supplied once at run
/// start and immutable for the run's lifetime.
pub type DynamicFilterMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain task text.
    Text(String),
    /// A span claimed by a filter keyword; `text` is the original slice,
    /// which may differ from `key` in case.
    Filter { key: String, text: String },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Filter { text, .. } => text,
        }
    }
}

/// Split `task` into segments, binding each filter keyword to the spans it
/// matches. Matching is case-insensitive over all occurrences; overlaps
/// resolve to the earliest start, then the longest match at that start, and
/// a claimed span is never claimed again. Concatenating all segment texts
/// reproduces `task` exactly.
pub fn highlight(task: &str, filters: &DynamicFilterMap) -> Vec<Segment> {
    let mut matches: Vec<(usize, usize, &str)> = Vec::new();
    for key in filters.keys() {
        if key.is_empty() {
            continue;
        }
        let mut from = 0;
        while let Some((start, end)) = find_ci(task, key, from) {
            matches.push((start, end, key));
            from = next_char_boundary(task, start);
        }
    }

    // Earliest start wins; at equal starts the longest match wins.
    matches.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut claimed: Vec<(usize, usize, &str)> = Vec::new();
    for (start, end, key) in matches {
        let overlaps = claimed
            .iter()
            .any(|&(s, e, _)| start < e && end > s);
        if !overlaps {
            claimed.push((start, end, key));
        }
    }
    claimed.sort_by_key(|&(start, _, _)| start);

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end, key) in claimed {
        if start > cursor {
            segments.push(Segment::Text(task[cursor..start].to_string()));
        }
        segments.push(Segment::Filter {
            key: key.to_string(),
            text: task[start..end].to_string(),
        });
        cursor = end;
    }
    if cursor < task.len() {
        segments.push(Segment::Text(task[cursor..].to_string()));
    }
    segments
}

/// Substitute the first case-insensitive occurrence of `key` with `option`.
/// Zero occurrences is a no-op.
pub fn replace(task: &str, key: &str, option: &str) -> String {
    if key.is_empty() {
        return task.to_string();
    }
    match find_ci(task, key, 0) {
        Some((start, end)) => format!("{}{}{}", &task[..start], option, &task[end..]),
        None => task.to_string(),
    }
}

/// Case-insensitive substring search from byte offset `from`, walking char
/// boundaries so offsets stay valid for non-ASCII text.
fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    for (start, _) in haystack.char_indices().filter(|&(i, _)| i >= from) {
        if let Some(end) = match_at(haystack, needle, start) {
            return Some((start, end));
        }
    }
    None
}

/// If `needle` matches `haystack` at byte offset `start`, the end offset of
/// the matched span.
fn match_at(haystack: &str, needle: &str, start: usize) -> Option<usize> {
    let mut hay = haystack[start..].char_indices();
    let mut end = start;
    for needle_char in needle.chars() {
        let (offset, hay_char) = hay.next()?;
        if !chars_eq_ci(hay_char, needle_char) {
            return None;
        }
        end = start + offset + hay_char.len_utf8();
    }
    Some(end)
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map(|c| index + c.len_utf8())
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(keys: &[&str]) -> DynamicFilterMap {
        keys.iter()
            .map(|k| (k.to_string(), vec!["alt".to_string()]))
            .collect()
    }

    fn concat(segments: &[Segment]) -> String {
        segments.iter().map(|s| s.text()).collect()
    }

    #[test]
    fn segments_concatenate_to_original_task() {
        let task = "Find me the cheapest Laptop from Dell under INR 35000";
        let segments = highlight(task, &filters(&["laptop", "dell"]));
        assert_eq!(concat(&segments), task);

        let spans: Vec<_> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Filter { key, text } => Some((key.as_str(), text.as_str())),
                Segment::Text(_) => None,
            })
            .collect();
        assert_eq!(spans, vec![("laptop", "Laptop"), ("dell", "Dell")]);
    }

    #[test]
    fn no_filters_yields_single_text_segment() {
        let task = "compare formal shirts";
        let segments = highlight(task, &DynamicFilterMap::new());
        assert_eq!(segments, vec![Segment::Text(task.to_string())]);
    }

    #[test]
    fn longest_match_wins_at_equal_start() {
        let task = "wireless earbuds under 2000";
        let segments = highlight(task, &filters(&["wireless", "wireless earbuds"]));
        assert_eq!(concat(&segments), task);
        assert!(segments.iter().any(|s| matches!(
            s,
            Segment::Filter { key, .. } if key == "wireless earbuds"
        )));
        assert!(!segments.iter().any(|s| matches!(
            s,
            Segment::Filter { key, .. } if key == "wireless"
        )));
    }

    #[test]
    fn claimed_spans_are_not_reclaimed() {
        // "laptop stand" claims the span first; the overlapping "stand"
        // occurrence inside it must not produce a second segment, while the
        // later free-standing "stand" still matches.
        let task = "buy a laptop stand and a stand fan";
        let segments = highlight(task, &filters(&["laptop stand", "stand"]));
        assert_eq!(concat(&segments), task);

        let spans: Vec<_> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Filter { key, text } => Some((key.as_str(), text.as_str())),
                Segment::Text(_) => None,
            })
            .collect();
        assert_eq!(spans, vec![("laptop stand", "laptop stand"), ("stand", "stand")]);
    }

    #[test]
    fn every_occurrence_is_highlighted() {
        let task = "red shoes or blue shoes";
        let segments = highlight(task, &filters(&["shoes"]));
        let count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Filter { .. }))
            .count();
        assert_eq!(count, 2);
        assert_eq!(concat(&segments), task);
    }

    #[test]
    fn highlight_handles_non_ascii_text() {
        let task = "find a café LAPTOP nearby";
        let segments = highlight(task, &filters(&["laptop"]));
        assert_eq!(concat(&segments), task);
        assert!(segments.iter().any(|s| matches!(
            s,
            Segment::Filter { text, .. } if text == "LAPTOP"
        )));
    }

    #[test]
    fn replace_substitutes_first_occurrence_in_place() {
        let task = "find a Laptop, maybe another laptop";
        let replaced = replace(task, "laptop", "tablet");
        assert_eq!(replaced, "find a tablet, maybe another laptop");

        // The option lands exactly where the key matched.
        let key_pos = task.to_lowercase().find("laptop").unwrap();
        assert!(replaced[key_pos..].starts_with("tablet"));
    }

    #[test]
    fn replace_without_occurrence_is_a_no_op() {
        let task = "find wireless earbuds";
        assert_eq!(replace(task, "laptop", "tablet"), task);
        assert_eq!(replace(task, "", "tablet"), task);
    }
}
