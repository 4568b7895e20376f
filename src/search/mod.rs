//! In-document search.
//!
//! Matching is case-insensitive and works at line granularity: a match is
//! the index of a rendered line whose text contains the query.

use std::ops::Range;

use crate::document::RenderedDocument;

/// Search sub-state of the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Idle,
    /// The user is typing a query.
    Editing(String),
    /// A committed query with at least one match.
    Active {
        query: String,
        matches: Vec<usize>,
        /// Position in `matches` of the current match.
        index: usize,
    },
}

impl SearchMode {
    /// The query being typed or searched for.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Editing(query) | Self::Active { query, .. } => Some(query),
        }
    }

    pub const fn is_editing(&self) -> bool {
        matches!(self, Self::Editing(_))
    }

    pub fn matches(&self) -> &[usize] {
        match self {
            Self::Active { matches, .. } => matches,
            _ => &[],
        }
    }

    /// 1-based current match and total, for the status bar.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Active { matches, index, .. } => Some((index + 1, matches.len())),
            _ => None,
        }
    }

    /// Line of the current match.
    pub fn current_line(&self) -> Option<usize> {
        match self {
            Self::Active { matches, index, .. } => matches.get(*index).copied(),
            _ => None,
        }
    }
}

/// Indices of lines whose text contains `query`, ignoring case.
pub fn find_matches(doc: &RenderedDocument, query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    doc.lines()
        .iter()
        .enumerate()
        .filter(|(_, line)| line.text().to_lowercase().contains(&needle))
        .map(|(idx, _)| idx)
        .collect()
}

/// Index into `matches` of the first match at or below `line`, wrapping to 0.
pub fn first_match_from(matches: &[usize], line: usize) -> usize {
    let idx = matches.partition_point(|&m| m < line);
    if idx >= matches.len() { 0 } else { idx }
}

/// Byte ranges of `query` within `text`, ignoring ASCII case.
pub fn match_ranges(text: &str, query: &str) -> Vec<Range<usize>> {
    let needle = query.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let haystack = text.to_ascii_lowercase();
    let mut ranges = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = haystack[cursor..].find(&needle) {
        let start = cursor + rel;
        let end = start + needle.len();
        ranges.push(start..end);
        cursor = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LayoutContext, parse_and_layout};

    fn doc(source: &str) -> RenderedDocument {
        parse_and_layout(source, 80, &LayoutContext::default())
    }

    #[test]
    fn test_find_matches_is_case_insensitive() {
        let d = doc("Alpha\n\nbeta ALPHA\n\ngamma\n");
        assert_eq!(find_matches(&d, "alpha"), vec![0, 2]);
    }

    #[test]
    fn test_find_matches_empty_query() {
        let d = doc("anything");
        assert!(find_matches(&d, "   ").is_empty());
    }

    #[test]
    fn test_first_match_from_wraps() {
        let matches = [2, 10, 30];
        assert_eq!(first_match_from(&matches, 0), 0);
        assert_eq!(first_match_from(&matches, 10), 1);
        assert_eq!(first_match_from(&matches, 11), 2);
        assert_eq!(first_match_from(&matches, 31), 0);
    }

    #[test]
    fn test_match_ranges_finds_all_occurrences() {
        assert_eq!(match_ranges("Foo foo FOO", "foo"), vec![0..3, 4..7, 8..11]);
        assert!(match_ranges("abc", "").is_empty());
    }

    #[test]
    fn test_search_mode_accessors() {
        let mode = SearchMode::Active {
            query: "x".to_string(),
            matches: vec![4, 9],
            index: 1,
        };
        assert_eq!(mode.query(), Some("x"));
        assert_eq!(mode.position(), Some((2, 2)));
        assert_eq!(mode.current_line(), Some(9));
        assert_eq!(SearchMode::Editing("q".to_string()).matches(), &[] as &[usize]);
        assert_eq!(SearchMode::Idle.query(), None);
    }
}
