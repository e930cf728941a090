use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Change in a page's outgoing links between two writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDelta {
    pub source_page_id: String,
    pub added_targets: Vec<String>,
    pub removed_targets: Vec<String>,
}

impl LinkDelta {
    pub fn is_empty(&self) -> bool {
        self.added_targets.is_empty() && self.removed_targets.is_empty()
    }

    pub fn adds(&self, target: &str) -> bool {
        contains_ignore_case(&self.added_targets, target)
    }

    pub fn removes(&self, target: &str) -> bool {
        contains_ignore_case(&self.removed_targets, target)
    }
}

/// Change in a page's tags (or category) between two writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDelta {
    pub page_id: String,
    pub added_tags: Vec<String>,
    pub removed_tags: Vec<String>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.added_tags.is_empty() && self.removed_tags.is_empty()
    }

    pub fn adds(&self, slug: &str) -> bool {
        contains_ignore_case(&self.added_tags, slug)
    }

    pub fn removes(&self, slug: &str) -> bool {
        contains_ignore_case(&self.removed_tags, slug)
    }

    /// Every slug this delta touches, lowercased and without repeats.
    pub fn affected_slugs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.removed_tags
            .iter()
            .chain(self.added_tags.iter())
            .map(|t| t.to_lowercase())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

/// Set difference in both directions, compared case-insensitively.
///
/// Returns `(added, removed)` where `added = new - old` keeps the spelling
/// from `new` and `removed = old - new` keeps the spelling from `old`.
/// Duplicates within either side collapse to their first occurrence.
pub fn diff_ignore_case(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_lower: HashSet<String> = old.iter().map(|s| s.to_lowercase()).collect();
    let new_lower: HashSet<String> = new.iter().map(|s| s.to_lowercase()).collect();

    (
        distinct_ignore_case(new.iter().filter(|s| !old_lower.contains(&s.to_lowercase()))),
        distinct_ignore_case(old.iter().filter(|s| !new_lower.contains(&s.to_lowercase()))),
    )
}

/// Keep the first spelling of each case-insensitively distinct value.
pub fn distinct_ignore_case<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.to_lowercase()))
        .cloned()
        .collect()
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    values.iter().any(|v| v.to_lowercase() == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let (added, removed) = diff_ignore_case(&strings(&["A", "B"]), &strings(&["B", "C"]));
        assert_eq!(added, vec!["C"]);
        assert_eq!(removed, vec!["A"]);
    }

    #[test]
    fn diff_ignores_case_changes() {
        let (added, removed) = diff_ignore_case(&strings(&["Rust"]), &strings(&["rust"]));
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let links = strings(&["P2", "P3"]);
        let (added, removed) = diff_ignore_case(&links, &links);
        assert!(added.is_empty() && removed.is_empty());
    }

    #[test]
    fn diff_against_empty_old_adds_everything_once() {
        let (added, removed) = diff_ignore_case(&[], &strings(&["P2", "p2", "P3"]));
        assert_eq!(added, vec!["P2", "P3"]);
        assert!(removed.is_empty());
    }

    #[test]
    fn link_delta_membership_is_case_insensitive() {
        let delta = LinkDelta {
            source_page_id: "A".into(),
            added_targets: strings(&["Target"]),
            removed_targets: strings(&["Gone"]),
        };
        assert!(delta.adds("target"));
        assert!(delta.removes("GONE"));
        assert!(!delta.adds("gone"));
    }

    #[test]
    fn affected_slugs_are_lowercase_and_distinct() {
        let delta = TagDelta {
            page_id: "A".into(),
            added_tags: strings(&["Rust", "async"]),
            removed_tags: strings(&["rust"]),
        };
        assert_eq!(delta.affected_slugs(), vec!["rust", "async"]);
    }
}
