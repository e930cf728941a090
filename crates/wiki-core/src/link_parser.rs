use crate::delta::distinct_ignore_case;
use regex::Regex;
use std::sync::LazyLock;

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n]*\n.*?```|~~~[^\n]*\n.*?~~~").unwrap()
});

static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]*`").unwrap());

/// Byte ranges covered by fenced code blocks or inline code spans.
fn code_ranges(markdown: &str) -> Vec<(usize, usize)> {
    FENCED_CODE_RE
        .find_iter(markdown)
        .chain(INLINE_CODE_RE.find_iter(markdown))
        .map(|m| (m.start(), m.end()))
        .collect()
}

fn inside(offset: usize, ranges: &[(usize, usize)]) -> bool {
    ranges
        .iter()
        .any(|&(start, end)| offset >= start && offset < end)
}

/// The target portion of a wikilink body: `Target` from `Target#Section|Display`.
fn link_target(content: &str) -> Option<&str> {
    let end = content
        .find('|')
        .unwrap_or(content.len())
        .min(content.find('#').unwrap_or(content.len()));
    let target = content[..end].trim();
    (!target.is_empty()).then_some(target)
}

/// Extract wikilink targets from markdown in document order.
///
/// Handles `[[target]]`, `[[target|display]]` and `[[target#anchor]]`; only
/// the target takes part. Links inside fenced or inline code are skipped.
/// Repeats are kept, see [`outgoing_links`] for the deduplicated set.
pub fn extract_wikilinks(markdown: &str) -> Vec<String> {
    let excluded = code_ranges(markdown);

    WIKILINK_RE
        .captures_iter(markdown)
        .filter(|cap| {
            cap.get(0)
                .map(|m| !inside(m.start(), &excluded))
                .unwrap_or(false)
        })
        .filter_map(|cap| cap.get(1).and_then(|c| link_target(c.as_str())))
        .map(str::to_string)
        .collect()
}

/// The outgoing-link set of a page body. Targets that differ only by case
/// collapse to the first spelling seen.
pub fn outgoing_links(markdown: &str) -> Vec<String> {
    distinct_ignore_case(&extract_wikilinks(markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_wikilink() {
        assert_eq!(extract_wikilinks("[[Note]]"), vec!["Note"]);
    }

    #[test]
    fn returns_empty_for_no_links() {
        assert_eq!(extract_wikilinks("plain text"), Vec::<String>::new());
    }

    #[test]
    fn extracts_multiple_wikilinks_in_order() {
        assert_eq!(extract_wikilinks("[[One]] and [[Two]]"), vec!["One", "Two"]);
    }

    #[test]
    fn strips_display_text() {
        assert_eq!(extract_wikilinks("[[Note|Display Text]]"), vec!["Note"]);
    }

    #[test]
    fn strips_anchor_and_display() {
        assert_eq!(extract_wikilinks("[[Note#Section|Display]]"), vec!["Note"]);
    }

    #[test]
    fn ignores_empty_and_blank_targets() {
        assert!(extract_wikilinks("[[]] [[   ]] [[|alias]]").is_empty());
    }

    #[test]
    fn ignores_links_in_code() {
        let markdown = "```\n[[CodeLink]]\n```\nSee `[[Fake]]` and [[RealLink]]";
        assert_eq!(extract_wikilinks(markdown), vec!["RealLink"]);
    }

    #[test]
    fn trims_whitespace_around_target() {
        assert_eq!(extract_wikilinks("[[  Spaced Out  |x]]"), vec!["Spaced Out"]);
    }

    #[test]
    fn outgoing_links_collapse_duplicates_and_display_variants() {
        let markdown = "# Hello\n\nSee [[P2]] and [[P2|Page Two]]";
        assert_eq!(outgoing_links(markdown), vec!["P2"]);
    }

    #[test]
    fn outgoing_links_collapse_case_variants() {
        assert_eq!(outgoing_links("[[Rust]] [[rust]] [[Go]]"), vec!["Rust", "Go"]);
    }
}
