use crate::error::Result;
use crate::page::{FrontMatter, PageContent};
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::LazyLock;

static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<h1\b[^>]*>(.*?)</h1>").unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<.*?>").unwrap());

/// Converts between stored page text (front matter + body) and its parts.
pub trait MarkdownService: Send + Sync {
    fn serialize(&self, front_matter: &FrontMatter, body: &str) -> Result<String>;
    fn deserialize(&self, markdown: &str) -> Result<PageContent>;
}

/// `---` delimited YAML header followed by a CommonMark body.
#[derive(Debug, Default, Clone)]
pub struct YamlMarkdown;

impl YamlMarkdown {
    pub fn new() -> Self {
        Self
    }
}

impl MarkdownService for YamlMarkdown {
    fn serialize(&self, front_matter: &FrontMatter, body: &str) -> Result<String> {
        let yaml = serde_yaml::to_string(front_matter)?;
        Ok(format!("---\n{}\n---\n\n{}", yaml.trim_end(), body))
    }

    fn deserialize(&self, markdown: &str) -> Result<PageContent> {
        let (front_matter, body) = match split_front_matter(markdown) {
            Some((yaml, body)) if !yaml.trim().is_empty() => {
                (serde_yaml::from_str::<FrontMatter>(yaml)?, body)
            }
            Some((_, body)) => (FrontMatter::default(), body),
            None => (FrontMatter::default(), markdown),
        };

        Ok(PageContent {
            html: render_html(body),
            body: body.to_string(),
            front_matter,
        })
    }
}

/// Split `---\n<yaml>\n---\n<body>` into its YAML and body halves.
/// Returns `None` when the text does not open with a header.
fn split_front_matter(markdown: &str) -> Option<(&str, &str)> {
    let rest = markdown.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    if let Some(body) = rest.strip_prefix("---") {
        return Some(("", trim_leading_newlines(skip_line(body))));
    }

    let close = rest.find("\n---")?;
    let yaml = &rest[..close];
    let after = &rest[close + "\n---".len()..];
    Some((yaml, trim_leading_newlines(skip_line(after))))
}

fn skip_line(text: &str) -> &str {
    match text.find('\n') {
        Some(idx) => &text[idx + 1..],
        None => "",
    }
}

fn trim_leading_newlines(text: &str) -> &str {
    text.trim_start_matches(['\r', '\n'])
}

pub fn render_html(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(body, options));
    out
}

/// Text of the first `<h1>` in rendered HTML.
pub fn first_heading(html: &str) -> Option<String> {
    H1_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| TAG_RE.replace_all(m.as_str(), "").trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Plain-text teaser of a page: the title heading text is removed, markup
/// stripped, and the result cut to `max_chars` characters with `...`
/// appended when the text is at least that long.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let without_title = match H1_RE.captures(html).and_then(|cap| cap.get(1)) {
        Some(title) if !title.as_str().is_empty() => html.replacen(title.as_str(), "", 1),
        _ => html.to_string(),
    };
    let text = TAG_RE.replace_all(&without_title, "");
    let text = text.trim();

    if text.chars().count() >= max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
