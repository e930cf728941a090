use crate::delta::distinct_ignore_case;
use crate::error::WikiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageType {
    #[default]
    Note,
    Post,
    Journal,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Note => "note",
            PageType::Post => "post",
            PageType::Journal => "journal",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "note" => Ok(PageType::Note),
            "post" => Ok(PageType::Post),
            "journal" => Ok(PageType::Journal),
            other => Err(WikiError::InvalidPageType(other.to_string())),
        }
    }
}

// Stored front matter may spell the type in any case ("Note", "JOURNAL").
impl<'de> Deserialize<'de> for PageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for PageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Page metadata carried in the YAML header of every stored page.
///
/// `permanent_id` is the page's only stable identity; titles and the storage
/// key derived from them may change between writes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrontMatter {
    pub permanent_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// User-defined metadata with no fixed schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<HashMap<String, serde_json::Value>>,
}

impl FrontMatter {
    pub fn new(permanent_id: impl Into<String>, page_type: PageType) -> Self {
        Self {
            permanent_id: permanent_id.into(),
            page_type,
            ..Self::default()
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.unwrap_or(false)
    }

    /// Tags trimmed, without blanks, deduplicated case-insensitively.
    pub fn normalized_tags(&self) -> Vec<String> {
        self.tags.as_deref().map(normalize_tags).unwrap_or_default()
    }

    /// The category, or `None` when missing or blank.
    pub fn normalized_category(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// A page as held by its actor: metadata, raw markdown body and rendered HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub front_matter: FrontMatter,
    pub body: String,
    pub html: String,
}

pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let trimmed: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    distinct_ignore_case(&trimmed)
}

/// Split a comma-separated tag field, as typed into a compose form.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let tags: Vec<String> = raw.split(',').map(str::to_string).collect();
    normalize_tags(&tags)
}

/// URL-friendly form of a title: letters, digits, spaces and hyphens are
/// kept, the rest dropped, then lowercased with spaces turned into hyphens.
pub fn slugify(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect::<String>()
        .to_lowercase()
        .replace(' ', "-")
}

/// Storage key for a page title, e.g. `"Hello World"` -> `"hello-world.md"`.
pub fn storage_key(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}.md", slugify(UNTITLED))
    } else {
        format!("{}.md", slug)
    }
}

/// Storage key with a disambiguating suffix, e.g. `"hello-world-x7Kp2a.md"`.
pub fn suffixed_storage_key(title: &str, suffix: &str) -> String {
    let base = storage_key(title);
    let stem = base.strip_suffix(".md").unwrap_or(&base);
    format!("{}-{}.md", stem, suffix)
}
