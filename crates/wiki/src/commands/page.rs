use crate::cli::PageArgs;
use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;
use wiki_core::actor::PageIndexEntry;
use wiki_core::page::{parse_tag_list, FrontMatter, PageType};
use wiki_core::WikiSystem;

async fn read_body(args: &PageArgs) -> Result<Option<String>> {
    if let Some(body) = &args.body {
        return Ok(Some(body.clone()));
    }
    match &args.file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(text))
        }
        None => Ok(None),
    }
}

/// Overlay the fields given on the command line.
fn apply_args(front_matter: &mut FrontMatter, args: &PageArgs) {
    if let Some(page_type) = args.page_type {
        front_matter.page_type = page_type;
    }
    if let Some(category) = &args.category {
        front_matter.category = Some(category.clone());
    }
    if let Some(tags) = &args.tags {
        front_matter.tags = Some(parse_tag_list(tags));
    }
    if let Some(pinned) = args.pinned {
        front_matter.pinned = Some(pinned);
    }
}

pub async fn create(system: &WikiSystem, title: String, args: PageArgs, json: bool) -> Result<()> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut front_matter = FrontMatter::new(id.clone(), PageType::default());
    front_matter.title = title;
    front_matter.created_at = Some(now);
    front_matter.updated_at = Some(now);
    apply_args(&mut front_matter, &args);
    let body = read_body(&args).await?.unwrap_or_default();

    system
        .page(&id)
        .create_page(front_matter, body)
        .await
        .with_context(|| format!("Failed to create page {}", id))?;

    if json {
        return super::print_json(&serde_json::json!({ "id": id }));
    }
    println!("{}", id);
    Ok(())
}

/// Front matter for an update: the stored header when the page has one,
/// otherwise rebuilt from its catalog entry.
fn base_front_matter(entry: &PageIndexEntry, stored: Option<FrontMatter>) -> FrontMatter {
    stored.unwrap_or_else(|| FrontMatter {
        permanent_id: entry.id.clone(),
        title: entry.title.clone(),
        page_type: entry.page_type,
        category: entry.category.clone(),
        tags: Some(entry.tags.clone()),
        pinned: Some(entry.pinned),
        ..FrontMatter::default()
    })
}

pub async fn update(
    system: &WikiSystem,
    id: String,
    title: Option<String>,
    args: PageArgs,
    json: bool,
) -> Result<()> {
    let entry = system
        .catalog()
        .get_by_id(&id)
        .await?
        .with_context(|| format!("Page {} not found", id))?;

    let stored = match system.page(&id).get_content().await? {
        Some(text) => Some(system.markdown().deserialize(&text)?),
        None => None,
    };
    let (stored_front_matter, stored_body) = match stored {
        Some(content) => (Some(content.front_matter), Some(content.body)),
        None => (None, None),
    };

    let mut front_matter = base_front_matter(&entry, stored_front_matter);
    if let Some(title) = title {
        front_matter.title = title;
    }
    apply_args(&mut front_matter, &args);
    front_matter.created_at = Some(entry.created_at);
    front_matter.updated_at = Some(Utc::now());

    let body = match read_body(&args).await? {
        Some(body) => body,
        None => stored_body.unwrap_or_default(),
    };

    system
        .page(&id)
        .update_page(front_matter, body)
        .await
        .with_context(|| format!("Failed to update page {}", id))?;

    if json {
        return super::print_json(&serde_json::json!({ "id": id }));
    }
    println!("Updated {}", id);
    Ok(())
}

pub async fn show(system: &WikiSystem, id: String, json: bool) -> Result<()> {
    let text = system
        .page(&id)
        .get_content()
        .await?
        .with_context(|| format!("Page {} has no stored content", id))?;

    if json {
        return super::print_json(&serde_json::json!({ "id": id, "markdown": text }));
    }
    println!("{}", text);
    Ok(())
}
