use anyhow::Result;
use colored::Colorize;
use wiki_core::actor::{PageCounts, PageIndexEntry};
use wiki_core::WikiSystem;

pub async fn list(system: &WikiSystem, page_type: String, json: bool) -> Result<()> {
    let entries = system.catalog().get_by_type(&page_type).await?;
    print_entries(&entries, json)
}

pub async fn recent(system: &WikiSystem, pinned: bool, json: bool) -> Result<()> {
    let entries = system.catalog().get_recent_pages(pinned).await?;
    print_entries(&entries, json)
}

pub async fn count(system: &WikiSystem, json: bool) -> Result<()> {
    let counts = system.catalog().get_count().await?;
    if json {
        return super::print_json(&counts);
    }
    print!("{}", format_counts(&counts));
    Ok(())
}

pub async fn tag(system: &WikiSystem, slug: String, json: bool) -> Result<()> {
    let ids = system.tag(&slug).get_pages().await?;
    print_members(system, &ids, json).await
}

pub async fn category(system: &WikiSystem, slug: String, json: bool) -> Result<()> {
    let ids = system.category(&slug).get_pages().await?;
    print_members(system, &ids, json).await
}

/// Catalog entries for the listed ids, newest first. Ids the catalog does
/// not know are skipped.
async fn print_members(system: &WikiSystem, ids: &[String], json: bool) -> Result<()> {
    let catalog = system.catalog();
    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        match catalog.get_by_id(id).await? {
            Some(entry) => entries.push(entry),
            None => tracing::debug!("Page {} is tagged but not in the catalog", id),
        }
    }
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    print_entries(&entries, json)
}

fn print_entries(entries: &[PageIndexEntry], json: bool) -> Result<()> {
    if json {
        return super::print_json(&entries);
    }
    if entries.is_empty() {
        println!("{}", "No pages".dimmed());
        return Ok(());
    }
    for entry in entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &PageIndexEntry) -> String {
    let mut line = format!(
        "{}  {:<7}  {}",
        entry.updated_at.format("%Y-%m-%d"),
        entry.page_type.as_str(),
        entry.title.bold()
    );
    if entry.pinned {
        line.push_str(" *");
    }
    line.push_str(&format!("  {}", entry.id.dimmed()));
    if !entry.excerpt.is_empty() {
        line.push_str(&format!("\n    {}", entry.excerpt));
    }
    line
}

fn format_counts(counts: &PageCounts) -> String {
    format!(
        "notes:      {}\nposts:      {}\njournals:   {}\ncategories: {}\ntags:       {}\n",
        counts.note_count, counts.post_count, counts.journal_count, counts.category_count, counts.tag_count
    )
}
