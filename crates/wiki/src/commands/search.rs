use anyhow::Result;
use colored::Colorize;
use wiki_core::WikiSystem;

pub async fn execute(system: &WikiSystem, query: String, limit: usize, json: bool) -> Result<()> {
    let results = system.search(&query, limit).await?;
    if json {
        return super::print_json(&results);
    }
    if results.is_empty() {
        println!("{}", format!("No results for \"{}\"", query).dimmed());
        return Ok(());
    }
    for result in &results {
        println!("{} {}", result.title.bold(), format!("({:.2})", result.score).dimmed());
        println!("    {}", result.page_id.dimmed());
        if !result.snippet.is_empty() {
            println!("    {}", result.snippet);
        }
    }
    Ok(())
}
