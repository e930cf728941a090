use anyhow::Result;
use colored::Colorize;
use wiki_core::actor::GraphNeighbors;
use wiki_core::WikiSystem;

/// `neighbors`: backlinks and forward links of one page.
pub async fn neighbors(system: &WikiSystem, id: String, json: bool) -> Result<()> {
    let neighbors = system.graph(&id).get_neighbors().await?;
    if json {
        return super::print_json(&neighbors);
    }

    let incoming = describe_pages(system, &neighbors.incoming).await?;
    print!("{}", format_neighbors(&neighbors.center, &incoming, &neighbors.outgoing));
    Ok(())
}

/// `backlinks`: pages linking to a target, which need not exist.
pub async fn backlinks(system: &WikiSystem, target: String, json: bool) -> Result<()> {
    let sources = system.backlinks(&target).get_backlinks().await?;
    if json {
        return super::print_json(&GraphNeighbors {
            center: target,
            outgoing: Vec::new(),
            incoming: sources,
        });
    }

    println!("{}", format!("Backlinks to {}:", target).bold());
    print!("{}", format_list(&describe_pages(system, &sources).await?));
    Ok(())
}

/// Label page ids with their catalog titles; ids missing from the catalog
/// are shown bare.
async fn describe_pages(system: &WikiSystem, ids: &[String]) -> Result<Vec<String>> {
    let catalog = system.catalog();
    let mut labels = Vec::with_capacity(ids.len());
    for id in ids {
        let label = match catalog.get_by_id(id).await? {
            Some(entry) => format!("{} ({})", entry.title, id),
            None => id.clone(),
        };
        labels.push(label);
    }
    labels.sort();
    Ok(labels)
}

fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)\n".to_string();
    }
    items.iter().map(|item| format!("- {}\n", item)).collect()
}

fn format_neighbors(center: &str, incoming: &[String], outgoing: &[String]) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n\n", center.bold()));
    output.push_str("Backlinks (pages linking to this):\n");
    output.push_str(&format_list(incoming));
    output.push_str("\nForward links (pages this links to):\n");
    output.push_str(&format_list(outgoing));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiki_core::page::FrontMatter;

    #[test]
    fn empty_sections_say_none() {
        colored::control::set_override(false);
        let text = format_neighbors("A", &[], &[]);
        assert_eq!(
            text,
            "A\n\nBacklinks (pages linking to this):\n- (none)\n\nForward links (pages this links to):\n- (none)\n"
        );
    }

    #[test]
    fn each_link_gets_a_bullet() {
        colored::control::set_override(false);
        let text = format_neighbors("A", &["Beta (b)".into()], &["C".into(), "D".into()]);
        assert!(text.contains("linking to this):\n- Beta (b)\n"));
        assert!(text.contains("links to):\n- C\n- D\n"));
    }

    #[tokio::test]
    async fn sources_are_labelled_with_titles() {
        let system = WikiSystem::in_memory().unwrap();
        let fm = FrontMatter {
            title: "Linker".into(),
            ..FrontMatter::default()
        };
        system.page("src").create_page(fm, "[[Target]]").await.unwrap();

        let sources = system.backlinks("target").get_backlinks().await.unwrap();
        let labels = describe_pages(&system, &sources).await.unwrap();
        assert_eq!(labels, vec!["Linker (src)".to_string()]);

        let unknown = describe_pages(&system, &["ghost".to_string()]).await.unwrap();
        assert_eq!(unknown, vec!["ghost".to_string()]);
    }
}
