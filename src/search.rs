//! `storyforge search`: semantic search over one project's chunks.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::pipeline::{build_retriever, open_store, validate_project_id};

pub async fn run_search(
    config: &Config,
    project_id: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    if let Err(msg) = validate_project_id(project_id) {
        bail!(msg);
    }
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let store = open_store(config).await?;
    let retriever = build_retriever(config, store)?;
    let limit = limit.unwrap_or(retriever.max_results());

    let results = retriever.retrieve_top(query, project_id, limit).await;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} #{}",
            i + 1,
            hit.score,
            hit.metadata.source,
            hit.metadata.chunk_index
        );
        println!("    indexed: {}", hit.metadata.processed_at);
        println!("    excerpt: \"{}\"", excerpt(&hit.text, 160));
        println!("    id: {}", hit.id);
        println!();
    }

    Ok(())
}

/// First `max_chars` characters on one line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("a\nb", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc…");
        assert_eq!(excerpt("ééééé", 2), "éé…");
    }
}
