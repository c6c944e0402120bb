//! `storyforge generate`: draft user stories for a project.

use anyhow::{bail, Result};

use storyforge_core::models::GeneratedStory;

use crate::config::Config;
use crate::pipeline::{build_pipeline, open_store, validate_project_id};

pub async fn run_generate(
    config: &Config,
    project_id: &str,
    project_context: &str,
    requirements: &str,
    json: bool,
) -> Result<()> {
    if let Err(msg) = validate_project_id(project_id) {
        bail!(msg);
    }
    if requirements.trim().is_empty() {
        bail!("requirements must not be empty");
    }

    let store = open_store(config).await?;
    let pipeline = build_pipeline(config, store)?;
    let stories = pipeline
        .generate_stories(project_id, project_context, requirements)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stories)?);
        return Ok(());
    }

    if stories.is_empty() {
        println!("The model returned no parseable user stories.");
        return Ok(());
    }

    println!("Generated {} user stories\n", stories.len());
    for (i, story) in stories.iter().enumerate() {
        print!("{}", render_story(i + 1, story));
    }
    Ok(())
}

fn render_story(n: usize, story: &GeneratedStory) -> String {
    let mut out = format!("{}. {}\n", n, story.title);
    if let Some(narrative) = &story.narrative {
        out.push_str(&format!("    {}\n", narrative));
    }
    if let Some(priority) = story.priority {
        out.push_str(&format!("    priority: {}\n", priority));
    }
    if !story.acceptance_criteria.is_empty() {
        out.push_str("    acceptance criteria:\n");
        for criterion in &story.acceptance_criteria {
            out.push_str(&format!("      - {}\n", criterion));
        }
    }
    out.push('\n');
    out
}
