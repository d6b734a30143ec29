//! `execlite tools`

use anyhow::{Context, Result};
use execlite_core::tool::{load_tools_from_dir, RelevanceScorer, Tool};
use serde_json::json;
use std::path::Path;

fn signature(tool: &Tool) -> String {
    tool.ordered_parameters()
        .iter()
        .map(|p| {
            if p.required {
                format!("{}: {}", p.name, p.param_type)
            } else {
                format!("{}?: {}", p.name, p.param_type)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ranked (tool, score) pairs; unranked listing keeps index order with score 1.
fn rank(tools: Vec<Tool>, query: Option<&str>, limit: usize) -> Vec<(Tool, f64)> {
    match query {
        Some(q) => RelevanceScorer::new()
            .score_tools(&tools, q)
            .into_iter()
            .filter(|s| s.score > 0.0)
            .take(limit)
            .map(|s| (s.tool, s.score))
            .collect(),
        None => tools.into_iter().take(limit).map(|t| (t, 1.0)).collect(),
    }
}

pub fn run(tools_dir: &Path, query: Option<&str>, limit: usize, json: bool) -> Result<()> {
    let tools = load_tools_from_dir(tools_dir)
        .with_context(|| format!("Failed to load tools from {}", tools_dir.display()))?;
    let ranked = rank(tools, query, limit);

    if json {
        let items: Vec<_> = ranked
            .iter()
            .map(|(tool, score)| json!({ "tool": tool, "score": score }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if ranked.is_empty() {
        println!("No matching tools.");
        return Ok(());
    }
    for (tool, score) in &ranked {
        if query.is_some() {
            println!("{:.2}  {}({})  [{}]", score, tool.name, signature(tool), tool.category);
        } else {
            println!("{}({})  [{}]", tool.name, signature(tool), tool.category);
        }
        if !tool.description.is_empty() {
            println!("      {}", tool.description);
        }
    }
    Ok(())
}
