//! Relevance ranking of tools against free-text intents.
//!
//! Token based: text is lowercased, split on non-alphanumerics and camelCase
//! boundaries, stop words are dropped and a trailing plural `s` is stripped.

use super::schema::Tool;
use serde::Serialize;
use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "its", "me", "my", "of", "on", "or", "please", "the", "then", "this", "to", "with",
];

/// Relative weight of each field. Name matches must outweigh description matches.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub name: f64,
    pub description: f64,
    pub category: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name: 0.6,
            description: 0.3,
            category: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelevanceScore {
    pub tool: Tool,
    /// In `[0, 1]`.
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score every tool against `query`, highest first. Ties keep input order.
    pub fn score_tools(&self, tools: &[Tool], query: &str) -> Vec<RelevanceScore> {
        let query_tokens = token_set(query);
        let mut scores: Vec<RelevanceScore> = tools
            .iter()
            .map(|tool| RelevanceScore {
                tool: tool.clone(),
                score: self.score_tool(tool, &query_tokens),
            })
            .collect();
        // sort_by is stable, so equal scores stay in index order
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores
    }

    /// The `n` best tools. `n == 0` yields nothing; `n >= tools.len()` yields all, ranked.
    pub fn get_top_n_tools(&self, tools: &[Tool], query: &str, n: usize) -> Vec<Tool> {
        if n == 0 {
            return Vec::new();
        }
        self.score_tools(tools, query)
            .into_iter()
            .take(n)
            .map(|s| s.tool)
            .collect()
    }

    fn score_tool(&self, tool: &Tool, query: &HashSet<String>) -> f64 {
        if query.is_empty() {
            return 0.0;
        }
        let name = token_set(&tool.name);
        let description = token_set(&tool.description);
        let category = token_set(&tool.category);

        let name_score = if name.is_empty() {
            0.0
        } else {
            name.intersection(query).count() as f64 / name.len() as f64
        };
        let description_score = description.intersection(query).count() as f64 / query.len() as f64;
        let category_score = if category.intersection(query).next().is_some() {
            1.0
        } else {
            0.0
        };

        let w = self.weights;
        let total = w.name + w.description + w.category;
        if total <= 0.0 {
            return 0.0;
        }
        ((w.name * name_score + w.description * description_score + w.category * category_score)
            / total)
            .clamp(0.0, 1.0)
    }
}

/// Keep scores `>= threshold`, preserving order.
pub fn filter_by_threshold(scores: &[RelevanceScore], threshold: f64) -> Vec<RelevanceScore> {
    scores
        .iter()
        .filter(|s| s.score >= threshold)
        .cloned()
        .collect()
}

/// Token-set Jaccard similarity. Symmetric; identical strings score 1.
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let left = token_set(a);
    let right = token_set(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    shared / union
}

pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in split_words(text) {
        let lower = word.to_lowercase();
        if lower.is_empty() || STOP_WORDS.contains(&lower.as_str()) {
            continue;
        }
        tokens.push(stem(lower));
    }
    tokens
}

fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Split on non-alphanumerics and lower→upper camelCase transitions.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn stem(word: String) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word
    }
}
