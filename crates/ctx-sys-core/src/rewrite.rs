//! Query rewriting: gate, decompose, HyDE — per `SPEC_FULL.md` §4.4.
//!
//! Each stage degrades silently to the raw query on provider failure
//! (spec.md §7's degradation rule); none of them ever return an `Err`.

use crate::providers::{GenerateOptions, Generator, SummarizeOptions, Summarizer};

/// Built-in stop words used when the caller doesn't supply a list.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "please", "the", "a", "an", "is", "ok", "okay",
];

/// Pure heuristic: whitespace-only, or at most two tokens, all of which are
/// recognized stop words.
pub fn is_trivial_query(query: &str, stop_words: &[String]) -> bool {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return true;
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > 2 {
        return false;
    }
    tokens
        .iter()
        .all(|t| stop_words.iter().any(|s| s.eq_ignore_ascii_case(t)))
}

/// Returns `true` when the query should short-circuit to an empty context.
///
/// The heuristic alone decides whenever it can (empty, or more than two
/// tokens, or all-stop-words); only the remaining borderline case — one or
/// two tokens that aren't all recognized stop words — consults the injected
/// summarizer, avoiding a provider round-trip on every query.
pub async fn gate(query: &str, stop_words: &[String], summarizer: Option<&dyn Summarizer>) -> bool {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return true;
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > 2 {
        return false;
    }
    if tokens.iter().all(|t| stop_words.iter().any(|s| s.eq_ignore_ascii_case(t))) {
        return true;
    }
    let Some(summarizer) = summarizer else {
        return false;
    };
    let prompt = format!(
        "Is this query trivial conversational filler with no retrievable intent? \
         Answer with a single word, yes or no.\nQuery: {trimmed}"
    );
    match summarizer.summarize(&prompt, &SummarizeOptions::default()).await {
        Ok(answer) => answer.trim().to_ascii_lowercase().starts_with("yes"),
        Err(_) => false,
    }
}

/// Splits a compound query into at most 3 sub-queries via the generator.
/// Only engaged when the query has more than 8 (whitespace) tokens; shorter
/// queries and provider failures both fall back to `vec![query]`.
pub async fn decompose(query: &str, generator: &dyn Generator) -> Vec<String> {
    if query.split_whitespace().count() <= 8 {
        return vec![query.to_string()];
    }
    let prompt = format!(
        "Split the following request into at most 3 independent sub-questions, \
         one per line, with no numbering or commentary.\nRequest: {query}"
    );
    let result = generator.generate(&prompt, &GenerateOptions::default()).await;
    match result {
        Ok(text) => {
            let subs: Vec<String> = text
                .lines()
                .map(|line| line.trim().trim_start_matches(['-', '*']).trim().to_string())
                .filter(|line| !line.is_empty())
                .take(3)
                .collect();
            if subs.is_empty() {
                vec![query.to_string()]
            } else {
                subs
            }
        }
        Err(_) => vec![query.to_string()],
    }
}

/// Generates a hypothetical answer document whose embedding replaces the
/// raw query's for the semantic strategy. Falls back to the raw query text
/// on provider failure.
pub async fn hyde(query: &str, generator: &dyn Generator) -> String {
    let prompt = format!(
        "Write a short passage that plausibly answers the following question, \
         as if it were drawn directly from the relevant source material:\n{query}"
    );
    generator
        .generate(&prompt, &GenerateOptions::default())
        .await
        .unwrap_or_else(|_| query.to_string())
}

/// Whether `query` looks decision-shaped (a configurable keyword list),
/// consulted by the retrieval pipeline to fold the dedicated decision
/// index into the fused result set alongside the normal strategies.
pub fn is_decision_query(query: &str, decision_keywords: &[String]) -> bool {
    let lower = query.to_ascii_lowercase();
    decision_keywords.iter().any(|k| lower.contains(&k.to_ascii_lowercase()))
}
