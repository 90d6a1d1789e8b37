//! Keyword strategy: FTS-control-character escaping in front of
//! `Store::search_lex`. The LIKE fallback on a syntax error lives in
//! `SqliteStore` itself, since that's where the FTS engine's error
//! actually surfaces.

use async_trait::async_trait;
use ctx_sys_core::error::Result;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::{LexSearchOptions, Store};
use ctx_sys_core::strategy::{RankedHit, Strategy, StrategyOptions};

pub struct KeywordStrategy;

/// FTS5 reserves these as operators; a raw user query containing them
/// needs each token double-quoted to be treated as a literal phrase.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| {
            let cleaned: String = term.chars().filter(|c| *c != '"').collect();
            format!("\"{cleaned}\"")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Strategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "lex"
    }

    async fn run(
        &self,
        store: &dyn Store,
        project: &ProjectHandle,
        query: &str,
        opts: &StrategyOptions,
    ) -> Result<Vec<RankedHit>> {
        let escaped = escape_fts_query(query);
        let hits = store
            .search_lex(
                project,
                &escaped,
                &LexSearchOptions { types: opts.types.clone(), limit: opts.limit },
            )
            .await?;

        Ok(hits
            .into_iter()
            .map(|h| RankedHit { entity: h.entity, score: h.score, stale: h.stale })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_each_term_as_a_quoted_literal() {
        assert_eq!(escape_fts_query("foo bar"), "\"foo\" \"bar\"");
    }

    #[test]
    fn strips_embedded_quotes() {
        assert_eq!(escape_fts_query("foo\"bar"), "\"foobar\"");
    }
}
