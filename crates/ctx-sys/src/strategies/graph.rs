//! Graph strategy: seed from a small keyword search, then BFS-expand
//! along the default relationship set with decay 0.6.

use async_trait::async_trait;
use ctx_sys_core::error::Result;
use ctx_sys_core::graph::bfs;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::{LexSearchOptions, Store};
use ctx_sys_core::strategy::{RankedHit, Strategy, StrategyOptions};

use super::lex::KeywordStrategy;

/// Hop-decay applied per `SPEC_FULL.md` §4.3.3's graph strategy.
const GRAPH_DECAY: f64 = 0.6;
/// How many keyword hits seed the traversal.
const SEED_LIMIT: usize = 5;

pub struct GraphStrategy;

#[async_trait]
impl Strategy for GraphStrategy {
    fn name(&self) -> &'static str {
        "graph"
    }

    async fn run(
        &self,
        store: &dyn Store,
        project: &ProjectHandle,
        query: &str,
        opts: &StrategyOptions,
    ) -> Result<Vec<RankedHit>> {
        let seeds = store
            .search_lex(project, query, &LexSearchOptions { types: opts.types.clone(), limit: SEED_LIMIT })
            .await
            .unwrap_or_default();

        if seeds.is_empty() {
            let keyword = KeywordStrategy;
            let hits = keyword.run(store, project, query, opts).await.unwrap_or_default();
            if hits.is_empty() {
                return Ok(Vec::new());
            }
            return self.expand_from(store, project, hits.into_iter().take(SEED_LIMIT).map(|h| (h.entity.id, h.score)).collect(), opts).await;
        }

        let seed_pairs: Vec<(uuid::Uuid, f64)> = seeds.iter().map(|s| (s.entity.id, s.score)).collect();
        self.expand_from(store, project, seed_pairs, opts).await
    }
}

impl GraphStrategy {
    async fn expand_from(
        &self,
        store: &dyn Store,
        project: &ProjectHandle,
        seeds: Vec<(uuid::Uuid, f64)>,
        opts: &StrategyOptions,
    ) -> Result<Vec<RankedHit>> {
        let scores = bfs(store, project, &seeds, opts.graph_depth, GRAPH_DECAY).await?;

        let mut ranked = Vec::new();
        for (id, score) in scores {
            let Some(entity) = store.get_entity(project, id).await? else {
                continue;
            };
            if let Some(types) = &opts.types {
                if !types.iter().any(|t| t == &entity.entity_type) {
                    continue;
                }
            }
            ranked.push(RankedHit { entity, score, stale: false });
        }

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        ranked.truncate(if opts.limit == 0 { 20 } else { opts.limit });
        Ok(ranked)
    }
}
