//! Semantic strategy: embed the query (or reuse a precomputed HyDE vector)
//! and rank by cosine similarity via `Store::search_vec`.

use std::sync::Arc;

use async_trait::async_trait;
use ctx_sys_core::error::Result;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::providers::Embedder;
use ctx_sys_core::store::{Store, VecSearchOptions};
use ctx_sys_core::strategy::{RankedHit, Strategy, StrategyOptions};
use tracing::warn;

pub struct SemanticStrategy {
    embedder: Arc<dyn Embedder>,
}

impl SemanticStrategy {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Strategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "vec"
    }

    async fn run(
        &self,
        store: &dyn Store,
        project: &ProjectHandle,
        query: &str,
        opts: &StrategyOptions,
    ) -> Result<Vec<RankedHit>> {
        let query_vec = match &opts.precomputed_query_vec {
            Some(v) => v.clone(),
            None => self.embedder.embed(query).await?,
        };

        let model_id = if opts.model_id.is_empty() {
            self.embedder.model_id()
        } else {
            &opts.model_id
        };

        let hits = store
            .search_vec(
                project,
                &query_vec,
                model_id,
                &VecSearchOptions { types: opts.types.clone(), limit: opts.limit },
            )
            .await?;

        let mut ranked = Vec::with_capacity(hits.len());
        for hit in hits {
            if hit.stale && opts.reembed_stale {
                if let Some(content) = &hit.entity.content {
                    match self.embedder.embed(content).await {
                        Ok(fresh) => {
                            store
                                .put_vector(project, hit.entity.id, model_id, &fresh, &hit.entity.hash)
                                .await?;
                        }
                        Err(e) => warn!(entity_id = %hit.entity.id, error = %e, "inline re-embed failed"),
                    }
                }
            }
            ranked.push(RankedHit { entity: hit.entity, score: hit.score, stale: hit.stale });
        }

        Ok(ranked)
    }
}
