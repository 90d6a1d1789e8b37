//! `ContextEngine`: the facade wiring rewrite -> strategies -> fusion ->
//! expansion -> assembly into the single `query_context` operation every
//! transport (CLI, MCP, HTTP) calls.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use ctx_sys_core::api::{QueryContextOptions, QueryContextResult, SourceEntry};
use ctx_sys_core::assembler::{assemble, AssembleOptions};
use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::fusion::{filter_by_min_score, reciprocal_rank_fusion, FusedHit};
use ctx_sys_core::graph::{expand_top_n, DEFAULT_EXPAND_RELATIONSHIPS};
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::providers::{Embedder, Generator, Summarizer};
use ctx_sys_core::render::render;
use ctx_sys_core::rewrite::{decompose, gate, hyde, is_decision_query};
use ctx_sys_core::store::Store;
use ctx_sys_core::strategy::{RankedHit, Strategy, StrategyOptions};
use ctx_sys_core::tokenizer::{CharsPerFourTokenizer, Tokenizer};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::strategies::graph::GraphStrategy;
use crate::strategies::lex::KeywordStrategy;
use crate::strategies::vec::SemanticStrategy;

/// How many top-fused entities seed the expansion pass.
const EXPAND_SEED_COUNT: usize = 10;
/// How many decisions the dedicated index contributes per sub-query.
const DECISION_LIMIT: usize = 10;
/// Weight given to the decision index's fused list when a query looks
/// decision-shaped, chosen to outrank the default strategy weights.
const DECISION_WEIGHT: f64 = 1.5;

pub struct ContextEngine {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    generator: Option<Arc<dyn Generator>>,
    stop_words: Vec<String>,
    weights: std::collections::HashMap<String, f64>,
    decision_keywords: Vec<String>,
}

impl ContextEngine {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        summarizer: Option<Arc<dyn Summarizer>>,
        generator: Option<Arc<dyn Generator>>,
        weights: std::collections::HashMap<String, f64>,
        decision_keywords: Vec<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            summarizer,
            generator,
            stop_words: ctx_sys_core::rewrite::DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            weights,
            decision_keywords,
        }
    }

    async fn cancellable<T>(token: &CancellationToken, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            value = fut => Ok(value),
            _ = token.cancelled() => Err(Error::Cancelled),
        }
    }

    fn strategy_for(&self, name: &str) -> Option<Box<dyn Strategy>> {
        match name {
            "lex" => Some(Box::new(KeywordStrategy)),
            "vec" => Some(Box::new(SemanticStrategy::new(self.embedder.clone()))),
            "graph" => Some(Box::new(GraphStrategy)),
            _ => None,
        }
    }

    pub async fn query_context(
        &self,
        project: &ProjectHandle,
        opts: QueryContextOptions,
        token: CancellationToken,
    ) -> Result<QueryContextResult> {
        if opts.query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        if opts.max_tokens == 0 {
            return Err(Error::InvalidInput("max_tokens must be > 0".to_string()));
        }
        if !Self::cancellable(&token, self.store.project_exists(project)).await?? {
            return Err(Error::InvalidInput(format!("unknown project '{}'", project.id())));
        }

        if opts.gate {
            let trivial = Self::cancellable(
                &token,
                gate(&opts.query, &self.stop_words, self.summarizer.as_ref().map(|s| s.as_ref() as &dyn Summarizer)),
            )
            .await?;
            if trivial {
                return Ok(QueryContextResult {
                    context: String::new(),
                    sources: Vec::new(),
                    confidence: 0.0,
                    tokens_used: 0,
                    truncated: false,
                });
            }
        }

        let sub_queries = if opts.decompose {
            match &self.generator {
                Some(generator) => {
                    Self::cancellable(&token, decompose(&opts.query, generator.as_ref())).await?
                }
                None => vec![opts.query.clone()],
            }
        } else {
            vec![opts.query.clone()]
        };

        let precomputed_query_vec = if opts.hyde {
            match &self.generator {
                Some(generator) => {
                    let doc = Self::cancellable(&token, hyde(&opts.query, generator.as_ref())).await?;
                    match Self::cancellable(&token, self.embedder.embed(&doc)).await? {
                        Ok(vec) => Some(vec),
                        Err(Error::Cancelled) => return Err(Error::Cancelled),
                        Err(e) => {
                            warn!(error = %e, "HyDE embed failed, falling back to raw query");
                            None
                        }
                    }
                }
                None => None,
            }
        } else {
            None
        };

        let mut lists: Vec<(&str, f64, Vec<ctx_sys_core::strategy::RankedHit>)> = Vec::new();
        let mut degradation_notes: Vec<String> = Vec::new();

        for sub_query in &sub_queries {
            for strategy_name in &opts.strategies {
                let Some(strategy) = self.strategy_for(strategy_name) else {
                    continue;
                };
                let strategy_opts = StrategyOptions {
                    types: opts.include_types.clone(),
                    limit: 20,
                    model_id: self.embedder.model_id().to_string(),
                    graph_depth: 2,
                    reembed_stale: false,
                    precomputed_query_vec: precomputed_query_vec.clone(),
                };
                let weight = self.weights.get(strategy_name.as_str()).copied().unwrap_or(1.0);
                let outcome = Self::cancellable(
                    &token,
                    strategy.run(self.store.as_ref(), project, sub_query, &strategy_opts),
                )
                .await?;
                match outcome {
                    Ok(hits) => lists.push((strategy_name.as_str(), weight, hits)),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        warn!(strategy = %strategy_name, error = %e, "strategy failed, running with remaining strategies");
                        degradation_notes.push(format!("{strategy_name} strategy unavailable: {e}"));
                    }
                }
            }
        }

        for sub_query in &sub_queries {
            if !is_decision_query(sub_query, &self.decision_keywords) {
                continue;
            }
            let outcome =
                Self::cancellable(&token, self.store.search_decisions(project, sub_query, DECISION_LIMIT)).await?;
            match outcome {
                Ok(decisions) => {
                    let mut hits = Vec::with_capacity(decisions.len());
                    let count = decisions.len().max(1);
                    for (rank, decision) in decisions.into_iter().enumerate() {
                        let entity_outcome =
                            Self::cancellable(&token, self.store.get_entity(project, decision.entity_id)).await?;
                        match entity_outcome {
                            Ok(Some(entity)) => {
                                let score = 1.0 - (rank as f64 / count as f64) * 0.99;
                                hits.push(RankedHit { entity, score, stale: false });
                            }
                            Ok(None) => {}
                            Err(Error::Cancelled) => return Err(Error::Cancelled),
                            Err(e) => {
                                degradation_notes.push(format!("decision index unavailable: {e}"));
                                break;
                            }
                        }
                    }
                    if !hits.is_empty() {
                        lists.push(("decision", DECISION_WEIGHT, hits));
                    }
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    degradation_notes.push(format!("decision index unavailable: {e}"));
                }
            }
        }

        let fused = reciprocal_rank_fusion(&lists);
        let mut fused = filter_by_min_score(fused, opts.min_score);

        if opts.expand {
            let seeds: Vec<(uuid::Uuid, f64)> = fused
                .iter()
                .take(EXPAND_SEED_COUNT)
                .map(|h| (h.entity.id, h.fused_score))
                .collect();
            let expanded = expand_top_n(
                self.store.as_ref(),
                project,
                &seeds,
                DEFAULT_EXPAND_RELATIONSHIPS,
                opts.expand_tokens,
                &CharsPerFourTokenizer,
            )
            .await?;

            let known: HashSet<uuid::Uuid> = fused.iter().map(|h| h.entity.id).collect();
            for expanded_entity in expanded {
                if known.contains(&expanded_entity.entity.id) {
                    continue;
                }
                fused.push(FusedHit {
                    entity: expanded_entity.entity,
                    fused_score: expanded_entity.score,
                    max_strategy_score: expanded_entity.score,
                });
            }
        }

        let assembled = assemble(
            &fused,
            &AssembleOptions {
                max_tokens: opts.max_tokens,
                include_sources: opts.include_sources,
                include_types: opts.include_types.clone(),
            },
            &CharsPerFourTokenizer,
        );

        let context = render(&assembled, opts.format);

        let mut sources: Vec<SourceEntry> = assembled
            .sources
            .into_iter()
            .map(|s| SourceEntry {
                entity_type: s.entity_type,
                name: s.name,
                relevance: s.relevance,
                file_path: s.file_path,
                notes: Vec::new(),
            })
            .collect();
        if let Some(first) = sources.first_mut() {
            first.notes = degradation_notes;
        }

        Ok(QueryContextResult {
            context,
            sources,
            confidence: assembled.confidence,
            tokens_used: assembled.tokens_used,
            truncated: assembled.truncated,
        })
    }
}
