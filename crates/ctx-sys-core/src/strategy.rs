//! The `Strategy` trait: the common shape of `lex`, `vec`, and `graph`
//! retrieval, per `SPEC_FULL.md` §4.3.
//!
//! REDESIGN FLAGS: "cyclic dependency between fusion and strategies" is
//! fixed by inverting the relationship — [`crate::fusion`] depends only on
//! this trait's output type ([`RankedHit`]), never on a concrete strategy.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Entity;
use crate::project::ProjectHandle;
use crate::store::Store;

/// One scored entity from a single strategy's ranked list.
#[derive(Debug, Clone)]
pub struct RankedHit {
    pub entity: Entity,
    /// Normalized to `(0, 1]`.
    pub score: f64,
    pub stale: bool,
}

#[derive(Debug, Clone)]
pub struct StrategyOptions {
    pub types: Option<Vec<String>>,
    pub limit: usize,
    /// Active embedding model id, needed by the semantic strategy.
    pub model_id: String,
    /// BFS depth for the graph strategy. Default 2.
    pub graph_depth: u32,
    /// When true, the semantic strategy re-embeds stale vectors inline
    /// instead of merely flagging them.
    pub reembed_stale: bool,
    /// Precomputed query vector; set by the engine when a HyDE document
    /// was generated in place of the raw query.
    pub precomputed_query_vec: Option<Vec<f32>>,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            types: None,
            limit: 20,
            model_id: String::new(),
            graph_depth: 2,
            reembed_stale: false,
            precomputed_query_vec: None,
        }
    }
}

/// A single retrieval strategy: `(project, query, options) -> ranked hits`.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        store: &dyn Store,
        project: &ProjectHandle,
        query: &str,
        opts: &StrategyOptions,
    ) -> Result<Vec<RankedHit>>;
}

/// Bag passed between strategy stages when an entity's identity, rather
/// than its full record, is all that's needed (e.g. de-duplication).
pub type EntityId = Uuid;
