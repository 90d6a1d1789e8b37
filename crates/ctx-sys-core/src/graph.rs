//! Graph traversal: BFS frontier as an arena + visited set, per
//! `SPEC_FULL.md` §4.2/§4.3.3 and REDESIGN FLAGS ("graph traversal via
//! recursion/mutual references... encode the frontier as an arena + index").
//!
//! Used directly by [`crate::strategy`]'s graph strategy and by the
//! expansion stage in [`crate::fusion`]'s caller (the engine, in `ctx-sys`).

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Direction, Entity};
use crate::project::ProjectHandle;
use crate::store::{NeighborOptions, Store};
use crate::tokenizer::Tokenizer;

/// Default relationship types followed during expansion.
pub const DEFAULT_EXPAND_RELATIONSHIPS: &[&str] =
    &["contains", "imports", "extends", "implements", "type_of"];

/// Breadth-first traversal from a set of seed entities, following outbound
/// relationships only, scoring each reached entity `seed_score * decay^hops`
/// and de-duplicating by taking the max over all paths that reach it.
///
/// An unknown entity id encountered mid-traversal (e.g. a relationship
/// whose endpoint was deleted concurrently) is dropped, not an error.
/// Cycles are handled by the visited set; depth is bounded by `max_depth`.
pub async fn bfs(
    store: &dyn Store,
    project: &ProjectHandle,
    seeds: &[(Uuid, f64)],
    max_depth: u32,
    decay: f64,
) -> Result<HashMap<Uuid, f64>> {
    let mut best: HashMap<Uuid, f64> = HashMap::new();
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut frontier: VecDeque<(Uuid, f64, u32)> = VecDeque::new();

    for &(id, score) in seeds {
        frontier.push_back((id, score, 0));
        best.insert(id, score);
    }

    while let Some((id, score, hops)) = frontier.pop_front() {
        if visited.contains(&id) {
            continue;
        }
        visited.insert(id);

        if hops >= max_depth {
            continue;
        }

        let edges = store
            .neighbors(project, id, &NeighborOptions {
                relationship: None,
                direction: Direction::Out,
            })
            .await?;

        for edge in edges {
            let next_id = edge.target_id;
            if visited.contains(&next_id) {
                continue;
            }
            let next_score = score * decay;
            let slot = best.entry(next_id).or_insert(0.0);
            if next_score > *slot {
                *slot = next_score;
            }
            frontier.push_back((next_id, next_score, hops + 1));
        }
    }

    Ok(best)
}

/// One entity pulled in by expansion, alongside its degraded score.
#[derive(Debug, Clone)]
pub struct ExpandedEntity {
    pub entity: Entity,
    pub score: f64,
}

/// Pull one-hop neighbours of `top` along `allowed_relationships`, scoring
/// each `parent_score * 0.5`, stopping once `expand_tokens` would be
/// exceeded — `SPEC_FULL.md` §4.4's expansion sub-budget, using the same
/// tokenizer the assembler uses so the two budgets never disagree.
pub async fn expand_top_n(
    store: &dyn Store,
    project: &ProjectHandle,
    top: &[(Uuid, f64)],
    allowed_relationships: &[&str],
    expand_tokens: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<ExpandedEntity>> {
    let mut seen: HashSet<Uuid> = top.iter().map(|(id, _)| *id).collect();
    let mut out = Vec::new();
    let mut tokens_used = 0usize;

    for &(parent_id, parent_score) in top {
        let edges = store
            .neighbors(project, parent_id, &NeighborOptions {
                relationship: None,
                direction: Direction::Both,
            })
            .await?;

        for edge in edges {
            if !allowed_relationships.contains(&edge.relationship.as_str()) {
                continue;
            }
            let neighbor_id = if edge.source_id == parent_id {
                edge.target_id
            } else {
                edge.source_id
            };
            if !seen.insert(neighbor_id) {
                continue;
            }
            let Some(entity) = store.get_entity(project, neighbor_id).await? else {
                continue;
            };
            let estimate = tokenizer.estimate(entity.summary.as_deref().unwrap_or(&entity.name));
            if tokens_used + estimate > expand_tokens {
                return Ok(out);
            }
            tokens_used += estimate;
            out.push(ExpandedEntity {
                entity,
                score: parent_score * 0.5,
            });
        }
    }

    Ok(out)
}
