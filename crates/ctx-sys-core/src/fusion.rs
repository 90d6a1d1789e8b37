//! Reciprocal Rank Fusion and relevance filtering, per `SPEC_FULL.md` §4.4.
//!
//! Pure functions: no I/O, no knowledge of how a [`RankedHit`] list was
//! produced. This is the "keep HOW, replace WHAT" rewrite of the teacher's
//! `context-harness-core::search::search` min-max + weighted-sum blend —
//! the merge-then-sort-then-truncate shape survives, the formula doesn't.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::Entity;
use crate::strategy::RankedHit;

/// RRF's rank-damping constant. Fixed per `SPEC_FULL.md` §4.4.
pub const RRF_K: f64 = 60.0;

/// One entity after fusion across all enabled strategies.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub entity: Entity,
    pub fused_score: f64,
    /// The highest raw score this entity received from any single strategy
    /// — used only as a tie-breaker.
    pub max_strategy_score: f64,
}

/// Fuse per-strategy ranked lists into one list, sorted by descending
/// fused score, then descending max strategy score, then ascending
/// `qualified_name` for stability (scenario **S6**).
///
/// `lists` is `(strategy_name, weight, ranked_hits)`; each `ranked_hits`
/// must already be sorted by descending score (as every [`Strategy`](crate::strategy::Strategy)
/// guarantees). Entities absent from a list simply contribute nothing for
/// that strategy, per the RRF formula.
pub fn reciprocal_rank_fusion(lists: &[(&str, f64, Vec<RankedHit>)]) -> Vec<FusedHit> {
    let mut entities: HashMap<Uuid, Entity> = HashMap::new();
    let mut fused: HashMap<Uuid, f64> = HashMap::new();
    let mut max_score: HashMap<Uuid, f64> = HashMap::new();

    for (_, weight, hits) in lists {
        for (rank, hit) in hits.iter().enumerate() {
            let rank = (rank + 1) as f64; // 1-indexed
            let contribution = weight * (1.0 / (RRF_K + rank));
            *fused.entry(hit.entity.id).or_insert(0.0) += contribution;
            let slot = max_score.entry(hit.entity.id).or_insert(0.0);
            if hit.score > *slot {
                *slot = hit.score;
            }
            entities.entry(hit.entity.id).or_insert_with(|| hit.entity.clone());
        }
    }

    let mut result: Vec<FusedHit> = fused
        .into_iter()
        .map(|(id, fused_score)| FusedHit {
            entity: entities.remove(&id).expect("entity present for every fused id"),
            fused_score,
            max_strategy_score: max_score.remove(&id).unwrap_or(0.0),
        })
        .collect();

    result.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap()
            .then_with(|| b.max_strategy_score.partial_cmp(&a.max_strategy_score).unwrap())
            .then_with(|| a.entity.qualified_name.cmp(&b.entity.qualified_name))
    });

    result
}

/// Filter a fused list by `min_score`, interpreted relative to the list's
/// own maximum (so `min_score` lives in `(0, 1]` regardless of the raw RRF
/// magnitude, per `SPEC_FULL.md` §4.4).
pub fn filter_by_min_score(hits: Vec<FusedHit>, min_score: Option<f64>) -> Vec<FusedHit> {
    let Some(min_score) = min_score else {
        return hits;
    };
    let max = hits.iter().map(|h| h.fused_score).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return hits;
    }
    hits.into_iter()
        .filter(|h| h.fused_score / max >= min_score)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entity(name: &str) -> Entity {
        Entity {
            id: Uuid::new_v4(),
            entity_type: "function".to_string(),
            name: name.to_string(),
            qualified_name: format!("q::{name}"),
            content: None,
            summary: None,
            file_path: None,
            start_line: None,
            end_line: None,
            hash: "h".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn hit(e: &Entity, score: f64) -> RankedHit {
        RankedHit {
            entity: e.clone(),
            score,
            stale: false,
        }
    }

    #[test]
    fn single_strategy_preserves_order() {
        let a = entity("a");
        let b = entity("b");
        let fused = reciprocal_rank_fusion(&[("lex", 1.0, vec![hit(&a, 0.9), hit(&b, 0.5)])]);
        assert_eq!(fused[0].entity.id, a.id);
        assert_eq!(fused[1].entity.id, b.id);
    }

    #[test]
    fn rrf_monotonicity_higher_rank_never_loses() {
        // e ranked 1st by lex, nowhere by vec vs. e ranked 2nd by lex only:
        // promoting e's rank in one list must not decrease its fused rank.
        let a = entity("a");
        let b = entity("b");
        let c = entity("c");

        let baseline = reciprocal_rank_fusion(&[
            ("lex", 1.0, vec![hit(&b, 0.9), hit(&a, 0.8), hit(&c, 0.3)]),
        ]);
        let baseline_rank_a = baseline.iter().position(|h| h.entity.id == a.id).unwrap();

        let promoted = reciprocal_rank_fusion(&[
            ("lex", 1.0, vec![hit(&a, 0.95), hit(&b, 0.9), hit(&c, 0.3)]),
        ]);
        let promoted_rank_a = promoted.iter().position(|h| h.entity.id == a.id).unwrap();

        assert!(promoted_rank_a <= baseline_rank_a);
    }

    #[test]
    fn min_score_filters_relative_to_max() {
        let a = entity("a");
        let b = entity("b");
        let fused = reciprocal_rank_fusion(&[("lex", 1.0, vec![hit(&a, 0.9), hit(&b, 0.1)])]);
        let filtered = filter_by_min_score(fused, Some(0.9));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].entity.id, a.id);
    }

    #[test]
    fn absent_from_list_contributes_nothing() {
        let a = entity("a");
        let b = entity("b");
        let fused = reciprocal_rank_fusion(&[
            ("lex", 1.0, vec![hit(&a, 0.9)]),
            ("vec", 1.0, vec![hit(&a, 0.9), hit(&b, 0.9)]),
        ]);
        let a_score = fused.iter().find(|h| h.entity.id == a.id).unwrap().fused_score;
        let b_score = fused.iter().find(|h| h.entity.id == b.id).unwrap().fused_score;
        assert!(a_score > b_score);
    }

    #[test]
    fn stable_tiebreak_by_qualified_name() {
        let mut a = entity("a");
        a.qualified_name = "q::aaa".to_string();
        let mut b = entity("b");
        b.qualified_name = "q::zzz".to_string();
        // identical scores from identical single-strategy rank 1 is
        // impossible (only one hit can be rank 1); instead verify equal
        // fused scores from disjoint strategies break ties by name.
        let fused = reciprocal_rank_fusion(&[
            ("lex", 1.0, vec![hit(&b, 0.5)]),
            ("vec", 1.0, vec![hit(&a, 0.5)]),
        ]);
        assert_eq!(fused[0].entity.qualified_name, "q::aaa");
    }
}
