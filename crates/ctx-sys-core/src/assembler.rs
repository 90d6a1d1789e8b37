//! Token-budgeted context assembly, per `SPEC_FULL.md` §4.5.
//!
//! Pure: takes a fused+filtered list of scored entities and a budget,
//! returns a packed, ordered, confidence-scored result. Rendering to a
//! concrete text format is a separate step, see [`crate::render`].

use crate::fusion::FusedHit;
use crate::models::Entity;
use crate::tokenizer::Tokenizer;

/// How much of an entity survived packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Header + full `content`.
    Full,
    /// Header + a one-line signature + `summary` (body dropped).
    SignatureSummary,
    /// Just the one-line summary (or name, if no summary exists).
    OneLineSummary,
}

#[derive(Debug, Clone)]
pub struct PackedEntity {
    pub entity: Entity,
    pub score: f64,
    pub detail: DetailLevel,
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub max_tokens: usize,
    pub include_sources: bool,
    /// Restrict packing to these entity types; `None` packs everything.
    pub include_types: Option<Vec<String>>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            include_sources: true,
            include_types: None,
        }
    }
}

/// One entry in the source list, emitted iff `include_sources`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub relevance: f64,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub packed: Vec<PackedEntity>,
    pub sources: Vec<SourceRecord>,
    /// `mean(top_k_scores)`, `k = min(5, packed.len())`; 0 if nothing packed.
    pub confidence: f64,
    pub tokens_used: usize,
    /// True iff at least one candidate was dropped or degraded.
    pub truncated: bool,
}

/// Deterministic group order entities are rendered in, regardless of score.
fn type_rank(entity_type: &str) -> usize {
    const ORDER: &[&str] = &["instruction", "decision", "file", "class", "function", "document_section"];
    ORDER.iter().position(|t| *t == entity_type).unwrap_or(ORDER.len())
}

fn header_tokens(entity: &Entity, tokenizer: &dyn Tokenizer) -> usize {
    tokenizer.estimate(&format!("{} {}", entity.entity_type, entity.name))
}

fn signature_line(entity: &Entity) -> &str {
    entity
        .content
        .as_deref()
        .and_then(|c| c.lines().next())
        .unwrap_or(&entity.name)
}

fn one_line_summary(entity: &Entity) -> &str {
    entity
        .summary
        .as_deref()
        .and_then(|s| s.lines().next())
        .unwrap_or(&entity.name)
}

fn estimate(entity: &Entity, detail: DetailLevel, tokenizer: &dyn Tokenizer) -> usize {
    let header = header_tokens(entity, tokenizer);
    let body = match detail {
        DetailLevel::Full => entity.content.as_deref().or(entity.summary.as_deref()).unwrap_or(""),
        DetailLevel::SignatureSummary => return header + tokenizer.estimate(signature_line(entity)) + tokenizer.estimate(entity.summary.as_deref().unwrap_or("")),
        DetailLevel::OneLineSummary => one_line_summary(entity),
    };
    header + tokenizer.estimate(body)
}

/// Pack `hits` (already fused, filtered by `min_score`, and possibly
/// expanded) under `opts.max_tokens`, greedily by descending score with
/// graceful degradation, then re-ordered for output by entity type.
pub fn assemble(hits: &[FusedHit], opts: &AssembleOptions, tokenizer: &dyn Tokenizer) -> Assembled {
    let mut candidates: Vec<&FusedHit> = hits
        .iter()
        .filter(|h| {
            opts.include_types
                .as_ref()
                .map_or(true, |types| types.iter().any(|t| t == &h.entity.entity_type))
        })
        .collect();
    candidates.sort_by(|a, b| b.fused_score.partial_cmp(&a.fused_score).unwrap());

    let mut packed = Vec::new();
    let mut tokens_used = 0usize;
    let mut truncated = false;

    for hit in candidates {
        let full = estimate(&hit.entity, DetailLevel::Full, tokenizer);
        if tokens_used + full <= opts.max_tokens {
            tokens_used += full;
            packed.push(PackedEntity {
                entity: hit.entity.clone(),
                score: hit.fused_score,
                detail: DetailLevel::Full,
            });
            continue;
        }
        truncated = true;

        let degraded = estimate(&hit.entity, DetailLevel::SignatureSummary, tokenizer);
        if tokens_used + degraded <= opts.max_tokens {
            tokens_used += degraded;
            packed.push(PackedEntity {
                entity: hit.entity.clone(),
                score: hit.fused_score,
                detail: DetailLevel::SignatureSummary,
            });
            continue;
        }

        let one_line = estimate(&hit.entity, DetailLevel::OneLineSummary, tokenizer);
        if tokens_used + one_line <= opts.max_tokens {
            tokens_used += one_line;
            packed.push(PackedEntity {
                entity: hit.entity.clone(),
                score: hit.fused_score,
                detail: DetailLevel::OneLineSummary,
            });
            continue;
        }

        break;
    }

    let confidence = if packed.is_empty() {
        0.0
    } else {
        let k = packed.len().min(5);
        let mut scores: Vec<f64> = packed.iter().map(|p| p.score).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap());
        scores.iter().take(k).sum::<f64>() / k as f64
    };

    let sources = if opts.include_sources {
        packed
            .iter()
            .map(|p| SourceRecord {
                name: p.entity.name.clone(),
                entity_type: p.entity.entity_type.clone(),
                relevance: p.score,
                file_path: p.entity.file_path.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    packed.sort_by(|a, b| {
        type_rank(&a.entity.entity_type)
            .cmp(&type_rank(&b.entity.entity_type))
            .then_with(|| b.score.partial_cmp(&a.score).unwrap())
    });

    Assembled {
        packed,
        sources,
        confidence,
        tokens_used,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::CharsPerFourTokenizer;
    use chrono::Utc;
    use uuid::Uuid;

    fn entity(entity_type: &str, name: &str, content: Option<&str>, summary: Option<&str>) -> Entity {
        Entity {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            qualified_name: format!("q::{name}"),
            content: content.map(|s| s.to_string()),
            summary: summary.map(|s| s.to_string()),
            file_path: None,
            start_line: None,
            end_line: None,
            hash: "h".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn hit(e: Entity, score: f64) -> FusedHit {
        FusedHit {
            entity: e,
            fused_score: score,
            max_strategy_score: score,
        }
    }

    #[test]
    fn empty_input_yields_zero_confidence_not_truncated() {
        let result = assemble(&[], &AssembleOptions::default(), &CharsPerFourTokenizer);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.truncated);
        assert_eq!(result.tokens_used, 0);
    }

    #[test]
    fn degrades_when_budget_is_tight() {
        let big = entity("function", "big", Some(&"x".repeat(4000)), Some("short summary"));
        let hits = vec![hit(big, 0.9)];
        let opts = AssembleOptions {
            max_tokens: 50,
            include_sources: true,
            include_types: None,
        };
        let result = assemble(&hits, &opts, &CharsPerFourTokenizer);
        assert_eq!(result.packed.len(), 1);
        assert_ne!(result.packed[0].detail, DetailLevel::Full);
        assert!(result.truncated);
    }

    #[test]
    fn groups_by_type_then_score_desc() {
        let f1 = entity("function", "f1", Some("a"), None);
        let f2 = entity("function", "f2", Some("a"), None);
        let file = entity("file", "mod.rs", Some("a"), None);
        let hits = vec![hit(f1, 0.5), hit(file, 0.1), hit(f2, 0.9)];
        let result = assemble(&hits, &AssembleOptions::default(), &CharsPerFourTokenizer);
        assert_eq!(result.packed[0].entity.entity_type, "file");
        assert_eq!(result.packed[1].entity.name, "f2");
        assert_eq!(result.packed[2].entity.name, "f1");
    }

    #[test]
    fn include_types_filters_candidates() {
        let func = entity("function", "f", Some("a"), None);
        let decision = entity("decision", "d", Some("a"), None);
        let hits = vec![hit(func, 0.5), hit(decision, 0.9)];
        let opts = AssembleOptions {
            max_tokens: 4000,
            include_sources: true,
            include_types: Some(vec!["function".to_string()]),
        };
        let result = assemble(&hits, &opts, &CharsPerFourTokenizer);
        assert_eq!(result.packed.len(), 1);
        assert_eq!(result.packed[0].entity.entity_type, "function");
    }

    #[test]
    fn confidence_is_mean_of_top_five_scores() {
        let hits: Vec<FusedHit> = (0..6)
            .map(|i| hit(entity("function", &format!("f{i}"), Some("a"), None), 1.0 - i as f64 * 0.1))
            .collect();
        let result = assemble(&hits, &AssembleOptions::default(), &CharsPerFourTokenizer);
        let expected = (1.0 + 0.9 + 0.8 + 0.7 + 0.6) / 5.0;
        assert!((result.confidence - expected).abs() < 1e-9);
    }
}
