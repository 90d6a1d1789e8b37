//! Rendering packed entities to text, per `SPEC_FULL.md` §4.5 step 4.
//!
//! Both formatters are pure string builders; neither touches the store or
//! does any I/O.

use crate::assembler::{Assembled, DetailLevel, PackedEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    Markdown,
    PlainText,
}

impl Default for RenderFormat {
    fn default() -> Self {
        RenderFormat::Markdown
    }
}

/// Renders `assembled.packed` into the requested format, in the order the
/// assembler already grouped them in (by type, then score).
pub fn render(assembled: &Assembled, format: RenderFormat) -> String {
    match format {
        RenderFormat::Markdown => render_markdown(&assembled.packed),
        RenderFormat::PlainText => strip_markdown(&render_markdown(&assembled.packed)),
    }
}

fn render_markdown(packed: &[PackedEntity]) -> String {
    let mut out = String::new();
    for entry in packed {
        let e = &entry.entity;
        let location = match (&e.file_path, e.start_line) {
            (Some(path), Some(line)) => format!(" ({path}:{line})"),
            (Some(path), None) => format!(" ({path})"),
            (None, _) => String::new(),
        };
        out.push_str(&format!("## {} `{}`{}\n\n", e.entity_type, e.name, location));

        match entry.detail {
            DetailLevel::Full => {
                if let Some(content) = &e.content {
                    out.push_str("```\n");
                    out.push_str(content);
                    out.push_str("\n```\n\n");
                } else if let Some(summary) = &e.summary {
                    out.push_str(summary);
                    out.push_str("\n\n");
                }
            }
            DetailLevel::SignatureSummary => {
                let signature = e.content.as_deref().and_then(|c| c.lines().next()).unwrap_or(&e.name);
                out.push_str(&format!("`{signature}`\n\n"));
                if let Some(summary) = &e.summary {
                    out.push_str(summary);
                    out.push_str("\n\n");
                }
            }
            DetailLevel::OneLineSummary => {
                let line = e.summary.as_deref().and_then(|s| s.lines().next()).unwrap_or(&e.name);
                out.push_str(line);
                out.push_str("\n\n");
            }
        }
    }
    out
}

/// Strips `#`, `*`, and backtick-fence markers while preserving line breaks.
fn strip_markdown(markdown: &str) -> String {
    markdown
        .lines()
        .map(|line| {
            let trimmed = line.trim_start_matches('#').trim_start();
            if trimmed == "```" {
                return String::new();
            }
            trimmed.replace('`', "").replace('*', "")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssembleOptions, assemble};
    use crate::fusion::FusedHit;
    use crate::models::Entity;
    use crate::tokenizer::CharsPerFourTokenizer;
    use chrono::Utc;
    use uuid::Uuid;

    fn entity() -> Entity {
        Entity {
            id: Uuid::new_v4(),
            entity_type: "function".to_string(),
            name: "parse_config".to_string(),
            qualified_name: "q::parse_config".to_string(),
            content: Some("fn parse_config() -> Config {\n  todo!()\n}".to_string()),
            summary: Some("Parses the TOML config file.".to_string()),
            file_path: Some("src/config.rs".to_string()),
            start_line: Some(10),
            end_line: Some(13),
            hash: "h".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn markdown_includes_fenced_code() {
        let hits = vec![FusedHit {
            entity: entity(),
            fused_score: 0.9,
            max_strategy_score: 0.9,
        }];
        let assembled = assemble(&hits, &AssembleOptions::default(), &CharsPerFourTokenizer);
        let md = render(&assembled, RenderFormat::Markdown);
        assert!(md.contains("```"));
        assert!(md.contains("parse_config"));
    }

    #[test]
    fn plaintext_strips_markers_but_keeps_lines() {
        let hits = vec![FusedHit {
            entity: entity(),
            fused_score: 0.9,
            max_strategy_score: 0.9,
        }];
        let assembled = assemble(&hits, &AssembleOptions::default(), &CharsPerFourTokenizer);
        let text = render(&assembled, RenderFormat::PlainText);
        assert!(!text.contains('`'));
        assert!(!text.contains('#'));
        assert!(text.contains("parse_config"));
        assert!(text.lines().count() > 1);
    }
}
