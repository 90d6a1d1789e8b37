//! Project namespace resolution.
//!
//! Per `SPEC_FULL.md` §4.1: a project's identifier is sanitized once into a
//! table-name prefix, producing a typed handle that every store operation
//! takes instead of a raw string. This is the REDESIGN FLAGS fix for
//! "string-templated SQL with project prefix" — the prefix is validated at
//! construction and never re-derived from untrusted input afterward.

const PREFIX_MARKER: &str = "ctxp_";

/// A validated, opaque handle to one project's table namespace.
///
/// Constructing a `ProjectHandle` is the only place project-id sanitization
/// happens; every other module treats the prefix as an opaque string safe to
/// splice into a table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectHandle {
    id: String,
    prefix: String,
}

impl ProjectHandle {
    /// Derive a handle from a caller-supplied project id. Non-alphanumeric
    /// characters are replaced with underscores; the result is prepended
    /// with a fixed marker so prefixes never collide with the registry
    /// tables (`projects`, `embedding_models`, `schema_version`).
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let sanitized: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self {
            prefix: format!("{PREFIX_MARKER}{sanitized}"),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Table-name prefix for this project, e.g. `ctxp_my_project_entities`.
    pub fn table(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric() {
        let h = ProjectHandle::new("my-project/v2");
        assert_eq!(h.prefix(), "ctxp_my_project_v2");
    }

    #[test]
    fn table_name_includes_suffix() {
        let h = ProjectHandle::new("demo");
        assert_eq!(h.table("entities"), "ctxp_demo_entities");
    }

    #[test]
    fn distinct_ids_produce_distinct_prefixes() {
        let a = ProjectHandle::new("alpha");
        let b = ProjectHandle::new("beta");
        assert_ne!(a.prefix(), b.prefix());
    }
}
