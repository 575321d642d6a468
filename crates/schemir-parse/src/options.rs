use serde::{Deserialize, Serialize};

/// Parser configuration.
///
/// Every field has a default, so a host configuration only needs to name
/// the knobs it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Recursion limit for nested expressions in the TypeScript, Ruby and
    /// SQL parsers. Statements nested deeper are skipped with a warning.
    pub max_nesting_depth: usize,

    /// Populate [`schemir_schema::Schema::relationships`] from the parsed
    /// foreign keys.
    pub derive_relationships: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 128,
            derive_relationships: true,
        }
    }
}

impl ParseOptions {
    /// Load options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Tracks recursion depth for a recursive-descent parser.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DepthGuard {
    depth: usize,
    limit: usize,
}

impl DepthGuard {
    pub(crate) fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    /// Enter one level. Returns `false` when the limit is exceeded.
    pub(crate) fn enter(&mut self) -> bool {
        self.depth += 1;
        self.depth <= self.limit
    }

    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let options = ParseOptions::from_json(r#"{ "max_nesting_depth": 8 }"#).unwrap();
        assert_eq!(options.max_nesting_depth, 8);
        assert!(options.derive_relationships);
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(ParseOptions::from_json("{}").unwrap(), ParseOptions::default());
    }

    #[test]
    fn test_depth_guard() {
        let mut guard = DepthGuard::new(2);
        assert!(guard.enter());
        assert!(guard.enter());
        assert!(!guard.enter());
        guard.exit();
        guard.exit();
        assert!(guard.enter());
    }
}
