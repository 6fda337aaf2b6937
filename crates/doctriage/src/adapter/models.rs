//! Model variant catalog.
//!
//! Backends are often configured with a short model name ("qwen2.5") while
//! the installed variant carries a full versioned name
//! ("qwen2.5-1.5b-instruct-q4"). Resolution is exact match first, then at
//! most one deterministic prefix match (lowest registration index wins).
//! The catalog holds a single default variant; registering a new default
//! replaces the previous one rather than flagging both.

use log::debug;

/// A registered model variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariant {
    pub name: String,
    /// Friendly display name, e.g. "Qwen2.5-1.5B-Instruct".
    pub display_name: String,
}

impl ModelVariant {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// Catalog of known model variants with a single default.
pub struct ModelCatalog {
    variants: Vec<ModelVariant>,
    default_index: Option<usize>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self {
            variants: Vec::new(),
            default_index: None,
        }
    }

    /// Registers a variant. The first registered variant becomes the
    /// default; `make_default` moves the default to this variant.
    pub fn register(&mut self, variant: ModelVariant, make_default: bool) {
        self.variants.push(variant);
        let index = self.variants.len() - 1;
        if make_default || self.default_index.is_none() {
            self.default_index = Some(index);
        }
    }

    /// Resolves a requested name to a variant: exact match first, then the
    /// single lowest-index variant whose name starts with the query
    /// (case-insensitive). Returns `None` when nothing matches.
    pub fn resolve(&self, name: &str) -> Option<&ModelVariant> {
        if let Some(exact) = self.variants.iter().find(|v| v.name == name) {
            return Some(exact);
        }

        let query = name.to_lowercase();
        let fuzzy = self
            .variants
            .iter()
            .find(|v| v.name.to_lowercase().starts_with(&query));
        if let Some(variant) = fuzzy {
            debug!("Resolved model '{}' to variant '{}'", name, variant.name);
        }
        fuzzy
    }

    /// The default variant, if any variant is registered.
    pub fn default_variant(&self) -> Option<&ModelVariant> {
        self.default_index.and_then(|i| self.variants.get(i))
    }

    /// Resolves `name`, falling back to the default variant.
    pub fn resolve_or_default(&self, name: &str) -> Option<&ModelVariant> {
        self.resolve(name).or_else(|| self.default_variant())
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        let mut catalog = ModelCatalog::new();
        catalog.register(
            ModelVariant::new("qwen2.5-1.5b-instruct-q4", "Qwen2.5-1.5B-Instruct"),
            false,
        );
        catalog.register(
            ModelVariant::new("qwen2.5-7b-instruct-q4", "Qwen2.5-7B-Instruct"),
            false,
        );
        catalog.register(ModelVariant::new("llava-1.6-7b", "LLaVA 1.6 7B"), false);
        catalog
    }

    #[test]
    fn test_exact_match_wins_over_prefix() {
        let mut catalog = catalog();
        catalog.register(ModelVariant::new("qwen2.5", "Qwen2.5 base"), false);

        let resolved = catalog.resolve("qwen2.5").unwrap();
        assert_eq!(resolved.name, "qwen2.5");
    }

    #[test]
    fn test_prefix_match_is_deterministic() {
        let catalog = catalog();
        // Two variants share the prefix; the lowest registration index wins.
        let resolved = catalog.resolve("qwen2.5").unwrap();
        assert_eq!(resolved.name, "qwen2.5-1.5b-instruct-q4");
    }

    #[test]
    fn test_prefix_match_case_insensitive() {
        let catalog = catalog();
        let resolved = catalog.resolve("LLaVA").unwrap();
        assert_eq!(resolved.name, "llava-1.6-7b");
    }

    #[test]
    fn test_no_match_returns_none() {
        let catalog = catalog();
        assert!(catalog.resolve("mistral").is_none());
    }

    #[test]
    fn test_first_registered_is_default() {
        let catalog = catalog();
        assert_eq!(
            catalog.default_variant().unwrap().name,
            "qwen2.5-1.5b-instruct-q4"
        );
    }

    #[test]
    fn test_make_default_replaces_previous() {
        let mut catalog = catalog();
        catalog.register(ModelVariant::new("phi-3-mini", "Phi-3 Mini"), true);
        assert_eq!(catalog.default_variant().unwrap().name, "phi-3-mini");
        // Exactly one default exists by construction: the index.
        assert_eq!(
            catalog.resolve_or_default("unknown-model").unwrap().name,
            "phi-3-mini"
        );
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ModelCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.default_variant().is_none());
        assert!(catalog.resolve_or_default("anything").is_none());
    }
}
