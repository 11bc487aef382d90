//! Alias normalisation for single identifier tokens.
//!
//! Rewrites operate on tokens produced by the lexer, never on raw substrings,
//! so an alias that happens to appear inside a string literal or a longer
//! identifier is left alone.

use scholar_core::SchemaRegistry;

/// Result of normalising one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized<'r> {
    /// Already the canonical name.
    Canonical(&'r str),
    /// A recognised alias of the given canonical name.
    Alias(&'r str),
    Unresolved,
}

impl<'r> Normalized<'r> {
    pub fn canonical(&self) -> Option<&'r str> {
        match self {
            Self::Canonical(c) | Self::Alias(c) => Some(c),
            Self::Unresolved => None,
        }
    }

    pub fn is_rewrite(&self) -> bool {
        matches!(self, Self::Alias(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> Normalizer<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Normalise a relationship-type token.
    pub fn relationship(&self, token: &str) -> Normalized<'r> {
        classify(token, self.registry.resolve_relationship_alias(token))
    }

    /// Normalise a property token on `entity_kind`, or on any kind if unbound.
    pub fn property(&self, entity_kind: Option<&str>, token: &str) -> Normalized<'r> {
        let resolved = match entity_kind {
            Some(kind) => self.registry.resolve_property_alias(kind, token),
            None => self.registry.resolve_property_any(token),
        };
        classify(token, resolved)
    }
}

fn classify<'r>(token: &str, resolved: Option<&'r str>) -> Normalized<'r> {
    match resolved {
        Some(c) if c == token => Normalized::Canonical(c),
        Some(c) => Normalized::Alias(c),
        None => Normalized::Unresolved,
    }
}
