//! Schema registry for the research knowledge graph.
//!
//! The registry is the static catalogue of entity kinds (node labels),
//! relationship kinds, and canonical property names with their recognised
//! aliases. It is built once and never mutated; every validation call reads
//! it through a shared reference.
//!
//! Lookups never fail loudly: unknown input yields `false` or `None`, and the
//! caller decides whether that is an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Maximum edit distance for "did you mean" suggestions.
const SUGGESTION_DISTANCE: usize = 2;

/// Maximum number of suggestions returned per lookup.
const MAX_SUGGESTIONS: usize = 3;

static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();

// ── Definition (serde) ───────────────────────────────────────────

/// Serializable description of a graph schema.
///
/// Loaded from the `[schema]` section of `scholar.toml` when present.
/// Names live in values rather than table keys so they keep their case.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    /// Relationships with no stored edges, answered by path expansion.
    #[serde(default)]
    pub inferred: Vec<InferredRelationshipDefinition>,
}

/// A node label and its property catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

/// A canonical property name plus the aliases agents tend to use for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A relationship type plus its aliases (e.g. `WROTE` for `WORK_AUTHORED_BY`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipDefinition {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A relationship the graph does not store, e.g. `COLLABORATED_WITH`.
///
/// `expansion` replaces the whole `-[:NAME]-` connector and must itself be a
/// connector between the two endpoint nodes, such as
/// `-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferredRelationshipDefinition {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub expansion: String,
}

impl PropertyDefinition {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl SchemaDefinition {
    /// The built-in catalogue for the Author / Work / Topic research graph.
    pub fn research() -> Self {
        let p = PropertyDefinition::new;
        Self {
            entities: vec![
                EntityDefinition {
                    name: "Author".to_string(),
                    properties: vec![
                        p("id", &[]),
                        p("name", &[]),
                        p("display_name", &["full_name"]),
                    ],
                },
                EntityDefinition {
                    name: "Work".to_string(),
                    properties: vec![
                        p("id", &[]),
                        p("title", &[]),
                        p("type", &[]),
                        p("publication_date", &["publication_year", "pub_year", "year"]),
                        p("award_number", &["award", "grant_number"]),
                        p("funding_info", &[]),
                        p("grants", &[]),
                    ],
                },
                EntityDefinition {
                    name: "Topic".to_string(),
                    properties: vec![
                        p("id", &[]),
                        p("display_name", &["name"]),
                        p("topic_name", &[]),
                        p("description", &[]),
                        p("score", &[]),
                    ],
                },
            ],
            relationships: vec![
                RelationshipDefinition {
                    name: "WORK_AUTHORED_BY".to_string(),
                    aliases: vec!["WROTE".into(), "AUTHORED".into(), "AUTHORED_BY".into()],
                },
                RelationshipDefinition {
                    name: "WORK_HAS_TOPIC".to_string(),
                    aliases: vec!["HAS_TOPIC".into(), "TOPIC_IN".into()],
                },
                RelationshipDefinition {
                    name: "RELATED_TO".to_string(),
                    aliases: Vec::new(),
                },
            ],
            inferred: vec![
                InferredRelationshipDefinition {
                    name: "COLLABORATED_WITH".to_string(),
                    aliases: vec!["CO_AUTHORED".into(), "WORKS_WITH".into()],
                    expansion: "-[:WORK_AUTHORED_BY]->(:Work)<-[:WORK_AUTHORED_BY]-".to_string(),
                },
                InferredRelationshipDefinition {
                    name: "SHARES_TOPIC_WITH".to_string(),
                    aliases: Vec::new(),
                    expansion: "-[:WORK_AUTHORED_BY]->(:Work)-[:WORK_HAS_TOPIC]->(:Topic)\
                                <-[:WORK_HAS_TOPIC]-(:Work)<-[:WORK_AUTHORED_BY]-"
                        .to_string(),
                },
            ],
        }
    }
}

// ── Registry ─────────────────────────────────────────────────────

/// Immutable catalogue of known kinds and property names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    entity_kinds: BTreeSet<String>,
    relationship_kinds: BTreeSet<String>,
    /// Alias or canonical relationship name → canonical name.
    relationship_aliases: BTreeMap<String, String>,
    /// Entity kind → (alias or canonical property name → canonical name).
    property_aliases: BTreeMap<String, BTreeMap<String, String>>,
    /// Inferred name or alias → (canonical inferred name, expansion).
    inferred: BTreeMap<String, (String, String)>,
}

impl SchemaRegistry {
    /// Build a registry from a definition.
    ///
    /// Canonical names always win over aliases: an alias that collides with
    /// a canonical property or relationship name of the same scope is ignored.
    pub fn from_definition(def: &SchemaDefinition) -> Self {
        let mut entity_kinds = BTreeSet::new();
        let mut property_aliases: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

        for entity in &def.entities {
            entity_kinds.insert(entity.name.clone());
            let props = property_aliases.entry(entity.name.clone()).or_default();
            for prop in &entity.properties {
                props.insert(prop.name.clone(), prop.name.clone());
            }
            for prop in &entity.properties {
                for alias in &prop.aliases {
                    if props.get(alias).is_some_and(|c| c == alias) {
                        tracing::warn!(
                            entity = %entity.name,
                            alias = %alias,
                            "Property alias shadows a canonical name; ignored"
                        );
                        continue;
                    }
                    props.entry(alias.clone()).or_insert_with(|| prop.name.clone());
                }
            }
        }

        let mut relationship_kinds = BTreeSet::new();
        let mut relationship_aliases = BTreeMap::new();
        for rel in &def.relationships {
            relationship_kinds.insert(rel.name.clone());
            relationship_aliases.insert(rel.name.clone(), rel.name.clone());
        }
        for rel in &def.relationships {
            for alias in &rel.aliases {
                if relationship_kinds.contains(alias) {
                    continue;
                }
                relationship_aliases
                    .entry(alias.clone())
                    .or_insert_with(|| rel.name.clone());
            }
        }

        let mut inferred = BTreeMap::new();
        for rel in &def.inferred {
            for name in std::iter::once(&rel.name).chain(&rel.aliases) {
                if relationship_aliases.contains_key(name) {
                    tracing::warn!(name = %name, "Inferred relationship shadows a stored one; ignored");
                    continue;
                }
                inferred
                    .entry(name.clone())
                    .or_insert_with(|| (rel.name.clone(), rel.expansion.clone()));
            }
        }

        Self {
            entity_kinds,
            relationship_kinds,
            relationship_aliases,
            property_aliases,
            inferred,
        }
    }

    /// The built-in research catalogue.
    pub fn research() -> Self {
        Self::from_definition(&SchemaDefinition::research())
    }

    /// The process-wide registry.
    ///
    /// Initialised on first use with the built-in research catalogue unless
    /// [`SchemaRegistry::install_global`] ran earlier.
    pub fn global() -> &'static SchemaRegistry {
        GLOBAL.get_or_init(Self::research)
    }

    /// Install a configured registry as the process-wide instance.
    ///
    /// Fails (returning the registry back) if the global was already
    /// initialised; the registry never changes once it has been read.
    pub fn install_global(registry: SchemaRegistry) -> Result<&'static SchemaRegistry, SchemaRegistry> {
        GLOBAL.set(registry)?;
        Ok(Self::global())
    }

    // ── Lookups ──────────────────────────────────────────────────

    /// Whether `name` is a known entity kind (exact, case-sensitive).
    pub fn lookup_entity_kind(&self, name: &str) -> bool {
        self.entity_kinds.contains(name)
    }

    /// Whether `name` is a known canonical relationship kind.
    pub fn lookup_relationship_kind(&self, name: &str) -> bool {
        self.relationship_kinds.contains(name)
    }

    /// Resolve a relationship alias (or canonical name) to its canonical name.
    pub fn resolve_relationship_alias(&self, token: &str) -> Option<&str> {
        self.relationship_aliases.get(token).map(String::as_str)
    }

    /// Resolve an inferred relationship (or alias) to its canonical name and
    /// the connector it expands to.
    ///
    /// Inferred kinds are never listed by [`Self::relationship_kinds`].
    pub fn resolve_inferred(&self, token: &str) -> Option<(&str, &str)> {
        self.inferred
            .get(token)
            .map(|(name, expansion)| (name.as_str(), expansion.as_str()))
    }

    /// Resolve a property token on a known entity kind to its canonical name.
    ///
    /// Returns `None` when the kind is unknown or the token is neither a
    /// canonical property nor a recognised alias of that kind.
    pub fn resolve_property_alias(&self, entity_kind: &str, token: &str) -> Option<&str> {
        self.property_aliases
            .get(entity_kind)?
            .get(token)
            .map(String::as_str)
    }

    /// Resolve a property token without knowing the entity kind.
    ///
    /// A canonical name on any kind resolves to itself; otherwise the first
    /// kind (in name order) that lists the token as an alias decides.
    pub fn resolve_property_any(&self, token: &str) -> Option<&str> {
        let canonical = self
            .property_aliases
            .values()
            .find_map(|props| props.get_key_value(token).filter(|(k, v)| k == v));
        if let Some((_, v)) = canonical {
            return Some(v.as_str());
        }
        self.property_aliases
            .values()
            .find_map(|props| props.get(token))
            .map(String::as_str)
    }

    pub fn entity_kinds(&self) -> impl Iterator<Item = &str> {
        self.entity_kinds.iter().map(String::as_str)
    }

    pub fn relationship_kinds(&self) -> impl Iterator<Item = &str> {
        self.relationship_kinds.iter().map(String::as_str)
    }

    /// Canonical property names of an entity kind (empty if the kind is unknown).
    pub fn properties_of(&self, entity_kind: &str) -> Vec<&str> {
        self.property_aliases
            .get(entity_kind)
            .map(|props| {
                props
                    .iter()
                    .filter(|(k, v)| k == v)
                    .map(|(k, _)| k.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Suggestions ──────────────────────────────────────────────

    /// Known entity kinds close to `token`, nearest first.
    pub fn nearest_entity_kinds(&self, token: &str) -> Vec<String> {
        nearest(self.entity_kinds.iter().map(String::as_str), token)
    }

    /// Known relationship kinds close to `token`, nearest first.
    pub fn nearest_relationship_kinds(&self, token: &str) -> Vec<String> {
        nearest(self.relationship_kinds.iter().map(String::as_str), token)
    }

    /// Canonical properties close to `token`, on `entity_kind` if known,
    /// otherwise across all kinds.
    pub fn nearest_properties(&self, entity_kind: Option<&str>, token: &str) -> Vec<String> {
        match entity_kind.filter(|k| self.lookup_entity_kind(k)) {
            Some(kind) => nearest(self.properties_of(kind).into_iter(), token),
            None => {
                let all: BTreeSet<&str> = self
                    .entity_kinds
                    .iter()
                    .flat_map(|k| self.properties_of(k))
                    .collect();
                nearest(all.into_iter(), token)
            }
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::research()
    }
}

fn nearest<'a>(candidates: impl Iterator<Item = &'a str>, token: &str) -> Vec<String> {
    let needle = token.to_lowercase();
    let mut scored: Vec<(usize, &str)> = candidates
        .map(|c| (levenshtein(&c.to_lowercase(), &needle), c))
        .filter(|(d, _)| *d <= SUGGESTION_DISTANCE)
        .collect();
    scored.sort();
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}

/// Classic two-row Levenshtein distance over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
