//! Safety and schema validation of Cypher text.
//!
//! Validation runs five stages over the token stream, each short-circuiting:
//!
//! 1. Mutation scan: denylisted clause keywords and non-read-only procedures
//! 2. Label and relationship-type check against the schema registry
//! 3. Property alias normalisation
//! 4. Result-limit clamping or injection
//! 5. Structural sanity (terminated literals, balanced brackets, RETURN fields)
//!
//! Before the stages run, a single pass assigns every token a [`Role`]
//! (keyword, label, property key, callable name, ...) from its bracket
//! context and neighbours. Literal tokens never get a structural role.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use scholar_core::SchemaRegistry;

use crate::error::{QueryError, Result};
use crate::lexer::{render_identifier, tokenize, Defect, Token, TokenKind};
use crate::normalize::{Normalized, Normalizer};
use crate::outcome::{AliasRewrite, ResultLimit, RewriteKind, ValidatedQuery, ValidationOutcome};

/// Result-limit ceiling used when none is configured.
pub const DEFAULT_MAX_RESULT_LIMIT: u64 = 500;

/// Clause keywords that mutate data or administer the database.
const DENYLIST: [&str; 21] = [
    "CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "DROP", "FOREACH", "LOAD", "ALTER",
    "GRANT", "REVOKE", "DENY", "RENAME", "INSERT", "TERMINATE", "START", "STOP", "ENABLE", "SHOW",
    "USE",
];

/// Procedures that only read data or metadata.
const READ_ONLY_PROCEDURES: [&str; 10] = [
    "db.labels",
    "db.relationshipTypes",
    "db.propertyKeys",
    "db.schema.visualization",
    "db.schema.nodeTypeProperties",
    "db.schema.relTypeProperties",
    "dbms.components",
    "gds.version",
    "gds.graph.exists",
    "gds.graph.list",
];

/// Words that may directly precede a node pattern's opening parenthesis.
const PATTERN_LEADERS: [&str; 6] = ["MATCH", "WHERE", "AND", "OR", "XOR", "NOT"];

/// Keywords that cannot start a RETURN field.
const RETURN_TERMINATORS: [&str; 4] = ["ORDER", "SKIP", "LIMIT", "UNION"];

/// Clause keywords that may not follow a standalone `YIELD ... WHERE`.
const CLAUSE_KEYWORDS: [&str; 11] = [
    "MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "YIELD", "RETURN", "ORDER", "SKIP", "OFFSET",
    "LIMIT",
];

/// Whether a `CALL`ed procedure is read-only.
pub fn is_read_only_procedure(name: &str) -> bool {
    READ_ONLY_PROCEDURES.contains(&name)
        || (name.starts_with("gds.") && (name.ends_with(".stream") || name.ends_with(".stats")))
}

/// Validate `text` against the process-wide registry and the default ceiling.
pub fn validate(text: &str) -> ValidationOutcome {
    Validator::new(SchemaRegistry::global()).validate(text)
}

#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    normalizer: Normalizer<'r>,
    max_result_limit: u64,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            normalizer: Normalizer::new(registry),
            max_result_limit: DEFAULT_MAX_RESULT_LIMIT,
        }
    }

    /// Override the result-limit ceiling (minimum 1).
    pub fn with_max_result_limit(mut self, limit: u64) -> Self {
        self.max_result_limit = limit.max(1);
        self
    }

    pub fn max_result_limit(&self) -> u64 {
        self.max_result_limit
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.normalizer.registry()
    }

    pub fn validate(&self, text: &str) -> ValidationOutcome {
        let result = self.check(text);
        match &result {
            Ok(q) => tracing::debug!(
                rewrites = q.rewrites().len(),
                clamped = q.clamped(),
                "Query accepted"
            ),
            Err(e) => tracing::debug!(kind = %e.kind(), error = %e, "Query rejected"),
        }
        result.into()
    }

    /// Run all stages, returning the first failure.
    pub fn check(&self, text: &str) -> Result<ValidatedQuery> {
        self.check_text(text, true)
    }

    fn check_text(&self, text: &str, expand: bool) -> Result<ValidatedQuery> {
        let mut lexed = tokenize(text);
        while lexed.tokens.last().is_some_and(|t| t.is_punct(";")) {
            lexed.tokens.pop();
        }

        let scan = Scan::new(&lexed.tokens);
        let mut edits = Edits::default();

        check_mutations(&scan)?;
        self.check_kinds(&scan, &mut edits, expand)?;
        self.normalize_properties(&scan, &mut edits)?;
        let bound = self.bound_limits(&scan, &mut edits)?;
        check_structure(&scan, &lexed.defects)?;

        let query = edits.render(&lexed.tokens);
        if edits.expanded {
            // The expanded text goes through every stage again, once.
            let expanded = self.check_text(&query, false)?;
            return Ok(ValidatedQuery::new(
                expanded.text().to_string(),
                expanded.limit().cloned(),
                bound.clamped || expanded.clamped(),
                bound.injected || expanded.limit_injected(),
                self.max_result_limit,
                expanded.limit_parameters().to_vec(),
                edits.rewrites,
            ));
        }
        Ok(ValidatedQuery::new(
            query,
            bound.limit,
            bound.clamped,
            bound.injected,
            self.max_result_limit,
            bound.parameters,
            edits.rewrites,
        ))
    }

    // ── Stage 2 ──────────────────────────────────────────────────

    fn check_kinds(&self, scan: &Scan<'_>, edits: &mut Edits, expand: bool) -> Result<()> {
        let registry = self.registry();
        for (i, tok) in scan.tokens.iter().enumerate() {
            let Some(name) = tok.identifier() else { continue };
            match scan.roles[i] {
                Role::Label => {
                    if !registry.lookup_entity_kind(&name) {
                        return Err(QueryError::UnknownLabel {
                            suggestions: registry.nearest_entity_kinds(&name),
                            token: name,
                        });
                    }
                }
                Role::RelType => match self.normalizer.relationship(&name) {
                    Normalized::Canonical(_) => {}
                    Normalized::Alias(canonical) => {
                        edits.rewrite(i, tok, RewriteKind::Relationship, name, canonical)
                    }
                    Normalized::Unresolved => match registry.resolve_inferred(&name) {
                        Some(inferred) if expand => expand_inferred(scan, i, name, inferred, edits)?,
                        _ => {
                            return Err(QueryError::UnknownRelationshipType {
                                suggestions: registry.nearest_relationship_kinds(&name),
                                token: name,
                            });
                        }
                    },
                },
                _ => {}
            }
        }
        Ok(())
    }

    // ── Stage 3 ──────────────────────────────────────────────────

    fn normalize_properties(&self, scan: &Scan<'_>, edits: &mut Edits) -> Result<()> {
        for (i, tok) in scan.tokens.iter().enumerate() {
            let kind = match &scan.roles[i] {
                Role::Property { var } => scan.binding(i, var).cloned(),
                Role::MapKey { node: Some(node) } => node.kind.clone().or_else(|| {
                    node.var
                        .as_ref()
                        .and_then(|v| scan.binding(i, v))
                        .cloned()
                }),
                _ => continue,
            };
            let Some(name) = tok.identifier() else { continue };
            match self.normalizer.property(kind.as_deref(), &name) {
                Normalized::Canonical(_) => {}
                Normalized::Alias(canonical) => {
                    edits.rewrite(i, tok, RewriteKind::Property, name, canonical)
                }
                Normalized::Unresolved => {
                    return Err(QueryError::UnknownProperty {
                        suggestions: self.registry().nearest_properties(kind.as_deref(), &name),
                        token: name,
                        entity_kind: kind,
                    });
                }
            }
        }
        Ok(())
    }

    // ── Stage 4 ──────────────────────────────────────────────────

    fn bound_limits(&self, scan: &Scan<'_>, edits: &mut Edits) -> Result<LimitBound> {
        let tokens = scan.tokens;
        let mut bound = LimitBound::default();
        if tokens.is_empty() {
            return Ok(bound);
        }

        // Each UNION branch is bounded on its own.
        let mut start = 0;
        loop {
            let end = (start..tokens.len())
                .find(|&i| scan.is_top_level_keyword(i, "UNION"))
                .unwrap_or(tokens.len());
            let limit = match (start..end).rev().find(|&i| scan.is_top_level_keyword(i, "RETURN")) {
                Some(ret) => self.bound_return(scan, ret, end, edits, &mut bound)?,
                None => self.bound_yield(scan, start, end, edits, &mut bound)?,
            };
            bound.limit = Some(limit);
            if end == tokens.len() {
                return Ok(bound);
            }
            start = end + 1;
        }
    }

    /// Clamp or inject the LIMIT of the RETURN at `ret`, which ends at `end`.
    fn bound_return(
        &self,
        scan: &Scan<'_>,
        ret: usize,
        end: usize,
        edits: &mut Edits,
        bound: &mut LimitBound,
    ) -> Result<ResultLimit> {
        let ceiling = self.max_result_limit;
        let tokens = scan.tokens;

        let Some(l) = (ret + 1..end).find(|&i| scan.is_top_level_keyword(i, "LIMIT")) else {
            edits.append.insert(end - 1, format!("LIMIT {ceiling}"));
            bound.injected = true;
            return Ok(ResultLimit::Literal(ceiling));
        };

        let value = tokens.get(l + 1).filter(|_| l + 1 < end);
        let limit = match value {
            Some(t) if t.kind == TokenKind::Number => {
                let requested = parse_limit(&t.text).ok_or_else(|| {
                    QueryError::malformed("LIMIT must be a non-negative integer", Some(t.text.as_str()))
                })?;
                if requested > ceiling {
                    tracing::info!(requested, ceiling, "Result limit clamped");
                    edits.replace.insert(l + 1, ceiling.to_string());
                    bound.clamped = true;
                    ResultLimit::Literal(ceiling)
                } else {
                    ResultLimit::Literal(requested)
                }
            }
            Some(t) if t.kind == TokenKind::Parameter => {
                let name = t.text[1..].to_string();
                if !bound.parameters.contains(&name) {
                    bound.parameters.push(name.clone());
                }
                ResultLimit::Parameter(name)
            }
            other => {
                return Err(QueryError::malformed(
                    "LIMIT must be followed by an integer literal or a parameter",
                    other.map(|t| t.text.as_str()).or(Some("LIMIT")),
                ));
            }
        };

        if let Some(extra) = tokens.get(l + 2).filter(|_| l + 2 < end) {
            return Err(QueryError::malformed(
                "LIMIT must be a single literal or parameter ending its RETURN clause",
                Some(extra.text.as_str()),
            ));
        }
        Ok(limit)
    }

    /// Close a query part that ends in `CALL ... YIELD` with a bounded
    /// RETURN of the yielded columns.
    fn bound_yield(
        &self,
        scan: &Scan<'_>,
        start: usize,
        end: usize,
        edits: &mut Edits,
        bound: &mut LimitBound,
    ) -> Result<ResultLimit> {
        let tokens = scan.tokens;
        let at = |i: usize| tokens.get(i).filter(|_| i < end);

        let Some(y) = (start..end).rev().find(|&i| scan.is_top_level_keyword(i, "YIELD")) else {
            return Err(QueryError::malformed(
                "Query must contain a RETURN or YIELD clause",
                at(start).map(|t| t.text.as_str()),
            ));
        };

        let mut columns = Vec::new();
        let mut i = y + 1;
        loop {
            let Some(mut column) = at(i).filter(|t| is_ident(t)).and_then(Token::identifier) else {
                return Err(QueryError::malformed(
                    "YIELD must name the columns it returns",
                    at(i).map(|t| t.text.as_str()).or(Some("YIELD")),
                ));
            };
            i += 1;
            if at(i).is_some_and(|t| t.is_word("AS")) {
                column = at(i + 1)
                    .filter(|t| is_ident(t))
                    .and_then(Token::identifier)
                    .ok_or_else(|| QueryError::malformed("YIELD alias missing after AS", Some("AS")))?;
                i += 2;
            }
            columns.push(column);
            if !at(i).is_some_and(|t| t.is_punct(",")) {
                break;
            }
            i += 1;
        }

        if let Some(t) = at(i) {
            if !scan.is_top_level_keyword(i, "WHERE") {
                return Err(QueryError::malformed(
                    "A query ending in YIELD may only filter with WHERE",
                    Some(t.text.as_str()),
                ));
            }
            // `STARTS WITH` and `ENDS WITH` are operators, not clauses.
            let clause = (i + 1..end).find(|&k| {
                CLAUSE_KEYWORDS.iter().any(|kw| scan.is_top_level_keyword(k, kw))
                    && !(tokens[k].is_word("WITH")
                        && (tokens[k - 1].is_word("STARTS") || tokens[k - 1].is_word("ENDS")))
            });
            if let Some(k) = clause {
                return Err(QueryError::malformed(
                    "A query ending in YIELD may only filter with WHERE",
                    Some(tokens[k].text.as_str()),
                ));
            }
        }

        let ceiling = self.max_result_limit;
        let fields: Vec<String> = columns.iter().map(|c| render_identifier(c)).collect();
        edits
            .append
            .insert(end - 1, format!("RETURN {} LIMIT {ceiling}", fields.join(", ")));
        bound.injected = true;
        Ok(ResultLimit::Literal(ceiling))
    }
}

// ── Stage 1 ──────────────────────────────────────────────────────

fn check_mutations(scan: &Scan<'_>) -> Result<()> {
    for (i, tok) in scan.tokens.iter().enumerate() {
        match &scan.roles[i] {
            Role::Keyword => {
                if let Some(kw) = DENYLIST.iter().find(|kw| tok.is_word(kw)) {
                    return Err(QueryError::safety(
                        format!("Mutating or administrative clause `{kw}` is not allowed"),
                        &tok.text,
                    ));
                }
                if tok.is_word("CALL") {
                    check_call(scan, i)?;
                }
            }
            Role::Callable { name } if name.to_ascii_lowercase().starts_with("apoc.") => {
                return Err(QueryError::safety(
                    format!("APOC routine `{name}` is not allowed"),
                    name,
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_call(scan: &Scan<'_>, call: usize) -> Result<()> {
    match (scan.tokens.get(call + 1), scan.roles.get(call + 1)) {
        (Some(t), _) if t.is_punct("{") => Ok(()),
        (Some(_), Some(Role::Callable { name })) if is_read_only_procedure(name) => Ok(()),
        (Some(_), Some(Role::Callable { name })) => Err(QueryError::safety(
            format!("Procedure `{name}` is not on the read-only allowlist"),
            name,
        )),
        _ => Err(QueryError::safety(
            "CALL must name a read-only procedure or open a subquery",
            "CALL",
        )),
    }
}

// ── Stage 5 ──────────────────────────────────────────────────────

fn check_structure(scan: &Scan<'_>, defects: &[Defect]) -> Result<()> {
    if let Some(defect) = defects.first() {
        return Err(QueryError::malformed(defect.describe(), None));
    }
    let tokens = scan.tokens;
    if tokens.is_empty() {
        return Err(QueryError::malformed("Empty query", None));
    }

    let mut open: Vec<&Token> = Vec::new();
    for tok in tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
        let expected = match tok.text.as_str() {
            "(" | "[" | "{" => {
                open.push(tok);
                continue;
            }
            ")" => "(",
            "]" => "[",
            "}" => "{",
            ";" => {
                return Err(QueryError::malformed(
                    "Multiple statements are not allowed",
                    Some(";"),
                ));
            }
            _ => continue,
        };
        match open.pop() {
            Some(o) if o.text == expected => {}
            _ => {
                return Err(QueryError::malformed(
                    format!("Unbalanced `{}` at byte {}", tok.text, tok.span.start),
                    Some(tok.text.as_str()),
                ));
            }
        }
    }
    if let Some(o) = open.last() {
        return Err(QueryError::malformed(
            format!("Unclosed `{}` at byte {}", o.text, o.span.start),
            Some(o.text.as_str()),
        ));
    }

    let keyword = |i: usize, kw: &str| scan.roles[i] == Role::Keyword && tokens[i].is_word(kw);
    if !(0..tokens.len()).any(|i| keyword(i, "RETURN") || keyword(i, "YIELD")) {
        return Err(QueryError::malformed(
            "Query must contain a RETURN or YIELD clause",
            None,
        ));
    }

    for ret in (0..tokens.len()).filter(|&i| keyword(i, "RETURN")) {
        let mut first = ret + 1;
        if first < tokens.len() && keyword(first, "DISTINCT") {
            first += 1;
        }
        let empty = match tokens.get(first) {
            None => true,
            Some(t) => {
                t.is_punct("}")
                    || (scan.roles[first] == Role::Keyword
                        && RETURN_TERMINATORS.iter().any(|kw| t.is_word(kw)))
            }
        };
        if empty {
            return Err(QueryError::malformed(
                "RETURN clause has no fields",
                Some(tokens[ret].text.as_str()),
            ));
        }
    }
    Ok(())
}

/// Decimal, `0x` hexadecimal or `0o` octal integer.
fn parse_limit(text: &str) -> Option<u64> {
    let (digits, radix) = match text.get(..2) {
        Some("0x" | "0X") => (&text[2..], 16),
        Some("0o" | "0O") => (&text[2..], 8),
        _ => (text, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    // Overlong literals saturate and are clamped like any other large limit.
    Some(u64::from_str_radix(digits, radix).unwrap_or(u64::MAX))
}

/// Replace `-[:NAME]-` (either direction) with the stored path the inferred
/// relationship stands for.
fn expand_inferred(
    scan: &Scan<'_>,
    i: usize,
    name: String,
    (canonical, expansion): (&str, &str),
    edits: &mut Edits,
) -> Result<()> {
    let t = scan.tokens;
    let bare = i >= 3
        && (t[i - 3].is_punct("-") || t[i - 3].is_punct("<-"))
        && t[i - 2].is_punct("[")
        && t[i - 1].is_punct(":")
        && t.get(i + 1).is_some_and(|n| n.is_punct("]"))
        && t.get(i + 2).is_some_and(|n| n.is_punct("-") || n.is_punct("->"));
    if !bare {
        return Err(QueryError::malformed(
            format!("Inferred relationship `{canonical}` must be written alone, as `-[:{canonical}]-`"),
            Some(name.as_str()),
        ));
    }
    edits.replace.insert(i - 3, expansion.to_string());
    edits.skip.extend(i - 2..=i + 2);
    edits.expanded = true;
    edits.rewrites.push(AliasRewrite {
        kind: RewriteKind::Inferred,
        from: name,
        to: canonical.to_string(),
        offset: t[i].span.start,
    });
    Ok(())
}

// ── Token roles ──────────────────────────────────────────────────

/// Node pattern owning a property map, e.g. `(w:Work {year: 2020})`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeRef {
    var: Option<String>,
    kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Role {
    /// Structural word eligible for keyword matching.
    Keyword,
    /// Head of a `var.property` chain.
    Variable,
    Label,
    RelType,
    /// First property after a variable.
    Property { var: String },
    /// Key of a map literal; `node` is set for node-pattern property maps.
    MapKey { node: Option<NodeRef> },
    /// First token of a function or procedure name; `name` is fully qualified.
    Callable { name: String },
    Other,
}

#[derive(Debug)]
enum Frame {
    Paren { start: usize },
    Bracket { rel: bool },
    Brace { node: Option<NodeRef> },
}

struct Scan<'t> {
    tokens: &'t [Token],
    roles: Vec<Role>,
    /// Bracket nesting depth at each token.
    depth: Vec<usize>,
    /// Binding scope of each token; every UNION branch opens a new one.
    scope: Vec<usize>,
    /// Variable → entity kind per scope, from patterns and label predicates.
    bindings: Vec<HashMap<String, String>>,
}

impl<'t> Scan<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let n = tokens.len();
        let mut roles: Vec<Option<Role>> = vec![None; n];
        let mut depth = vec![0; n];
        let mut scope = vec![0; n];
        let mut bindings = vec![HashMap::new()];
        let mut stack: Vec<Frame> = Vec::new();

        for i in 0..n {
            let tok = &tokens[i];
            depth[i] = stack.len();
            if stack.is_empty() && tok.is_word("UNION") && !(i >= 1 && tokens[i - 1].is_punct(".")) {
                bindings.push(HashMap::new());
            }
            scope[i] = bindings.len() - 1;
            match tok.kind {
                TokenKind::Punct => match tok.text.as_str() {
                    "(" => stack.push(Frame::Paren { start: i }),
                    "[" => {
                        let rel = i > 0 && (tokens[i - 1].is_punct("-") || tokens[i - 1].is_punct("<-"));
                        stack.push(Frame::Bracket { rel });
                    }
                    "{" => {
                        let node = match stack.last() {
                            Some(Frame::Paren { start }) => node_pattern(tokens, *start, i),
                            _ => None,
                        };
                        stack.push(Frame::Brace { node });
                    }
                    ")" => pop_frame(&mut stack, |f| matches!(f, Frame::Paren { .. })),
                    "]" => pop_frame(&mut stack, |f| matches!(f, Frame::Bracket { .. })),
                    "}" => pop_frame(&mut stack, |f| matches!(f, Frame::Brace { .. })),
                    ":" => match stack.last() {
                        Some(Frame::Brace { node }) => {
                            let after_open = i < 2 || tokens[i - 2].is_punct("{") || tokens[i - 2].is_punct(",");
                            if i >= 1 && is_ident(&tokens[i - 1]) && after_open {
                                roles[i - 1] = Some(Role::MapKey { node: node.clone() });
                            }
                        }
                        top => {
                            let rel = matches!(top, Some(Frame::Bracket { rel: true }));
                            let Some(next) = tokens.get(i + 1).filter(|t| is_ident(t)) else {
                                continue;
                            };
                            roles[i + 1] = Some(if rel { Role::RelType } else { Role::Label });
                            let binds = !rel
                                && i >= 1
                                && is_ident(&tokens[i - 1])
                                && !matches!(roles[i - 1], Some(Role::Label | Role::RelType));
                            if binds {
                                if let (Some(var), Some(kind)) = (tokens[i - 1].identifier(), next.identifier()) {
                                    if let Some(branch) = bindings.last_mut() {
                                        branch.entry(var).or_insert(kind);
                                    }
                                }
                            }
                        }
                    },
                    "|" | "&" if i > 0 => {
                        // Alternatives only inside the pattern that owns them,
                        // so `[x IN xs WHERE x:Work | x.title]` stays a projection.
                        let alt = match (roles[i - 1].clone(), stack.last()) {
                            (Some(Role::Label), Some(Frame::Paren { .. })) => Some(Role::Label),
                            (Some(Role::RelType), Some(Frame::Bracket { rel: true })) => {
                                Some(Role::RelType)
                            }
                            _ => None,
                        };
                        if let Some(role) = alt {
                            if tokens.get(i + 1).is_some_and(is_ident) {
                                roles[i + 1] = Some(role);
                            }
                        }
                    }
                    _ => {}
                },
                TokenKind::Word | TokenKind::Quoted if roles[i].is_none() => {
                    if i >= 1 && tokens[i - 1].is_punct(".") {
                        roles[i] = Some(Role::Other);
                        continue;
                    }
                    let mut j = i;
                    while j + 2 < n && tokens[j + 1].is_punct(".") && is_ident(&tokens[j + 2]) {
                        j += 2;
                    }
                    let after_call = i >= 1
                        && tokens[i - 1].is_word("CALL")
                        && roles[i - 1] == Some(Role::Keyword);
                    let invoked = tokens.get(j + 1).is_some_and(|t| t.is_punct("("));

                    if after_call || (j > i && invoked) {
                        let name = (i..=j)
                            .step_by(2)
                            .filter_map(|k| tokens[k].identifier())
                            .collect::<Vec<_>>()
                            .join(".");
                        roles[i] = Some(Role::Callable { name });
                        for role in &mut roles[i + 1..=j] {
                            *role = Some(Role::Other);
                        }
                    } else if j > i {
                        let var = tok.identifier().unwrap_or_default();
                        roles[i] = Some(Role::Variable);
                        roles[i + 2] = Some(Role::Property { var });
                        for role in roles[i + 3..=j].iter_mut().filter(|r| r.is_none()) {
                            *role = Some(Role::Other);
                        }
                    } else if tok.kind == TokenKind::Word {
                        roles[i] = Some(Role::Keyword);
                    } else {
                        roles[i] = Some(Role::Other);
                    }
                }
                _ => {}
            }
        }

        Self {
            tokens,
            roles: roles.into_iter().map(|r| r.unwrap_or(Role::Other)).collect(),
            depth,
            scope,
            bindings,
        }
    }

    /// Entity kind bound to `var` in the branch containing token `i`.
    fn binding(&self, i: usize, var: &str) -> Option<&String> {
        self.bindings.get(self.scope[i])?.get(var)
    }

    fn is_top_level_keyword(&self, i: usize, kw: &str) -> bool {
        self.depth[i] == 0 && self.roles[i] == Role::Keyword && self.tokens[i].is_word(kw)
    }
}

fn is_ident(t: &Token) -> bool {
    matches!(t.kind, TokenKind::Word | TokenKind::Quoted)
}

fn pop_frame(stack: &mut Vec<Frame>, matches: impl Fn(&Frame) -> bool) {
    if stack.last().is_some_and(matches) {
        stack.pop();
    }
}

/// Recognise `( [var] (:Label (|Label)*)* {` between `start` and `brace`.
fn node_pattern(tokens: &[Token], start: usize, brace: usize) -> Option<NodeRef> {
    if start > 0 {
        let prev = &tokens[start - 1];
        if prev.kind == TokenKind::Word && !PATTERN_LEADERS.iter().any(|kw| prev.is_word(kw)) {
            return None;
        }
    }
    let inner = &tokens[start + 1..brace];
    let mut node = NodeRef { var: None, kind: None };
    let mut idx = 0;
    if let Some(first) = inner.first().filter(|t| is_ident(t)) {
        node.var = first.identifier();
        idx = 1;
    }
    while idx < inner.len() {
        let sep = &inner[idx];
        if !(sep.is_punct(":") || sep.is_punct("|") || sep.is_punct("&")) {
            return None;
        }
        let label = inner.get(idx + 1).filter(|t| is_ident(t))?;
        if node.kind.is_none() {
            node.kind = label.identifier();
        }
        idx += 2;
    }
    Some(node)
}

// ── Rewriting ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LimitBound {
    limit: Option<ResultLimit>,
    clamped: bool,
    injected: bool,
    parameters: Vec<String>,
}

#[derive(Debug, Default)]
struct Edits {
    /// Token index → replacement text.
    replace: BTreeMap<usize, String>,
    /// Token index → text emitted after the token.
    append: BTreeMap<usize, String>,
    /// Tokens dropped from the output.
    skip: BTreeSet<usize>,
    /// Whether an inferred relationship was expanded.
    expanded: bool,
    rewrites: Vec<AliasRewrite>,
}

impl Edits {
    fn rewrite(&mut self, i: usize, tok: &Token, kind: RewriteKind, from: String, to: &str) {
        self.replace.insert(i, render_identifier(to));
        self.rewrites.push(AliasRewrite {
            kind,
            from,
            to: to.to_string(),
            offset: tok.span.start,
        });
    }

    /// Re-emit tokens: comments gone, whitespace runs collapsed to one space.
    fn render(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for (i, tok) in tokens.iter().enumerate() {
            if self.skip.contains(&i) {
                continue;
            }
            if i > 0 && tok.spaced {
                out.push(' ');
            }
            out.push_str(self.replace.get(&i).map_or(tok.text.as_str(), String::as_str));
            if let Some(extra) = self.append.get(&i) {
                out.push(' ');
                out.push_str(extra);
            }
        }
        out
    }
}
