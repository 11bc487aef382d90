//! Query plan compiler.
//!
//! Renders a [`QueryPlan`] into Cypher and passes the result through the
//! [`Validator`]. The rendered text gets no special treatment: aliases in the
//! plan are canonicalised, limits clamped, and kinds checked exactly as for
//! agent-written text.

use std::collections::BTreeSet;

use scholar_core::SchemaRegistry;

use crate::error::{QueryError, Result};
use crate::lexer::is_identifier;
use crate::outcome::ValidationOutcome;
use crate::plan::{Direction, FilterValue, QueryPlan, SortDirection};
use crate::validator::Validator;

/// Compile `plan` against the process-wide registry and the default ceiling.
pub fn compile(plan: &QueryPlan) -> ValidationOutcome {
    PlanCompiler::new(Validator::new(SchemaRegistry::global())).compile(plan)
}

#[derive(Debug, Clone, Copy)]
pub struct PlanCompiler<'r> {
    validator: Validator<'r>,
}

impl<'r> PlanCompiler<'r> {
    pub fn new(validator: Validator<'r>) -> Self {
        Self { validator }
    }

    pub fn compile(&self, plan: &QueryPlan) -> ValidationOutcome {
        let result = self.render(plan).and_then(|text| {
            tracing::debug!(query = %text, "Plan rendered");
            self.validator.check(&text)
        });
        if let Err(e) = &result {
            tracing::debug!(kind = %e.kind(), error = %e, "Plan rejected");
        }
        result.into()
    }

    /// Render `plan` to Cypher text without validating the output.
    pub fn render(&self, plan: &QueryPlan) -> Result<String> {
        let scope = Scope::check(plan)?;
        let m = &plan.pattern;

        let (left, right) = match m.direction {
            Direction::Out => ("-", "->"),
            Direction::In => ("<-", "-"),
            Direction::Both => ("-", "-"),
        };
        let mut out = format!(
            "MATCH ({}:{}){}[:{}]{}({}:{})",
            m.source_var, m.source_kind, left, m.relationship_kind, right, m.target_var, m.target_kind
        );

        if !plan.filters.is_empty() {
            let conditions: Vec<String> = plan
                .filters
                .iter()
                .map(|f| {
                    let field = scope.qualify(&f.field);
                    let value = match &f.value {
                        FilterValue::Int(v) => v.to_string(),
                        FilterValue::Str(s) => quote(s),
                    };
                    format!("{field} {} {value}", f.operator.as_cypher())
                })
                .collect();
            out.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }

        let mut seen = BTreeSet::new();
        let mut columns: Vec<String> = plan
            .return_fields
            .iter()
            .filter(|f| seen.insert(f.as_str()))
            .cloned()
            .collect();
        columns.extend(
            plan.aggregations
                .iter()
                .map(|a| format!("count({}) AS {}", a.variable, a.alias)),
        );
        out.push_str(&format!(" RETURN {}", columns.join(", ")));

        if let Some(order) = &plan.order_by {
            let dir = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            out.push_str(&format!(" ORDER BY {} {dir}", order.field));
        }

        if let Some(limit) = plan.limit {
            out.push_str(&format!(" LIMIT {limit}"));
        }

        Ok(out)
    }
}

/// Variables and aliases a plan may reference.
struct Scope<'p> {
    plan: &'p QueryPlan,
    aliases: BTreeSet<&'p str>,
}

impl<'p> Scope<'p> {
    fn check(plan: &'p QueryPlan) -> Result<Self> {
        let m = &plan.pattern;
        for (what, name) in [
            ("source kind", &m.source_kind),
            ("relationship kind", &m.relationship_kind),
            ("target kind", &m.target_kind),
            ("source variable", &m.source_var),
            ("target variable", &m.target_var),
        ] {
            ident(what, name)?;
        }
        if m.source_var == m.target_var {
            return Err(QueryError::malformed(
                "source and target variables must differ",
                Some(m.target_var.as_str()),
            ));
        }
        if plan.return_fields.is_empty() {
            return Err(QueryError::malformed("return_fields must not be empty", None));
        }
        if plan.limit == Some(0) {
            return Err(QueryError::malformed("limit must be positive", Some("0")));
        }

        let mut scope = Scope {
            plan,
            aliases: BTreeSet::new(),
        };
        for agg in &plan.aggregations {
            ident("aggregation alias", &agg.alias)?;
            if scope.is_var(&agg.alias) || !scope.aliases.insert(agg.alias.as_str()) {
                return Err(QueryError::malformed(
                    format!("aggregation alias `{}` is already in use", agg.alias),
                    Some(agg.alias.as_str()),
                ));
            }
            scope.variable_ref("aggregation", &agg.variable)?;
        }
        for field in &plan.return_fields {
            scope.output_ref("return field", field)?;
        }
        if let Some(order) = &plan.order_by {
            scope.output_ref("order field", &order.field)?;
        }
        for filter in &plan.filters {
            let qualified = scope.qualify(&filter.field);
            scope.variable_ref("filter field", &qualified)?;
        }
        Ok(scope)
    }

    fn is_var(&self, name: &str) -> bool {
        name == self.plan.pattern.source_var || name == self.plan.pattern.target_var
    }

    /// Bare filter fields bind to the target variable.
    fn qualify(&self, field: &str) -> String {
        if field.contains('.') || self.is_var(field) {
            field.to_string()
        } else {
            format!("{}.{}", self.plan.pattern.target_var, field)
        }
    }

    /// `var` or `var.property` over a match variable.
    fn variable_ref(&self, what: &str, field: &str) -> Result<()> {
        let (var, prop) = split_field(field);
        ident(what, var)?;
        if let Some(p) = prop {
            ident(what, p)?;
        }
        if !self.is_var(var) {
            return Err(QueryError::malformed(
                format!("{what} `{field}` does not reference a match variable"),
                Some(field),
            ));
        }
        Ok(())
    }

    /// A match-variable reference or an aggregation alias.
    fn output_ref(&self, what: &str, field: &str) -> Result<()> {
        if self.aliases.contains(field) {
            return Ok(());
        }
        self.variable_ref(what, field).map_err(|_| {
            QueryError::malformed(
                format!("{what} `{field}` does not reference a match variable or aggregation alias"),
                Some(field),
            )
        })
    }
}

fn split_field(field: &str) -> (&str, Option<&str>) {
    match field.split_once('.') {
        Some((var, prop)) => (var, Some(prop)),
        None => (field, None),
    }
}

fn ident(what: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::malformed(
            format!("{what} `{name}` is not a valid identifier"),
            Some(name),
        ))
    }
}

/// Single-quote a string value, escaping backslashes, quotes, and line breaks.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
