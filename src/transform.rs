//! Per-column value transforms and the matcher that picks them.
//!
//! A [`TransformRule`] pairs a column matcher with an optional result-set
//! scope and a function applied to every raw value of a matching column. For
//! each result set the rules are resolved once, against that set's columns,
//! into a [`ColumnTransforms`] table.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::TdsMiddlewareError;
use crate::types::{ColumnMetadata, RowValues};

/// Error type a fallible transform may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A transform function: `(raw value, column metadata) -> value`.
pub type TransformFn =
    Arc<dyn Fn(RowValues, &ColumnMetadata) -> Result<RowValues, BoxError> + Send + Sync>;

/// Which columns a rule applies to.
#[derive(Clone)]
pub enum ColumnMatcher {
    /// Exact column name.
    Name(String),
    /// Any of a set of names.
    AnyOf(HashSet<String>),
    /// Names matching a regular expression.
    Pattern(Regex),
}

impl ColumnMatcher {
    /// Compile a pattern matcher.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::ConfigError` if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Result<Self, TdsMiddlewareError> {
        Regex::new(pattern)
            .map(ColumnMatcher::Pattern)
            .map_err(|e| TdsMiddlewareError::ConfigError(format!("invalid column pattern: {e}")))
    }

    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnMatcher::AnyOf(names.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matches(&self, column_name: &str) -> bool {
        match self {
            ColumnMatcher::Pattern(re) => re.is_match(column_name),
            ColumnMatcher::AnyOf(names) => names.contains(column_name),
            ColumnMatcher::Name(name) => name == column_name,
        }
    }
}

impl fmt::Debug for ColumnMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::AnyOf(names) => {
                let mut sorted: Vec<_> = names.iter().collect();
                sorted.sort();
                f.debug_tuple("AnyOf").field(&sorted).finish()
            }
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
        }
    }
}

impl From<&str> for ColumnMatcher {
    fn from(name: &str) -> Self {
        ColumnMatcher::Name(name.to_string())
    }
}

impl From<String> for ColumnMatcher {
    fn from(name: String) -> Self {
        ColumnMatcher::Name(name)
    }
}

impl From<Regex> for ColumnMatcher {
    fn from(re: Regex) -> Self {
        ColumnMatcher::Pattern(re)
    }
}

impl From<Vec<&str>> for ColumnMatcher {
    fn from(names: Vec<&str>) -> Self {
        ColumnMatcher::any_of(names)
    }
}

impl From<Vec<String>> for ColumnMatcher {
    fn from(names: Vec<String>) -> Self {
        ColumnMatcher::any_of(names)
    }
}

/// Result sets a rule is limited to (0-based, in emission order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResultSetScope {
    #[default]
    All,
    Only(BTreeSet<usize>),
}

impl ResultSetScope {
    #[must_use]
    pub fn includes(&self, result_set: usize) -> bool {
        match self {
            ResultSetScope::All => true,
            ResultSetScope::Only(indices) => indices.contains(&result_set),
        }
    }
}

/// A caller-supplied transform plus the columns and result sets it targets.
#[derive(Clone)]
pub struct TransformRule {
    pub column: ColumnMatcher,
    pub result_sets: ResultSetScope,
    pub transform: TransformFn,
}

impl TransformRule {
    /// Rule with an infallible transform, applied in every result set.
    pub fn new<M, F>(column: M, f: F) -> Self
    where
        M: Into<ColumnMatcher>,
        F: Fn(RowValues, &ColumnMetadata) -> RowValues + Send + Sync + 'static,
    {
        Self {
            column: column.into(),
            result_sets: ResultSetScope::All,
            transform: Arc::new(
                move |value: RowValues, meta: &ColumnMetadata| -> Result<RowValues, BoxError> {
                    Ok(f(value, meta))
                },
            ),
        }
    }

    /// Rule whose transform may fail; a failure fails the whole request.
    pub fn try_new<M, F>(column: M, f: F) -> Self
    where
        M: Into<ColumnMatcher>,
        F: Fn(RowValues, &ColumnMetadata) -> Result<RowValues, BoxError> + Send + Sync + 'static,
    {
        Self {
            column: column.into(),
            result_sets: ResultSetScope::All,
            transform: Arc::new(f),
        }
    }

    /// Limit the rule to the given result-set indices.
    #[must_use]
    pub fn for_result_sets<I: IntoIterator<Item = usize>>(mut self, indices: I) -> Self {
        self.result_sets = ResultSetScope::Only(indices.into_iter().collect());
        self
    }

    #[must_use]
    pub fn applies_to(&self, result_set: usize, column_name: &str) -> bool {
        self.result_sets.includes(result_set) && self.column.matches(column_name)
    }
}

impl fmt::Debug for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRule")
            .field("column", &self.column)
            .field("result_sets", &self.result_sets)
            .finish_non_exhaustive()
    }
}

/// First rule, in registration order, that applies to `column_name` in
/// result set `result_set`.
#[must_use]
pub fn match_rule<'r>(
    result_set: usize,
    column_name: &str,
    rules: &'r [TransformRule],
) -> Option<&'r TransformRule> {
    rules
        .iter()
        .find(|rule| rule.applies_to(result_set, column_name))
}

/// Resolved transforms for the columns of one result set, by ordinal.
#[derive(Clone, Default)]
pub struct ColumnTransforms {
    result_set: usize,
    slots: Vec<Option<TransformFn>>,
}

impl ColumnTransforms {
    #[must_use]
    pub fn resolve(
        result_set: usize,
        columns: &[ColumnMetadata],
        rules: &[TransformRule],
    ) -> Self {
        let slots = columns
            .iter()
            .map(|col| match_rule(result_set, &col.name, rules).map(|r| r.transform.clone()))
            .collect();
        Self { result_set, slots }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Apply the resolved transform for `column`, or pass the value through.
    ///
    /// # Errors
    /// Returns `TdsMiddlewareError::TransformError` if the transform fails.
    pub fn apply(
        &self,
        column: &ColumnMetadata,
        value: RowValues,
    ) -> Result<RowValues, TdsMiddlewareError> {
        match self.slots.get(column.ordinal).and_then(Option::as_ref) {
            Some(transform) => {
                transform(value, column).map_err(|e| TdsMiddlewareError::TransformError {
                    column: column.name.clone(),
                    result_set: self.result_set,
                    message: e.to_string(),
                })
            }
            None => Ok(value),
        }
    }
}

impl fmt::Debug for ColumnTransforms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<bool> = self.slots.iter().map(Option::is_some).collect();
        f.debug_struct("ColumnTransforms")
            .field("result_set", &self.result_set)
            .field("resolved", &resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnMetadata> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnMetadata::new(*n, i, "Int4"))
            .collect()
    }

    fn tag(label: &'static str) -> TransformFn {
        Arc::new(
            move |_: RowValues, _: &ColumnMetadata| -> Result<RowValues, BoxError> {
                Ok(RowValues::Text(label.to_string()))
            },
        )
    }

    #[test]
    fn matcher_kinds() {
        assert!(ColumnMatcher::from("amount").matches("amount"));
        assert!(!ColumnMatcher::from("amount").matches("amount2"));
        assert!(ColumnMatcher::from(vec!["a", "b"]).matches("b"));
        let re = ColumnMatcher::pattern("^amt").unwrap_or(ColumnMatcher::from("never"));
        assert!(re.matches("amt_cents"));
        assert!(!re.matches("total_amt"));
        assert!(ColumnMatcher::pattern("(").is_err());
    }

    #[test]
    fn first_registered_rule_wins() {
        let rules = vec![
            TransformRule {
                column: "price".into(),
                result_sets: ResultSetScope::All,
                transform: tag("first"),
            },
            TransformRule {
                column: ColumnMatcher::any_of(["price"]),
                result_sets: ResultSetScope::All,
                transform: tag("second"),
            },
        ];
        let columns = cols(&["price"]);
        let resolved = ColumnTransforms::resolve(0, &columns, &rules);
        let out = resolved.apply(&columns[0], RowValues::Null).ok();
        assert_eq!(out, Some(RowValues::Text("first".into())));
    }

    #[test]
    fn scoped_rule_only_hits_its_result_set() {
        let rules = vec![TransformRule::new("n", |_, _| RowValues::Int(0)).for_result_sets([1])];
        assert!(match_rule(0, "n", &rules).is_none());
        assert!(match_rule(1, "n", &rules).is_some());
        assert!(match_rule(2, "n", &rules).is_none());

        let columns = cols(&["n"]);
        assert!(ColumnTransforms::resolve(0, &columns, &rules).is_empty());
        assert!(!ColumnTransforms::resolve(1, &columns, &rules).is_empty());
    }

    #[test]
    fn failing_transform_reports_column_and_set() {
        let rules = vec![TransformRule::try_new("bad", |_, _| Err("nope".into()))];
        let columns = cols(&["ok", "bad"]);
        let resolved = ColumnTransforms::resolve(3, &columns, &rules);

        assert_eq!(
            resolved.apply(&columns[0], RowValues::Int(1)).ok(),
            Some(RowValues::Int(1))
        );
        match resolved.apply(&columns[1], RowValues::Int(1)) {
            Err(TdsMiddlewareError::TransformError {
                column,
                result_set,
                message,
            }) => {
                assert_eq!(column, "bad");
                assert_eq!(result_set, 3);
                assert_eq!(message, "nope");
            }
            other => panic!("expected transform error, got {other:?}"),
        }
    }
}
