//! Query results and the tri-state verdict derived from them.

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};

/// Expression label under which evaluators report the decision.
pub const ALLOW_EXPRESSION: &str = "allow";

/// One evaluated expression of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionValue {
    /// The value the expression evaluated to.
    pub value: serde_json::Value,
    /// Source text of the expression.
    pub text: String,
}

impl ExpressionValue {
    /// Create an expression value.
    pub fn new(value: serde_json::Value, text: impl Into<String>) -> Self {
        Self {
            value,
            text: text.into(),
        }
    }
}

/// One result of a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Evaluated expressions, in query order.
    pub expressions: Vec<ExpressionValue>,
}

/// All results of a query. Empty means the query was undefined.
pub type ResultSet = Vec<QueryResult>;

/// Build a single-result set carrying a decisive `allow` value.
pub fn decisive(allowed: bool) -> ResultSet {
    vec![QueryResult {
        expressions: vec![ExpressionValue::new(
            serde_json::Value::Bool(allowed),
            ALLOW_EXPRESSION,
        )],
    }]
}

/// Outcome of evaluating one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The scope grants access.
    Allow,
    /// The scope refuses access.
    Deny,
    /// The scope has no rule, or its rule abstains.
    NoDecision,
}

impl Verdict {
    /// Derive the verdict of `query` from its results.
    ///
    /// An empty set, or a first result without expressions, is
    /// [`Verdict::NoDecision`]. Otherwise the first expression of the first
    /// result must be a boolean.
    pub fn from_result_set(query: &str, results: &[QueryResult]) -> AuthzResult<Self> {
        let Some(first) = results.first().and_then(|r| r.expressions.first()) else {
            return Ok(Self::NoDecision);
        };
        match first.value {
            serde_json::Value::Bool(true) => Ok(Self::Allow),
            serde_json::Value::Bool(false) => Ok(Self::Deny),
            ref other => Err(AuthzError::NonBooleanVerdict {
                query: query.to_string(),
                value: other.clone(),
            }),
        }
    }

    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::NoDecision => "no_decision",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_set_is_no_decision() {
        let verdict = Verdict::from_result_set("data.foo.allow", &[]).unwrap();
        assert_eq!(verdict, Verdict::NoDecision);
    }

    #[test]
    fn test_first_result_wins() {
        let mut results = decisive(false);
        results.extend(decisive(true));
        let verdict = Verdict::from_result_set("data.foo.allow", &results).unwrap();
        assert_eq!(verdict, Verdict::Deny);

        let verdict = Verdict::from_result_set("data.foo.allow", &decisive(true)).unwrap();
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn test_result_without_expressions_is_no_decision() {
        let results = vec![QueryResult::default()];
        let verdict = Verdict::from_result_set("data.foo.allow", &results).unwrap();
        assert_eq!(verdict, Verdict::NoDecision);
    }

    #[test]
    fn test_non_boolean_is_an_error() {
        let results = vec![QueryResult {
            expressions: vec![ExpressionValue::new(json!("yes"), ALLOW_EXPRESSION)],
        }];
        let err = Verdict::from_result_set("data.foo.allow", &results).unwrap_err();
        assert!(matches!(err, AuthzError::NonBooleanVerdict { ref query, .. } if query == "data.foo.allow"));
        assert!(!err.is_denial());
    }
}
