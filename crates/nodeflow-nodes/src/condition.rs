use async_trait::async_trait;
use nodeflow_core::{
    HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput, Value, DEFAULT_HANDLE,
};
use std::str::FromStr;

/// Comparison applied by the `condition` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Truthy,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,
}

impl FromStr for Operator {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "truthy" => Operator::Truthy,
            "equals" | "==" => Operator::Equals,
            "not_equals" | "!=" => Operator::NotEquals,
            "greater_than" | ">" => Operator::GreaterThan,
            "less_than" | "<" => Operator::LessThan,
            "greater_or_equal" | ">=" => Operator::GreaterOrEqual,
            "less_or_equal" | "<=" => Operator::LessOrEqual,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "is_empty" => Operator::IsEmpty,
            "is_not_empty" => Operator::IsNotEmpty,
            "is_null" => Operator::IsNull,
            "is_not_null" => Operator::IsNotNull,
            other => {
                return Err(NodeError::Configuration(format!(
                    "unknown operator '{}'",
                    other
                )))
            }
        };
        Ok(op)
    }
}

impl Operator {
    /// Apply the operator to `actual`, comparing against `expected` where
    /// the operator takes an operand.
    pub fn evaluate(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Operator::Truthy => actual.is_truthy(),
            Operator::Equals => values_equal(actual, expected),
            Operator::NotEquals => !values_equal(actual, expected),
            Operator::GreaterThan => compare(actual, expected, |a, b| a > b),
            Operator::LessThan => compare(actual, expected, |a, b| a < b),
            Operator::GreaterOrEqual => compare(actual, expected, |a, b| a >= b),
            Operator::LessOrEqual => compare(actual, expected, |a, b| a <= b),
            Operator::Contains => contains(actual, expected),
            Operator::NotContains => !contains(actual, expected),
            Operator::StartsWith => display(actual).starts_with(&display(expected)),
            Operator::EndsWith => display(actual).ends_with(&display(expected)),
            Operator::In => contains(expected, actual),
            Operator::NotIn => !contains(expected, actual),
            Operator::IsEmpty => is_empty(actual),
            Operator::IsNotEmpty => !is_empty(actual),
            Operator::IsNull => actual.is_null(),
            Operator::IsNotNull => !actual.is_null(),
        }
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (to_f64(a), to_f64(b)) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (to_f64(a), to_f64(b)) {
        (Some(x), Some(y)) => op(x, y),
        _ => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&display(needle)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::Object(map) => needle.as_str().map_or(false, |key| map.contains_key(key)),
        _ => false,
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Value a routing node inspects: `config.variable` names an execution
/// variable; otherwise the first input, narrowed to `config.input` when that
/// names a field.
async fn subject(ctx: &NodeContext) -> Result<Value, NodeError> {
    if let Some(name) = ctx.config.get("variable") {
        let name = name.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: "variable".to_string(),
            expected: "string".to_string(),
            actual: name.type_name().to_string(),
        })?;
        return Ok(ctx.variables.get(name).await.unwrap_or_default());
    }

    let input = ctx.first_input().cloned().unwrap_or_default();
    match ctx.config.get("input").and_then(|v| v.as_str()) {
        Some(field) if !field.is_empty() => Ok(input.get(field).cloned().unwrap_or_default()),
        _ => Ok(input),
    }
}

/// Routes to the `"true"` or `"false"` handle
pub struct ConditionNode;

#[async_trait]
impl NodeHandler for ConditionNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let operator = match ctx.config.get("operator") {
            Some(op) => op
                .as_str()
                .ok_or_else(|| NodeError::Configuration("operator must be a string".to_string()))?
                .parse::<Operator>()?,
            None => Operator::Truthy,
        };
        let expected = ctx.get_config_or("value", Value::Null);
        let actual = subject(&ctx).await?;

        let result = operator.evaluate(&actual, &expected);
        tracing::debug!(
            "Condition {}: {} {:?} {} -> {}",
            ctx.node_id,
            actual,
            operator,
            expected,
            result
        );

        let handle = if result { "true" } else { "false" };
        Ok(NodeOutput::routed(ctx.merged_inputs(), handle))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Route to the true or false branch".to_string(),
            category: "flow".to_string(),
        }
    }
}

/// Routes to the handle whose case value matches.
///
/// `config.cases` maps handle to value. Without a match the node routes to
/// `"default"`, or takes no path when `config.fallthrough` is false.
pub struct SwitchNode;

#[async_trait]
impl NodeHandler for SwitchNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let cases = ctx
            .require_config("cases")?
            .as_object()
            .ok_or_else(|| NodeError::Configuration("cases must be an object".to_string()))?;
        let fallthrough = ctx
            .config
            .get("fallthrough")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let actual = subject(&ctx).await?;

        let mut handles: Vec<&String> = cases.keys().collect();
        handles.sort();
        let matched = handles
            .into_iter()
            .find(|handle| values_equal(&actual, &cases[handle.as_str()]));

        let output = ctx.merged_inputs();
        match matched {
            Some(handle) => {
                tracing::debug!("Switch {} matched case {}", ctx.node_id, handle);
                Ok(NodeOutput::routed(output, handle.clone()))
            }
            None if fallthrough => Ok(NodeOutput::routed(output, DEFAULT_HANDLE)),
            None => {
                tracing::debug!("Switch {} matched nothing; no path taken", ctx.node_id);
                Ok(NodeOutput::no_path(output))
            }
        }
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Route to the branch whose case matches".to_string(),
            category: "flow".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_operators_coerce_strings() {
        let five = Value::from(5.0);
        assert!(Operator::Equals.evaluate(&five, &Value::from("5")));
        assert!(Operator::GreaterThan.evaluate(&five, &Value::from(3.0)));
        assert!(Operator::LessOrEqual.evaluate(&five, &Value::from(5.0)));
        assert!(!Operator::LessThan.evaluate(&Value::from("abc"), &five));
    }

    #[test]
    fn membership_and_text_operators() {
        let tags = Value::Array(vec![Value::from("a"), Value::from("b")]);
        assert!(Operator::Contains.evaluate(&tags, &Value::from("b")));
        assert!(Operator::In.evaluate(&Value::from("a"), &tags));
        assert!(Operator::NotIn.evaluate(&Value::from("z"), &tags));
        assert!(Operator::StartsWith.evaluate(&Value::from("hello"), &Value::from("he")));
        assert!(Operator::EndsWith.evaluate(&Value::from("hello"), &Value::from("lo")));
    }

    #[test]
    fn emptiness_and_null() {
        assert!(Operator::IsEmpty.evaluate(&Value::from(""), &Value::Null));
        assert!(Operator::IsEmpty.evaluate(&Value::Null, &Value::Null));
        assert!(Operator::IsNotEmpty.evaluate(&Value::from("x"), &Value::Null));
        assert!(Operator::IsNull.evaluate(&Value::Null, &Value::Null));
        assert!(!Operator::Truthy.evaluate(&Value::from(0.0), &Value::Null));
    }

    #[test]
    fn unknown_operator_is_a_configuration_error() {
        assert!(matches!(
            "approximately".parse::<Operator>(),
            Err(NodeError::Configuration(_))
        ));
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::GreaterOrEqual);
    }
}
