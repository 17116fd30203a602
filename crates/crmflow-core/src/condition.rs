// Branch conditions
//
// A task may carry a condition that is evaluated just before it runs. When the
// condition does not hold the execution is SKIPPED and the walk moves on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Comparison applied to the resolved field value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
}

/// Condition on a field of the evaluation context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct BranchCondition {
    /// Field name or dotted path (`customFields.loyaltyPoints`)
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub value: Value,
    /// Task whose execution result is consulted first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<Uuid>,
}

impl BranchCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            parent_task_id: None,
        }
    }

    pub fn after(mut self, parent_task_id: Uuid) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    /// Evaluate against context layers, searched in order. A missing field only
    /// satisfies NOT_EQUALS.
    pub fn evaluate(&self, layers: &[&Value]) -> bool {
        let found = layers.iter().find_map(|layer| lookup(layer, &self.field));

        let Some(actual) = found else {
            return self.operator == ConditionOperator::NotEquals;
        };

        match self.operator {
            ConditionOperator::Equals => loose_eq(actual, &self.value),
            ConditionOperator::NotEquals => !loose_eq(actual, &self.value),
            ConditionOperator::Contains => contains(actual, &self.value),
            ConditionOperator::GreaterThan => compare(actual, &self.value, |a, b| a > b),
            ConditionOperator::LessThan => compare(actual, &self.value, |a, b| a < b),
            ConditionOperator::Exists => !actual.is_null(),
        }
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = root.get(path) {
        return Some(v);
    }
    let mut current = root;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Equality that tolerates "5" vs 5 and "true" vs true
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) if !a.is_string() || !b.is_string() => x == y,
        _ => as_text(a).eq_ignore_ascii_case(&as_text(b)),
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    let needle = as_text(needle).to_lowercase();
    match actual {
        Value::Array(items) => items
            .iter()
            .any(|item| as_text(item).to_lowercase().contains(&needle)),
        other => as_text(other).to_lowercase().contains(&needle),
    }
}

fn compare(a: &Value, b: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => op(x, y),
        _ => false,
    }
}
