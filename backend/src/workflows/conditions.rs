// Workflow Conditions - AND-combined field tests against an event payload
//
// Evaluation never fails: a missing or malformed field makes the comparison
// false, except for eq/neq where a missing field compares as the empty string.

use automation_shared::{Condition, ConditionOp, ConditionValue};
use serde_json::{Number, Value};

use super::triggers::{lookup, TriggerEvent};

/// True when every condition holds; an empty list always matches
pub fn matches(conditions: &[Condition], event: &TriggerEvent) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, &event.payload))
}

pub fn evaluate(condition: &Condition, payload: &Value) -> bool {
    compare(condition.op, lookup(payload, &condition.field), &condition.value)
}

/// Operator dispatch; `left` is `None` when the field path does not resolve
pub fn compare(op: ConditionOp, left: Option<&Value>, right: &ConditionValue) -> bool {
    match op {
        ConditionOp::Eq => equals(left, right),
        ConditionOp::Neq => !equals(left, right),
        ConditionOp::Gt => numeric(left, right, |a, b| a > b),
        ConditionOp::Gte => numeric(left, right, |a, b| a >= b),
        ConditionOp::Lt => numeric(left, right, |a, b| a < b),
        ConditionOp::Lte => numeric(left, right, |a, b| a <= b),
        ConditionOp::Contains => contains(left, right),
    }
}

fn equals(left: Option<&Value>, right: &ConditionValue) -> bool {
    if let (Some(a), Some(b)) = (left_number(left), right_number(right)) {
        return a == b;
    }
    left_text(left) == right_text(right)
}

fn numeric(left: Option<&Value>, right: &ConditionValue, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (left_number(left), right_number(right)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn contains(left: Option<&Value>, right: &ConditionValue) -> bool {
    match left {
        Some(Value::Array(items)) => items.iter().any(|item| equals(Some(item), right)),
        Some(Value::Object(_)) | Some(Value::Null) | None => false,
        Some(value) => left_text(Some(value)).contains(&right_text(right)),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn left_number(left: Option<&Value>) -> Option<f64> {
    match left? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn right_number(right: &ConditionValue) -> Option<f64> {
    match right {
        ConditionValue::Number(n) => n.as_f64(),
        ConditionValue::String(s) => parse_number(s),
        ConditionValue::Bool(_) => None,
    }
}

fn number_text(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        // 5000.0 reads as "5000", the way the CRM UI renders it
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn left_text(left: Option<&Value>) -> String {
    match left {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => number_text(n),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn right_text(right: &ConditionValue) -> String {
    match right {
        ConditionValue::String(s) => s.clone(),
        ConditionValue::Number(n) => number_text(n),
        ConditionValue::Bool(b) => b.to_string(),
    }
}
