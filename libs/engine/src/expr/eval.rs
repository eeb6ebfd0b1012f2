//! Expression evaluation over JSON values
//!
//! Sequence semantics follow the JSON-query contract the mappings are
//! written against: a missing field is "no value" (`None`), never an error;
//! field navigation over an array maps over its items and flattens one
//! level; a block stage (`path.(expr)`) maps one-to-one and preserves
//! array-ness of its input.

use serde_json::{Map, Value};

use super::functions;
use super::parser::{BinaryOp, Expr, Stage, UnaryOp};
use super::ExprError;

const MAX_RANGE_LEN: usize = 1_000_000;

pub(crate) fn eval(expr: &Expr, ctx: &Value) -> Result<Option<Value>, ExprError> {
    match expr {
        Expr::Context => Ok(Some(ctx.clone())),

        Expr::Literal(value) => Ok(Some(value.clone())),

        Expr::Path { head, stages } => {
            let mut current = eval(head, ctx)?;
            for stage in stages {
                current = apply_stage(current, stage, ctx)?;
            }
            Ok(current)
        }

        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(value) = eval(item, ctx)? {
                    out.push(value);
                }
            }
            Ok(Some(Value::Array(out)))
        }

        Expr::Object(fields) => {
            let mut out = Map::new();
            for (key, value_expr) in fields {
                if let Some(value) = eval(value_expr, ctx)? {
                    out.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(out)))
        }

        Expr::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, ctx)?);
            }
            functions::call(name, evaluated)
        }

        Expr::Unary { op, expr } => match op {
            UnaryOp::Neg => match eval(expr, ctx)? {
                None => Ok(None),
                Some(Value::Number(n)) => {
                    let negated = -n.as_f64().unwrap_or(0.0);
                    Ok(Some(number(negated)?))
                }
                Some(other) => Err(ExprError::Type(format!(
                    "cannot negate {}",
                    type_name(&other)
                ))),
            },
        },

        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ctx),

        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let chosen = if truthy(&eval(cond, ctx)?) {
                Some(then)
            } else {
                otherwise.as_ref()
            };
            match chosen {
                Some(branch) => eval(branch, ctx),
                None => Ok(None),
            }
        }
    }
}

// =============================================================================
// Path stages
// =============================================================================

fn apply_stage(
    current: Option<Value>,
    stage: &Stage,
    _root: &Value,
) -> Result<Option<Value>, ExprError> {
    let Some(current) = current else {
        return Ok(None);
    };

    match stage {
        Stage::Field(name) => Ok(field(&current, name)),
        Stage::Block(expr) => apply_block(current, expr),
        Stage::Index(expr) => apply_index(current, expr),
    }
}

fn field(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(name).cloned(),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match field(item, name) {
                    Some(Value::Array(nested)) => out.extend(nested),
                    Some(v) => out.push(v),
                    None => {}
                }
            }
            sequence(out)
        }
        _ => None,
    }
}

fn apply_block(current: Value, expr: &Expr) -> Result<Option<Value>, ExprError> {
    match current {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(value) = eval(expr, &item)? {
                    out.push(value);
                }
            }
            Ok(Some(Value::Array(out)))
        }
        single => eval(expr, &single),
    }
}

fn apply_index(current: Value, expr: &Expr) -> Result<Option<Value>, ExprError> {
    // Numeric literal (possibly negated): positional index
    if let Some(index) = static_index(expr) {
        return Ok(select_index(&current, index));
    }

    // Range: multi-select by position, in range order
    if matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Range,
            ..
        }
    ) {
        let positions = eval(expr, &current)?;
        let Some(Value::Array(positions)) = positions else {
            return Ok(None);
        };
        let mut out = Vec::new();
        for position in positions {
            if let Some(index) = position.as_i64() {
                if let Some(selected) = select_index(&current, index) {
                    out.push(selected);
                }
            }
        }
        return Ok(sequence(out));
    }

    // Anything else is a per-item filter predicate
    match current {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                if truthy(&eval(expr, &item)?) {
                    out.push(item);
                }
            }
            Ok(sequence(out))
        }
        single => {
            if truthy(&eval(expr, &single)?) {
                Ok(Some(single))
            } else {
                Ok(None)
            }
        }
    }
}

fn static_index(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Literal(Value::Number(n)) => n.as_f64().map(|f| f as i64),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => static_index(expr).map(|i| -i),
        _ => None,
    }
}

fn select_index(value: &Value, index: i64) -> Option<Value> {
    match value {
        Value::Array(items) => {
            let len = items.len() as i64;
            let resolved = if index < 0 { len + index } else { index };
            if resolved < 0 || resolved >= len {
                None
            } else {
                Some(items[resolved as usize].clone())
            }
        }
        // A scalar is a singleton sequence: [0] and [-1] select it
        other => {
            if index == 0 || index == -1 {
                Some(other.clone())
            } else {
                None
            }
        }
    }
}

// =============================================================================
// Operators
// =============================================================================

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &Value,
) -> Result<Option<Value>, ExprError> {
    match op {
        BinaryOp::And => {
            let result = truthy(&eval(lhs, ctx)?) && truthy(&eval(rhs, ctx)?);
            Ok(Some(Value::Bool(result)))
        }
        BinaryOp::Or => {
            let result = truthy(&eval(lhs, ctx)?) || truthy(&eval(rhs, ctx)?);
            Ok(Some(Value::Bool(result)))
        }
        _ => {
            let left = eval(lhs, ctx)?;
            let right = eval(rhs, ctx)?;
            match op {
                BinaryOp::Eq => Ok(Some(Value::Bool(both_equal(&left, &right)))),
                BinaryOp::Ne => Ok(Some(Value::Bool(!both_equal(&left, &right)))),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    Ok(compare(op, &left, &right))
                }
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                    arithmetic(op, left, right)
                }
                BinaryOp::Concat => {
                    let mut text = stringify(&left);
                    text.push_str(&stringify(&right));
                    Ok(Some(Value::String(text)))
                }
                BinaryOp::Range => range(left, right),
                BinaryOp::In => Ok(Some(Value::Bool(contains(&left, &right)))),
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            }
        }
    }
}

fn both_equal(left: &Option<Value>, right: &Option<Value>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => values_equal(a, b),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(op: BinaryOp, left: &Option<Value>, right: &Option<Value>) -> Option<Value> {
    let ordering = match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            a.as_f64().partial_cmp(&b.as_f64())?
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => return None,
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => return None,
    };
    Some(Value::Bool(result))
}

fn arithmetic(
    op: BinaryOp,
    left: Option<Value>,
    right: Option<Value>,
) -> Result<Option<Value>, ExprError> {
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(None);
    };
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExprError::Type(format!(
            "cannot apply arithmetic to {} and {}",
            type_name(&left),
            type_name(&right)
        )));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ExprError::Type("division by zero".to_string()));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(ExprError::Type("modulo by zero".to_string()));
            }
            a % b
        }
        _ => unreachable!("non-arithmetic op"),
    };
    Ok(Some(number(result)?))
}

fn range(left: Option<Value>, right: Option<Value>) -> Result<Option<Value>, ExprError> {
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(None);
    };
    let (Some(start), Some(end)) = (
        left.as_f64().map(|f| f as i64),
        right.as_f64().map(|f| f as i64),
    ) else {
        return Err(ExprError::Type("range bounds must be integers".to_string()));
    };
    if start > end {
        return Ok(Some(Value::Array(Vec::new())));
    }
    let len = (end - start + 1) as usize;
    if len > MAX_RANGE_LEN {
        return Err(ExprError::Type(format!(
            "range produces {len} items (maximum {MAX_RANGE_LEN})"
        )));
    }
    let items = (start..=end).map(|n| Value::Number(n.into())).collect();
    Ok(Some(Value::Array(items)))
}

fn contains(left: &Option<Value>, right: &Option<Value>) -> bool {
    match (left, right) {
        (Some(needle), Some(Value::Array(haystack))) => {
            haystack.iter().any(|item| values_equal(needle, item))
        }
        (Some(a), Some(b)) => values_equal(a, b),
        _ => false,
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Collapse a result sequence: zero values is absence, one value unwraps
pub(crate) fn sequence(mut items: Vec<Value>) -> Option<Value> {
    match items.len() {
        0 => None,
        1 => Some(items.remove(0)),
        _ => Some(Value::Array(items)),
    }
}

/// Boolean coercion used by filters, ternaries, and logical operators
pub(crate) fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// String coercion used by `&` and `$string`
pub(crate) fn stringify(value: &Option<Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn number(value: f64) -> Result<Value, ExprError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ExprError::Type(format!("result is not a finite number: {value}")))
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
