//! Builtin expression functions

use serde_json::Value;

use super::eval::{number, stringify, truthy, type_name};
use super::ExprError;

pub(crate) fn call(name: &str, args: Vec<Option<Value>>) -> Result<Option<Value>, ExprError> {
    match name {
        "keys" => unary(name, args).map(keys),
        "count" => unary(name, args).map(count),
        "sum" => unary(name, args).and_then(sum),
        "string" => unary(name, args).map(|arg| Some(Value::String(stringify(&arg)))),
        "number" => unary(name, args).and_then(to_number),
        "exists" => unary(name, args).map(|arg| Some(Value::Bool(arg.is_some()))),
        "not" => unary(name, args).map(|arg| Some(Value::Bool(!truthy(&arg)))),
        "uppercase" => unary(name, args).and_then(|arg| casing(arg, str::to_uppercase)),
        "lowercase" => unary(name, args).and_then(|arg| casing(arg, str::to_lowercase)),
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn unary(name: &str, mut args: Vec<Option<Value>>) -> Result<Option<Value>, ExprError> {
    if args.len() != 1 {
        return Err(ExprError::Type(format!(
            "function ${name} expects 1 argument, got {}",
            args.len()
        )));
    }
    Ok(args.remove(0))
}

/// `$keys`: field names of an object, or the union of field names across an
/// array of objects (first-seen order)
fn keys(arg: Option<Value>) -> Option<Value> {
    match arg {
        Some(Value::Object(map)) => Some(Value::Array(
            map.keys().map(|k| Value::String(k.clone())).collect(),
        )),
        Some(Value::Array(items)) => {
            let mut seen = Vec::new();
            for item in items {
                if let Value::Object(map) = item {
                    for key in map.keys() {
                        if !seen.contains(key) {
                            seen.push(key.clone());
                        }
                    }
                }
            }
            Some(Value::Array(seen.into_iter().map(Value::String).collect()))
        }
        _ => None,
    }
}

/// `$count`: length of a sequence; scalars count as 1, absence as 0
fn count(arg: Option<Value>) -> Option<Value> {
    let n = match arg {
        None => 0,
        Some(Value::Array(items)) => items.len(),
        Some(_) => 1,
    };
    Some(Value::Number((n as u64).into()))
}

fn sum(arg: Option<Value>) -> Result<Option<Value>, ExprError> {
    match arg {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
        Some(Value::Array(items)) => {
            let mut total = 0.0;
            for item in &items {
                match item.as_f64() {
                    Some(value) => total += value,
                    None => {
                        return Err(ExprError::Type(format!(
                            "$sum over non-number item of type {}",
                            type_name(item)
                        )));
                    }
                }
            }
            number(total).map(Some)
        }
        Some(other) => Err(ExprError::Type(format!(
            "$sum expects numbers, got {}",
            type_name(&other)
        ))),
    }
}

fn to_number(arg: Option<Value>) -> Result<Option<Value>, ExprError> {
    match arg {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
        Some(Value::Bool(b)) => Ok(Some(Value::Number(u64::from(b).into()))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ExprError::Type(format!("cannot convert '{s}' to a number")))
            .and_then(number)
            .map(Some),
        Some(other) => Err(ExprError::Type(format!(
            "cannot convert {} to a number",
            type_name(&other)
        ))),
    }
}

fn casing(arg: Option<Value>, f: impl Fn(&str) -> String) -> Result<Option<Value>, ExprError> {
    match arg {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(Value::String(f(&s)))),
        Some(other) => Err(ExprError::Type(format!(
            "expected a string, got {}",
            type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_of_object() {
        let result = call("keys", vec![Some(json!({"a": 1, "b": 2}))]).unwrap();
        assert_eq!(result, Some(json!(["a", "b"])));
    }

    #[test]
    fn test_keys_union_over_array() {
        let result = call(
            "keys",
            vec![Some(json!([{"a": 1}, {"b": 2}, {"a": 3}]))],
        )
        .unwrap();
        assert_eq!(result, Some(json!(["a", "b"])));
    }

    #[test]
    fn test_count_and_sum() {
        assert_eq!(call("count", vec![None]).unwrap(), Some(json!(0)));
        assert_eq!(
            call("count", vec![Some(json!([1, 2, 3]))]).unwrap(),
            Some(json!(3))
        );
        assert_eq!(
            call("sum", vec![Some(json!([1, 2, 3.5]))]).unwrap(),
            Some(json!(6.5))
        );
        assert!(call("sum", vec![Some(json!(["x"]))]).is_err());
    }

    #[test]
    fn test_string_and_number() {
        assert_eq!(
            call("string", vec![Some(json!(42))]).unwrap(),
            Some(json!("42"))
        );
        assert_eq!(
            call("number", vec![Some(json!("3.5"))]).unwrap(),
            Some(json!(3.5))
        );
        assert!(call("number", vec![Some(json!("abc"))]).is_err());
    }

    #[test]
    fn test_exists_and_not() {
        assert_eq!(call("exists", vec![None]).unwrap(), Some(json!(false)));
        assert_eq!(
            call("exists", vec![Some(json!(null))]).unwrap(),
            Some(json!(true))
        );
        assert_eq!(call("not", vec![None]).unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_unknown_function() {
        assert!(matches!(
            call("nope", vec![None]),
            Err(ExprError::UnknownFunction(_))
        ));
    }
}
