use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value, json};

use crate::error::{Result, validation};
use crate::http::Transport;
use crate::registry::{ParamKind, ResourceSpec};

/// Keep RFC 3986 unreserved characters, encode everything else.
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// GET the collection path with every list parameter that resolves to a
/// present value (argument, else declared default). Absent values are
/// omitted from the query entirely.
pub fn list(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let mut query = Vec::new();
    for param in &res.list_params {
        let value = args.get(&param.arg).cloned().or_else(|| param.default.clone());
        match value {
            None | Some(Value::Null) => {}
            Some(value) => query.push((param.param.clone(), coerce(&param.arg, &value, param.kind)?)),
        }
    }
    transport.request("GET", &res.path, &query, None)
}

pub fn get(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let id = require_id(args)?;
    transport.request("GET", &item_path(res, &id), &[], None)
}

/// POST the declared body fields found in the arguments. Unknown argument
/// names are dropped; required-ness is advisory catalog metadata, so an
/// empty body still goes out.
pub fn create(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let body = collect_body(res, args);
    transport.request("POST", &res.path, &[], Some(Value::Object(body)))
}

pub fn update(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let id = require_id(args)?;
    let body = collect_body(res, args);
    if body.is_empty() {
        return Err(validation("At least one field to update is required"));
    }
    transport.request("PATCH", &item_path(res, &id), &[], Some(Value::Object(body)))
}

pub fn delete(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let id = require_id(args)?;
    let result = transport.request("DELETE", &item_path(res, &id), &[], None)?;
    Ok(or_success(result))
}

/// DELETE on the bare time-stat collection, filtered by whichever of
/// `date_from`/`date_to`/`related_task_id` are present.
pub fn time_stat_bulk_delete(
    transport: &dyn Transport,
    res: &ResourceSpec,
    args: &Map<String, Value>,
) -> Result<Value> {
    let mut query = Vec::new();
    for (arg, param) in [
        ("date_from", "dateFrom"),
        ("date_to", "dateTo"),
        ("related_task_id", "relatedTaskId"),
    ] {
        match args.get(arg) {
            None | Some(Value::Null) => {}
            Some(value) => query.push((param.to_string(), coerce(arg, value, ParamKind::Str)?)),
        }
    }
    let result = transport.request("DELETE", &res.path, &query, None)?;
    Ok(or_success(result))
}

fn item_path(res: &ResourceSpec, id: &str) -> String {
    format!("{}/{}", res.path, utf8_percent_encode(id, ID_SEGMENT))
}

fn require_id(args: &Map<String, Value>) -> Result<String> {
    match args.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(validation("id is required")),
    }
}

fn collect_body(res: &ResourceSpec, args: &Map<String, Value>) -> Map<String, Value> {
    let mut body = Map::new();
    for field in &res.body_fields {
        if let Some(value) = args.get(field) {
            body.insert(field.clone(), value.clone());
        }
    }
    body
}

/// Delete endpoints reply with an empty body; substitute a confirmation so
/// callers always receive a non-empty result.
fn or_success(result: Value) -> Value {
    let empty = match &result {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    };
    if empty { json!({"success": true}) } else { result }
}

/// Coerce one argument value into its query-string form.
fn coerce(arg: &str, value: &Value, kind: ParamKind) -> Result<String> {
    match kind {
        ParamKind::Int => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i.to_string())
                } else if let Some(u) = n.as_u64() {
                    Ok(u.to_string())
                } else {
                    Ok(((n.as_f64().unwrap_or_default()) as i64).to_string())
                }
            }
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map(|i| i.to_string())
                .map_err(|_| validation(format!("invalid integer for {arg}: {text}"))),
            Value::Bool(flag) => Ok((*flag as i64).to_string()),
            other => Err(validation(format!("invalid integer for {arg}: {other}"))),
        },
        ParamKind::Bool => {
            let flag = match value {
                Value::Bool(flag) => *flag,
                Value::String(text) => {
                    matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
                }
                Value::Number(n) => n.as_f64().unwrap_or_default() != 0.0,
                Value::Array(items) => !items.is_empty(),
                Value::Object(map) => !map.is_empty(),
                Value::Null => false,
            };
            Ok(if flag { "true" } else { "false" }.to_string())
        }
        ParamKind::Str => Ok(match value {
            Value::String(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        }),
    }
}
