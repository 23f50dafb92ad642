use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;

/// One REST resource: its collection path, the query parameters its list
/// endpoint accepts, and the fields its create/update body accepts.
#[derive(Debug, Deserialize, Clone)]
pub struct ResourceSpec {
    pub key: String,
    pub path: String,
    #[serde(default)]
    pub list_params: Vec<ListParam>,
    #[serde(default)]
    pub body_fields: Vec<String>,
}

/// Mapping from one API query parameter to the tool argument that feeds it.
#[derive(Debug, Deserialize, Clone)]
pub struct ListParam {
    /// Query-parameter name on the wire (camelCase).
    pub param: String,
    /// Argument name in tool calls (snake_case).
    pub arg: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Bool,
    Str,
}

static REGISTRY: Lazy<BTreeMap<String, ResourceSpec>> = Lazy::new(|| {
    let raw = include_str!("../schemas/resources.json");
    let specs: Vec<ResourceSpec> = serde_json::from_str(raw).expect("invalid resources.json");
    specs.into_iter().map(|spec| (spec.key.clone(), spec)).collect()
});

pub fn resources() -> &'static BTreeMap<String, ResourceSpec> {
    &REGISTRY
}

pub fn find(key: &str) -> Option<&'static ResourceSpec> {
    REGISTRY.get(key)
}
