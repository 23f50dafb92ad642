use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::catalog;
use crate::error::{Error, Result, validation};
use crate::handlers;
use crate::http::Transport;
use crate::registry::{self, ResourceSpec};

/// The closed set of handlers a tool can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Delete,
    TimeStatBulkDelete,
}

const CRUD_ACTIONS: &[(&str, Action)] = &[
    ("list", Action::List),
    ("get", Action::Get),
    ("create", Action::Create),
    ("update", Action::Update),
    ("delete", Action::Delete),
];

const WRITE_SUFFIXES: &[&str] = &["_create", "_update", "_delete", "_bulk_delete"];

/// tool name -> (resource key, action). Rows are synthesized for every
/// resource × CRUD action whose name exists in the catalog, keeping schema
/// introspection and execution consistent, plus the one hand-wired
/// bulk-delete row.
static DISPATCH: Lazy<BTreeMap<String, (String, Action)>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    for key in registry::resources().keys() {
        for (suffix, action) in CRUD_ACTIONS {
            let tool = format!("{key}_{suffix}");
            if catalog::find(&tool).is_some() {
                table.insert(tool, (key.clone(), *action));
            }
        }
    }
    table.insert(
        "time_stat_bulk_delete".to_string(),
        ("time_stat".to_string(), Action::TimeStatBulkDelete),
    );
    table
});

/// Catalog tool names whose suffix denotes a mutating action. Consulted by
/// the read-only gate before any handler runs.
static WRITE_TOOLS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    catalog::tools()
        .iter()
        .filter(|tool| WRITE_SUFFIXES.iter().any(|suffix| tool.name.ends_with(suffix)))
        .map(|tool| tool.name.as_str())
        .collect()
});

pub fn is_write_tool(name: &str) -> bool {
    WRITE_TOOLS.contains(name)
}

/// A tool call resolved against the dispatch table, ready to invoke.
#[derive(Debug)]
pub struct Resolved {
    tool: String,
    resource: &'static ResourceSpec,
    action: Action,
}

pub fn resolve(tool: &str) -> Result<Resolved> {
    let (res_key, action) = DISPATCH
        .get(tool)
        .ok_or_else(|| validation(format!("Unknown tool: {tool}\nUse --list to see available tools")))?;
    let resource = registry::find(res_key)
        .ok_or_else(|| validation(format!("unknown resource: {res_key}")))?;
    Ok(Resolved {
        tool: tool.to_string(),
        resource,
        action: *action,
    })
}

impl Resolved {
    /// Run the handler. The read-only gate fires before the handler, so a
    /// rejected write never reaches the transport.
    pub fn invoke(
        &self,
        transport: &dyn Transport,
        read_only: bool,
        args: &Map<String, Value>,
    ) -> Result<Value> {
        if read_only && is_write_tool(&self.tool) {
            return Err(Error::Policy(format!(
                "tool '{}' is a write operation, but config has read_only=true",
                self.tool
            )));
        }
        match self.action {
            Action::List => handlers::list(transport, self.resource, args),
            Action::Get => handlers::get(transport, self.resource, args),
            Action::Create => handlers::create(transport, self.resource, args),
            Action::Update => handlers::update(transport, self.resource, args),
            Action::Delete => handlers::delete(transport, self.resource, args),
            Action::TimeStatBulkDelete => {
                handlers::time_stat_bulk_delete(transport, self.resource, args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::testing::RecordingTransport;

    #[test]
    fn every_dispatch_row_has_a_catalog_entry() {
        for tool in DISPATCH.keys() {
            assert!(catalog::find(tool).is_some(), "{tool} missing from catalog");
        }
    }

    #[test]
    fn every_resource_action_pair_in_the_catalog_is_dispatchable() {
        for key in registry::resources().keys() {
            for (suffix, action) in CRUD_ACTIONS {
                let tool = format!("{key}_{suffix}");
                if catalog::find(&tool).is_some() {
                    let (res_key, dispatched) =
                        DISPATCH.get(&tool).unwrap_or_else(|| panic!("{tool} not dispatchable"));
                    assert_eq!(res_key, key);
                    assert_eq!(dispatched, action);
                }
            }
        }
    }

    #[test]
    fn bulk_delete_is_hand_wired_to_time_stat() {
        let (res_key, action) = DISPATCH.get("time_stat_bulk_delete").unwrap();
        assert_eq!(res_key, "time_stat");
        assert_eq!(*action, Action::TimeStatBulkDelete);
    }

    #[test]
    fn write_set_matches_mutating_suffixes() {
        assert!(is_write_tool("task_create"));
        assert!(is_write_tool("task_update"));
        assert!(is_write_tool("task_delete"));
        assert!(is_write_tool("time_stat_bulk_delete"));
        assert!(!is_write_tool("task_list"));
        assert!(!is_write_tool("task_get"));
    }

    #[test]
    fn read_only_gate_blocks_writes_before_any_network_call() {
        let transport = RecordingTransport::returning(json!({}));
        let call = resolve("task_delete").unwrap();
        let err = call
            .invoke(&transport, true, &json!({"id": "T-1"}).as_object().unwrap().clone())
            .unwrap_err();
        assert!(matches!(err, Error::Policy(_)), "got {err:?}");
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn read_only_gate_lets_reads_through() {
        let transport = RecordingTransport::returning(json!({"items": []}));
        let call = resolve("task_list").unwrap();
        let result = call.invoke(&transport, true, &Map::new()).unwrap();
        assert_eq!(result, json!({"items": []}));
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn unknown_tool_is_a_validation_error() {
        let err = resolve("task_frobnicate").unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
        assert!(err.to_string().contains("Unknown tool: task_frobnicate"));
    }
}
