mod catalog;
mod config;
mod dispatch;
mod error;
mod handlers;
mod http;
mod registry;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgGroup, Command};
use serde_json::{Map, Value};

use crate::config::ClientConfig;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Default to warn so retry notices show up without RUST_LOG set.
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    if matches.get_flag("list") {
        return write_stdout_line(&serde_json::to_string_pretty(&catalog::list_tools())?);
    }
    if let Some(name) = matches.get_one::<String>("describe") {
        let schema = catalog::describe_tool(name)?;
        return write_stdout_line(&serde_json::to_string_pretty(&schema)?);
    }
    if let Some(raw) = matches.get_one::<String>("call") {
        return handle_call(raw, matches.get_one::<String>("config"));
    }

    Err(anyhow!("one of --list, --describe or --call is required"))
}

fn build_cli() -> Command {
    Command::new("singularity")
        .about(
            "Singularity App CLI -- REST API client for task management, \
             projects, habits, kanban, notes, time tracking",
        )
        .arg_required_else_help(true)
        .arg(
            Arg::new("list")
                .long("list")
                .action(ArgAction::SetTrue)
                .help("List all available tools"),
        )
        .arg(
            Arg::new("describe")
                .long("describe")
                .value_name("TOOL")
                .help("Show tool schema by name"),
        )
        .arg(
            Arg::new("call")
                .long("call")
                .value_name("JSON")
                .help(r#"JSON tool call: {"tool":"...","arguments":{...}}"#),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Override the config.json location"),
        )
        .group(ArgGroup::new("mode").args(["list", "describe", "call"]))
}

fn handle_call(raw: &str, config_override: Option<&String>) -> Result<()> {
    let call: Value = serde_json::from_str(raw).context("invalid call JSON")?;
    let tool = call
        .get("tool")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!(r#"missing "tool" key in call JSON"#))?;
    let arguments: Map<String, Value> = match call.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(anyhow!(r#""arguments" must be a JSON object"#)),
    };

    // Resolve before touching the config so an unknown tool fails fast.
    let resolved = dispatch::resolve(tool)?;

    let cfg = match config_override {
        Some(path) => ClientConfig::load_from(Path::new(path))?,
        None => ClientConfig::load()?,
    };

    let client = http::HttpClient::new(&cfg)?;
    let result = resolved.invoke(&client, cfg.read_only, &arguments)?;
    write_stdout_line(&serde_json::to_string_pretty(&result)?)
}

fn write_stdout_line(value: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if let Err(err) = out.write_all(value.as_bytes()) {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    if let Err(err) = out.write_all(b"\n") {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    Ok(())
}
