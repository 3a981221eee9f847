//! Registers a notebook toolkit, discovers tools from a linked extension, and
//! dispatches a few calls against them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use server_ai_tools::config::ServerToolsConfig;
use server_ai_tools::kernel::{
    DiscoveryMode, Extension, ExtensionRegistration, InventoryExtensionLoader, ProviderResult,
    ToolProvider,
};
use server_ai_tools::primitives::Permissions;
use server_ai_tools::registry::{ToolResult, ToolSpec, Toolkit, tool};
use server_ai_tools::telemetry::init_tracing;
use server_ai_tools::{DiscoveredToolsPayload, ServerToolsApp};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Server AI tools walkthrough")]
struct Args {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report tool metadata only, whatever the configured discovery mode.
    #[arg(long)]
    metadata_only: bool,
}

/// Greets a user by name
#[tool(crate = "server_ai_tools::registry")]
fn say_hello(user: String) -> String {
    format!("Hello {user}")
}

/// Counts the words in a cell
#[tool(crate = "server_ai_tools::registry")]
fn word_count(source: String) -> usize {
    source.split_whitespace().count()
}

/// Clears every output of a notebook
#[tool(crate = "server_ai_tools::registry")]
async fn clear_outputs(notebook: String) -> Result<String, String> {
    if notebook.ends_with(".ipynb") {
        Ok(format!("cleared {notebook}"))
    } else {
        Err(format!("{notebook} is not a notebook"))
    }
}

struct NotebookExtension;

impl ToolProvider for NotebookExtension {
    fn list_tools(&self) -> ProviderResult<Vec<ToolResult<ToolSpec>>> {
        Ok(vec![
            ToolSpec::new(say_hello_tool()),
            ToolSpec::new(word_count_tool())
                .map(|spec| spec.with_permissions(Permissions::NONE.with_read())),
            ToolSpec::new(clear_outputs_tool()).map(|spec| {
                spec.with_permissions(Permissions::NONE.with_write().with_delete())
            }),
        ])
    }
}

impl Extension for NotebookExtension {
    fn name(&self) -> &str {
        "notebook"
    }

    fn tool_provider(&self) -> Option<&dyn ToolProvider> {
        Some(self)
    }
}

fn notebook_extension() -> Arc<dyn Extension> {
    Arc::new(NotebookExtension)
}

server_ai_tools::kernel::inventory::submit! {
    ExtensionRegistration::new("notebook_tools", notebook_extension)
}

fn load_config(args: &Args) -> Result<ServerToolsConfig> {
    let mut config = match &args.config {
        Some(path) => ServerToolsConfig::load(path)?,
        None => ServerToolsConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(config.telemetry())?;

    let app = ServerToolsApp::new(InventoryExtensionLoader, &config)?;
    let routes = app.routes();
    info!(toolkits = %routes.toolkits, tools = %routes.tools, "routes ready");

    let mut toolkit = Toolkit::new("notebook");
    toolkit.add_tool(
        ToolSpec::new(word_count_tool())?.with_permissions(Permissions::NONE.with_read()),
    )?;
    toolkit.add_tool(
        ToolSpec::new(clear_outputs_tool())?
            .with_permissions(Permissions::NONE.with_write().with_delete()),
    )?;
    app.register_toolkit(toolkit)?;

    let read_only = app.get_toolkit("notebook", Permissions::NONE.with_read())?;
    info!(tools = ?read_only.tools().names(), "read-only notebook tools");

    println!("{}", serde_json::to_string_pretty(&app.toolkits_payload())?);
    let discovered = if args.metadata_only {
        DiscoveredToolsPayload {
            discovered_tools: app
                .discovery()
                .discover_as(&app.extension_ids(), DiscoveryMode::MetadataOnly),
        }
    } else {
        app.discovered_tools_payload()
    };
    println!("{}", serde_json::to_string_pretty(&discovered)?);

    let outcomes = app
        .run_calls(&[
            json!({"name": "say_hello", "input": {"user": "Abigayle"}}),
            json!({"name": "word_count", "input": {"source": "import numpy as np"}}),
            json!({"name": "clear_outputs", "input": {"notebook": "README.md"}}),
            json!({"name": "restart_kernel"}),
        ])
        .await?;

    for outcome in outcomes {
        match outcome {
            Ok(value) => println!("ok: {value}"),
            Err(err) => println!("error: {}", serde_json::to_string(&err)?),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_tools_resolve_through_the_facade() {
        let specs = NotebookExtension.list_tools().expect("tools");
        let names: Vec<_> = specs
            .iter()
            .map(|spec| spec.as_ref().expect("spec").name().to_owned())
            .collect();
        assert_eq!(names, ["say_hello", "word_count", "clear_outputs"]);

        let word_count = ToolSpec::new(word_count_tool()).expect("spec");
        assert_eq!(word_count.input_schema().required(), ["source"]);
    }
}
