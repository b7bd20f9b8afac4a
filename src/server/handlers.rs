//! Tool call handlers mapping MCP tools onto the session controller.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::SharedState;
use crate::error::{McpError, McpResult};
use crate::model::{ThoughtRecord, ThoughtStage};

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "process_thought" => handle_process_thought(state, arguments).await,
        "generate_summary" => handle_generate_summary(state).await,
        "clear_history" => handle_clear_history(state).await,
        "export_session" => handle_export_session(state, arguments).await,
        "import_session" => handle_import_session(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ProcessThoughtParams {
    thought: String,
    thought_number: i64,
    total_thoughts: i64,
    next_thought_needed: bool,
    stage: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    axioms_used: Vec<String>,
    #[serde(default)]
    assumptions_challenged: Vec<String>,
    #[serde(default = "default_true")]
    generate_critical_response: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FilePathParams {
    file_path: PathBuf,
}

/// Handle process_thought: record, analyze, optionally critique
async fn handle_process_thought(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: ProcessThoughtParams = parse_arguments("process_thought", arguments)?;

    let invalid = |message: String| McpError::InvalidParameters {
        tool_name: "process_thought".to_string(),
        message,
    };

    let stage = ThoughtStage::from_str(&params.stage).map_err(|e| invalid(e.to_string()))?;
    let record = ThoughtRecord::new(
        params.thought_number,
        &params.thought,
        stage,
        params.total_thoughts,
    )
    .map_err(|e| invalid(e.to_string()))?
    .with_tags(params.tags)
    .with_axioms(params.axioms_used)
    .with_assumptions(params.assumptions_challenged);

    let processed = state.controller.record(record)?;

    // The critic is advisory: a failed or absent critique never fails the tool
    let critique = if params.generate_critical_response {
        match state.critic.critique(&processed.thought).await {
            Ok(critique) => critique,
            Err(e) => {
                warn!(error = %e, "Critique unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let mut result = serde_json::to_value(&processed)?;
    if let Value::Object(ref mut map) = result {
        map.insert(
            "next_thought_needed".to_string(),
            Value::Bool(params.next_thought_needed),
        );
        if let Some(critique) = critique {
            map.insert("criticalResponse".to_string(), Value::String(critique));
        }
    }

    Ok(result)
}

/// Handle generate_summary
async fn handle_generate_summary(state: &SharedState) -> McpResult<Value> {
    let summary = state.controller.summary()?;
    Ok(serde_json::to_value(&summary)?)
}

/// Handle clear_history
async fn handle_clear_history(state: &SharedState) -> McpResult<Value> {
    state.controller.clear()?;
    Ok(serde_json::json!({
        "status": "cleared"
    }))
}

/// Handle export_session
async fn handle_export_session(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: FilePathParams = parse_arguments("export_session", arguments)?;
    state.controller.export_to(&params.file_path)?;
    Ok(serde_json::json!({
        "status": "exported",
        "file_path": params.file_path,
    }))
}

/// Handle import_session
async fn handle_import_session(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: FilePathParams = parse_arguments("import_session", arguments)?;
    let imported = state.controller.import_from(&params.file_path)?;
    Ok(serde_json::json!({
        "status": "imported",
        "file_path": params.file_path,
        "thoughts": imported,
    }))
}

/// Parse tool arguments into a typed structure
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
