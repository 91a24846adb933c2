// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{required_str, Tool, ToolCall, ToolOutput};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes a file to the local filesystem, overwriting any existing file at the path. \
         Creates parent directories automatically. \
         Set append=true to add to the end of an existing file instead of overwriting."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                },
                "append": {
                    "type": "boolean",
                    "description": "If true, append to existing content instead of overwriting (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match required_str(call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        let content = match required_str(call, "content") {
            Ok(c) => c,
            Err(out) => return out,
        };
        let append = call.args.get("append").and_then(|v| v.as_bool()).unwrap_or(false);

        debug!(path = %path, append, "write_file tool");

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolOutput::err(&call.id, format!("create dir error: {e}"));
                }
            }
        }

        if append {
            match append_to(path, content).await {
                Ok(()) => {
                    ToolOutput::ok(&call.id, format!("appended {} bytes to {path}", content.len()))
                }
                Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
            }
        } else {
            match tokio::fs::write(path, content).await {
                Ok(_) => {
                    ToolOutput::ok(&call.id, format!("wrote {} bytes to {path}", content.len()))
                }
                Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
            }
        }
    }
}

/// tokio::fs::File completes writes in the background; the flush reports
/// their outcome.
async fn append_to(path: &str, content: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut f = tokio::fs::OpenOptions::new().append(true).create(true).open(path).await?;
    f.write_all(content.as_bytes()).await?;
    f.flush().await
}
