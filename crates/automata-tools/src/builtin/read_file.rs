use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{required_str, Tool, ToolCall, ToolOutput};

const READ_LIMIT: usize = 200_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file from the local filesystem. Lines in the output are numbered \
         starting at 1. Optionally specify a line offset and limit for large files. \
         If the file exists but has empty contents, 'File is empty.' is returned."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-indexed line number to start reading from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match required_str(call, "path") {
            Ok(p) => p,
            Err(out) => return out,
        };
        let offset = call.args.get("offset").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(2000) as usize;

        debug!(path = %path, offset, limit, "read_file tool");

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };
        let text = String::from_utf8_lossy(&bytes);
        if text.is_empty() {
            return ToolOutput::ok(&call.id, "File is empty.");
        }
        let capped = if text.len() > READ_LIMIT {
            let mut cut = READ_LIMIT;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...[file truncated at {} bytes]", &text[..cut], text.len())
        } else {
            text.to_string()
        };

        let start = offset.saturating_sub(1);
        let lines: Vec<&str> = capped.lines().collect();
        let total = lines.len();

        let selected: Vec<String> = lines
            .into_iter()
            .enumerate()
            .skip(start)
            .take(limit)
            .map(|(i, line)| format!("L{}:{}", i + 1, line))
            .collect();

        let mut content = selected.join("\n");
        let shown = limit.min(total.saturating_sub(start));
        if start + shown < total {
            content.push_str(&format!(
                "\n...[{} more lines, use offset={} to continue]",
                total - start - shown,
                start + shown + 1
            ));
        }

        ToolOutput::ok(&call.id, content)
    }
}
