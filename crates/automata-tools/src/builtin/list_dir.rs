// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{required_str, Tool, ToolCall, ToolOutput};

pub struct ListDirTool;

static EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    ".svn",
    "__pycache__",
    ".mypy_cache",
];

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List directory contents. depth: default 2, max 5. limit: 100 entries by default.\n\
         Excludes .git/ target/ node_modules/ __pycache__/. Directories have trailing /."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the directory"
                },
                "depth": {
                    "type": "integer",
                    "description": "Maximum recursion depth (default 2, max 5)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of entries to return (default 100)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match required_str(call, "path") {
            Ok(p) => PathBuf::from(p),
            Err(out) => return out,
        };
        let depth = call.args.get("depth").and_then(|v| v.as_u64()).unwrap_or(2).min(5) as usize;
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(100) as usize;

        debug!(path = %path.display(), depth, limit, "list_dir tool");

        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return ToolOutput::err(&call.id, format!("not a directory: {}", path.display()))
            }
            Err(e) => {
                return ToolOutput::err(&call.id, format!("cannot access {}: {e}", path.display()))
            }
        }

        let (entries, truncated) = match collect_entries(&path, depth, limit).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("list error: {e}")),
        };

        if entries.is_empty() {
            return ToolOutput::ok(&call.id, "(empty directory)");
        }

        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n...[output truncated at {limit} entries]"));
        }
        ToolOutput::ok(&call.id, output)
    }
}

/// Breadth-first walk below `root`, at most `depth` levels deep.  Entries
/// are relative to `root`, sorted within each directory.
async fn collect_entries(
    root: &Path,
    depth: usize,
    limit: usize,
) -> std::io::Result<(Vec<String>, bool)> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);

    while let Some((dir, level)) = queue.pop_front() {
        let mut rd = tokio::fs::read_dir(&dir).await?;
        let mut children = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await?.is_dir();
            if is_dir && EXCLUDED_DIRS.contains(&name.as_str()) {
                continue;
            }
            children.push((entry.path(), is_dir));
        }
        children.sort();

        for (child, is_dir) in children {
            if out.len() >= limit {
                return Ok((out, true));
            }
            let rel = child.strip_prefix(root).unwrap_or(&child).display().to_string();
            if is_dir {
                out.push(format!("{rel}/"));
                if level + 1 < depth {
                    queue.push_back((child, level + 1));
                }
            } else {
                out.push(rel);
            }
        }
    }
    Ok((out, false))
}
