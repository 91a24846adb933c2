// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use automata_config::AutomataAgentConfig;
use automata_tools::ToolRegistry;

/// Substitute `{{key}}` placeholders in `content` using the provided `vars`.
/// Keys are looked up case-sensitively.  Unknown placeholders are left as-is.
/// Substituted values are never scanned again.
pub fn apply_template(content: &str, vars: &HashMap<String, String>) -> String {
    if vars.is_empty() || !content.contains("{{") {
        return content.to_string();
    }

    let mut result = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}").and_then(|close| vars.get(&after[..close]).map(|v| (close, v))) {
            Some((close, value)) => {
                result.push_str(value);
                rest = &after[close + 2..];
            }
            None => {
                result.push_str("{{");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// One `- name: description` line per registered tool, sorted by name.
pub fn tool_listing(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return "(none)".to_string();
    }
    tools
        .schemas()
        .iter()
        .map(|s| {
            let first_line = s.description.lines().next().unwrap_or_default();
            format!("- {}: {}", s.name, first_line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the system prompt for an agent.
///
/// `{{tools}}` and `{{max_iters}}` are always available and take precedence
/// over same-named entries in `system_template_variables`.
pub fn system_prompt(config: &AutomataAgentConfig, tools: &ToolRegistry) -> String {
    let mut vars = config.system_template_variables.clone();
    vars.insert("tools".into(), tool_listing(tools));
    vars.insert("max_iters".into(), config.max_iters.to_string());
    apply_template(&config.system_template, &vars).trim_end().to_string()
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
