// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI chat-completions driver.
//!
//! Streams server-sent events when the request asks for streaming and parses
//! a single JSON body otherwise.  Both paths yield the same
//! [`ResponseEvent`] sequence.

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    provider::ResponseStream, CompletionRequest, Message, MessageContent, ResponseEvent, Role,
};

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// `base_url` ends **before** `/chat/completions`; `None` targets the
    /// public OpenAI API.
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.as_deref().unwrap_or("https://api.openai.com/v1");
        Self {
            model,
            api_key,
            chat_url: format!("{}/chat/completions", base.trim_end_matches('/')),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.7),
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, req: &CompletionRequest) -> Value {
        let tools: Vec<Value> = req.tools.iter().map(|t| json!({
            "type": "function",
            "function": {
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            }
        })).collect();

        let mut body = json!({
            "model": self.model,
            "messages": build_openai_messages(&req.messages),
            "stream": req.stream,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if req.stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let body = self.request_body(&req);

        debug!(
            model = %self.model,
            tool_count = req.tools.len(),
            message_count = req.messages.len(),
            stream = req.stream,
            "sending completion request"
        );
        tracing::trace!(request_body = ?body, "full completion request");

        let resp = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("openai error {status}: {text}");
        }

        if !req.stream {
            let v: Value = resp.json().await.context("decoding openai response")?;
            let events: Vec<anyhow::Result<ResponseEvent>> =
                parse_full_response(&v)?.into_iter().map(Ok).collect();
            return Ok(Box::pin(futures::stream::iter(events)));
        }

        // SSE events can be split across multiple TCP packets, possibly inside a
        // UTF-8 sequence.  Buffer raw bytes; decode only complete lines.
        let event_stream = resp
            .bytes_stream()
            .scan(Vec::new(), |buf: &mut Vec<u8>, chunk| {
                let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                    Ok(b) => {
                        buf.extend_from_slice(&b);
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn role_str(r: &Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Convert the conversation into the OpenAI wire format.
///
/// Consecutive assistant tool-call messages are folded into one assistant
/// message carrying a `tool_calls` array, which the API requires.
fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len());
    for m in messages {
        match &m.content {
            MessageContent::Text(t) => {
                out.push(json!({ "role": role_str(&m.role), "content": t }));
            }
            MessageContent::ToolCall { tool_call_id, function } => {
                let call = json!({
                    "id": tool_call_id,
                    "type": "function",
                    "function": { "name": function.name, "arguments": function.arguments },
                });
                let appended = out
                    .last_mut()
                    .filter(|prev| prev["role"] == "assistant")
                    .and_then(|prev| prev.get_mut("tool_calls"))
                    .and_then(|calls| calls.as_array_mut())
                    .map(|calls| calls.push(call.clone()))
                    .is_some();
                if !appended {
                    out.push(json!({
                        "role": "assistant",
                        "content": Value::Null,
                        "tool_calls": [call],
                    }));
                }
            }
            MessageContent::ToolResult { tool_call_id, content } => {
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                }));
            }
        }
    }
    out
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comment lines, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<ResponseEvent>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    if let Some(err) = api_error(&v) {
        return Some(Err(err));
    }
    parse_sse_chunk(&v).map(Ok)
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line is left in `buf` so it can be extended by
/// the next TCP chunk.
pub(crate) fn drain_complete_sse_lines(buf: &mut Vec<u8>) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=nl_pos).collect();
        let line = String::from_utf8_lossy(&raw[..nl_pos]);
        if let Some(ev) = parse_sse_data_line(line.trim_end_matches('\r')) {
            events.push(ev);
        }
    }
    events
}

fn parse_usage(usage: &Value) -> ResponseEvent {
    ResponseEvent::Usage {
        input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

fn parse_sse_chunk(v: &Value) -> Option<ResponseEvent> {
    // Usage-only chunk (emitted when stream_options.include_usage = true)
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return Some(parse_usage(usage));
    }

    let delta = &v["choices"][0]["delta"];

    // Each SSE chunk carries at most one tool-call delta in practice; the
    // index routes accumulation in the agent.
    if let Some(tc) = delta.get("tool_calls").and_then(|t| t.get(0)) {
        return Some(ResponseEvent::ToolCall {
            index: tc["index"].as_u64().unwrap_or(0) as u32,
            id: tc["id"].as_str().unwrap_or("").to_string(),
            name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
            arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
        });
    }

    delta
        .get("content")
        .and_then(|c| c.as_str())
        .map(|text| ResponseEvent::TextDelta(text.to_string()))
}

/// Error object carried in a 200 response body or an SSE chunk.
fn api_error(v: &Value) -> Option<anyhow::Error> {
    let err = v.get("error").filter(|e| !e.is_null())?;
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    Some(anyhow::anyhow!("openai error: {message}"))
}

/// Translate a non-streamed completion body into the streamed event shape.
fn parse_full_response(v: &Value) -> anyhow::Result<Vec<ResponseEvent>> {
    if let Some(err) = api_error(v) {
        return Err(err);
    }
    let mut events = Vec::new();
    let message = &v["choices"][0]["message"];

    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            events.push(ResponseEvent::TextDelta(text.to_string()));
        }
    }
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for (i, tc) in calls.iter().enumerate() {
            events.push(ResponseEvent::ToolCall {
                index: i as u32,
                id: tc["id"].as_str().unwrap_or("").to_string(),
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
            });
        }
    }
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        events.push(parse_usage(usage));
    }
    events.push(ResponseEvent::Done);
    Ok(events)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionRequest, ToolSchema};

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new("gpt-4o".into(), "sk-test".into(), None, Some(256), Some(0.1))
    }

    #[test]
    fn chat_url_is_derived_from_base() {
        let p = OpenAiProvider::new(
            "m".into(),
            "k".into(),
            Some("http://localhost:8080/v1/".into()),
            None,
            None,
        );
        assert_eq!(p.chat_url, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn body_includes_tools_only_when_present() {
        let p = provider();
        let mut req =
            CompletionRequest { messages: vec![Message::user("hi")], ..Default::default() };
        assert!(p.request_body(&req).get("tools").is_none());

        req.tools.push(ToolSchema {
            name: "read_file".into(),
            description: "reads".into(),
            parameters: json!({ "type": "object" }),
        });
        let body = p.request_body(&req);
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn stream_options_only_when_streaming() {
        let p = provider();
        let req = CompletionRequest { stream: true, ..Default::default() };
        assert_eq!(p.request_body(&req)["stream_options"]["include_usage"], true);
        let req = CompletionRequest { stream: false, ..Default::default() };
        assert!(p.request_body(&req).get("stream_options").is_none());
    }

    #[test]
    fn consecutive_tool_calls_fold_into_one_assistant_message() {
        let msgs = vec![
            Message::user("go"),
            Message::tool_call("a", "read_file", "{}"),
            Message::tool_call("b", "list_dir", "{}"),
            Message::tool_result("a", "x"),
            Message::tool_result("b", "y"),
        ];
        let wire = build_openai_messages(&msgs);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[1]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "b");
    }

    #[test]
    fn sse_lines_split_across_chunks_are_buffered() {
        let mut buf = b"data: {\"choices\":[{\"delta\":{\"content\":\"he".to_vec();
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.extend_from_slice(b"llo\"}}]}\n\ndata: [DONE]\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(ResponseEvent::TextDelta(t)) if t == "hello"));
        assert!(matches!(&events[1], Ok(ResponseEvent::Done)));
        assert!(buf.is_empty());
    }

    #[test]
    fn sse_tool_call_delta_is_parsed() {
        let v = json!({
            "choices": [{ "delta": { "tool_calls": [{
                "index": 1,
                "id": "call_9",
                "function": { "name": "list_dir", "arguments": "{\"pa" }
            }]}}]
        });
        match parse_sse_chunk(&v) {
            Some(ResponseEvent::ToolCall { index, id, name, arguments }) => {
                assert_eq!(index, 1);
                assert_eq!(id, "call_9");
                assert_eq!(name, "list_dir");
                assert_eq!(arguments, "{\"pa");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sse_usage_chunk_is_parsed() {
        let v = json!({ "choices": [], "usage": { "prompt_tokens": 12, "completion_tokens": 3 } });
        assert!(matches!(
            parse_sse_chunk(&v),
            Some(ResponseEvent::Usage { input_tokens: 12, output_tokens: 3 })
        ));
    }

    #[test]
    fn full_response_yields_text_tools_usage_done() {
        let v = json!({
            "choices": [{ "message": {
                "content": "thinking out loud",
                "tool_calls": [{
                    "id": "c1",
                    "function": { "name": "read_file", "arguments": "{}" }
                }]
            }}],
            "usage": { "prompt_tokens": 1, "completion_tokens": 2 }
        });
        let events = parse_full_response(&v).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ResponseEvent::TextDelta(t) if t == "thinking out loud"));
        assert!(matches!(&events[1], ResponseEvent::ToolCall { index: 0, .. }));
        assert!(matches!(events[3], ResponseEvent::Done));
    }

    #[test]
    fn multibyte_char_split_across_chunks_survives() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut buf = line[..split].to_vec();
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.extend_from_slice(&line[split..]);
        let events = drain_complete_sse_lines(&mut buf);
        assert!(
            matches!(&events[0], Ok(ResponseEvent::TextDelta(t)) if t == "caf\u{e9}"),
            "{events:?}"
        );
    }

    #[test]
    fn sse_error_chunk_becomes_stream_error() {
        let mut buf =
            b"data: {\"error\":{\"message\":\"rate limited\"}}\n\ndata: [DONE]\n".to_vec();
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 2);
        let err = events[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("rate limited"), "{err}");
    }

    #[test]
    fn full_response_error_body_is_an_error() {
        let v = json!({ "error": { "message": "model overloaded", "type": "server_error" } });
        let err = parse_full_response(&v).unwrap_err();
        assert!(err.to_string().contains("model overloaded"), "{err}");
    }
}
