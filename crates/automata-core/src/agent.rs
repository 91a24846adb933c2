// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use automata_config::AutomataAgentConfig;
use automata_model::{CompletionRequest, Message, ModelProvider, ResponseEvent};
use automata_tools::{ToolCall, ToolRegistry, Toolkits};

use crate::{prompts, AgentBuilder, BuildError, BuilderFactory, RunnableAgent};

/// The canonical builder kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutomataBuilderFactory;

impl BuilderFactory for AutomataBuilderFactory {
    fn name(&self) -> &str {
        "automata"
    }

    fn create(&self, config: Arc<AutomataAgentConfig>) -> anyhow::Result<Box<dyn AgentBuilder>> {
        Ok(Box::new(AutomataAgentBuilder::new(config)?))
    }
}

pub struct AutomataAgentBuilder {
    config: Arc<AutomataAgentConfig>,
    model: Arc<dyn ModelProvider>,
    toolkits: Toolkits,
    instructions: Option<String>,
}

impl AutomataAgentBuilder {
    /// Bind a builder to `config`, resolving its model provider.
    pub fn new(config: Arc<AutomataAgentConfig>) -> anyhow::Result<Self> {
        if config.max_iters == 0 {
            bail!("max_iters must be at least 1");
        }
        let model = automata_model::from_config(&config.model).with_context(|| {
            format!("failed to initialise model provider `{}`", config.model.provider)
        })?;
        debug!(
            version = %config.config_version,
            provider = model.name(),
            model = model.model_name(),
            "agent builder ready"
        );
        Ok(Self { config, model, toolkits: Toolkits::new(), instructions: None })
    }

    /// Replace the provider resolved from the configuration.
    pub fn with_model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.model = model;
        self
    }

    pub fn config(&self) -> &AutomataAgentConfig {
        &self.config
    }

    fn registry(&self) -> Result<ToolRegistry, BuildError> {
        let mut kinds: Vec<_> = self.toolkits.keys().copied().collect();
        kinds.sort();

        let mut registry = ToolRegistry::new();
        for kind in kinds {
            let kit = &self.toolkits[&kind];
            if kit.kind != kind {
                return Err(BuildError::InvalidConfig(format!(
                    "toolkit of kind {} registered under {kind}",
                    kit.kind
                )));
            }
            registry.register_toolkit(kit)?;
        }
        Ok(registry)
    }
}

impl AgentBuilder for AutomataAgentBuilder {
    fn with_toolkits(mut self: Box<Self>, toolkits: Toolkits) -> Box<dyn AgentBuilder> {
        self.toolkits.extend(toolkits);
        self
    }

    fn with_instructions(mut self: Box<Self>, instructions: String) -> Box<dyn AgentBuilder> {
        self.instructions = Some(instructions);
        self
    }

    fn build(self: Box<Self>) -> Result<Box<dyn RunnableAgent>, BuildError> {
        let instructions = match self.instructions.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => return Err(BuildError::MissingInstructions),
        };
        let tools = self.registry()?;

        let mut messages = Vec::with_capacity(2);
        let system = prompts::system_prompt(&self.config, &tools);
        if !system.is_empty() {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(instructions));

        let agent = AutomataAgent {
            session_id: uuid::Uuid::new_v4().to_string(),
            config: self.config,
            model: self.model,
            tools: Arc::new(tools),
            messages,
            spent: false,
        };
        debug!(session_id = %agent.session_id, tools = ?agent.tools.names(), "agent built");
        Ok(Box::new(agent))
    }
}

/// Model ↔ tool loop over a single conversation.
pub struct AutomataAgent {
    session_id: String,
    config: Arc<AutomataAgentConfig>,
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    messages: Vec<Message>,
    spent: bool,
}

impl AutomataAgent {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// One model round: returns the streamed text and the requested tool calls.
    async fn stream_one_round(&self) -> anyhow::Result<(String, Vec<ToolCall>)> {
        let req = CompletionRequest {
            messages: self.messages.clone(),
            tools: self
                .tools
                .schemas()
                .into_iter()
                .map(|s| automata_model::ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect(),
            stream: self.config.stream,
        };

        let mut stream = self.model.complete(req).await.context("model completion failed")?;

        let mut text = String::new();
        // Keyed by the provider's parallel-tool-call index.
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => text.push_str(&delta),
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let ptc = pending.entry(index).or_default();
                    if !id.is_empty() {
                        ptc.id = id;
                    }
                    if !name.is_empty() {
                        ptc.name = name;
                    }
                    ptc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Usage { input_tokens, output_tokens } => {
                    debug!(session_id = %self.session_id, input_tokens, output_tokens, "usage");
                }
                ResponseEvent::Done => break,
            }
        }

        let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let mut calls = Vec::with_capacity(sorted.len());
        for (i, (_, ptc)) in sorted.into_iter().enumerate() {
            if ptc.name.is_empty() {
                warn!(tool_call_id = %ptc.id, "dropping tool call with empty name");
                continue;
            }
            let mut call = ptc.finish();
            if call.id.is_empty() {
                call.id = format!("tc_synthetic_{i}");
            }
            calls.push(call);
        }
        Ok((text, calls))
    }
}

#[async_trait]
impl RunnableAgent for AutomataAgent {
    async fn run(&mut self) -> anyhow::Result<String> {
        if self.spent {
            bail!("agent session {} has already run", self.session_id);
        }
        self.spent = true;

        info!(
            session_id = %self.session_id,
            model = self.model.model_name(),
            max_iters = self.config.max_iters,
            "agent started"
        );

        for round in 1..=self.config.max_iters {
            let (text, calls) = self.stream_one_round().await?;
            if !text.is_empty() {
                self.messages.push(Message::assistant(&text));
            }

            if calls.is_empty() {
                debug!(session_id = %self.session_id, round, "agent finished");
                return Ok(text);
            }

            // All tool-call messages precede their results.
            for call in &calls {
                self.messages.push(Message::tool_call(&call.id, &call.name, call.args.to_string()));
            }
            let outputs =
                futures::future::join_all(calls.iter().map(|c| self.tools.execute(c))).await;
            for (call, out) in calls.iter().zip(outputs) {
                if self.config.verbose {
                    info!(round, tool = %call.name, is_error = out.is_error, "{}", out.content);
                } else {
                    debug!(round, tool = %call.name, is_error = out.is_error, "tool finished");
                }
                self.messages.push(Message::tool_result(out.call_id, out.content));
            }
        }

        bail!("exceeded max iterations ({})", self.config.max_iters)
    }

    async fn release(&mut self) {
        debug!(session_id = %self.session_id, messages = self.messages.len(), "releasing agent");
        self.messages.clear();
        self.spent = true;
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    fn finish(self) -> ToolCall {
        // Arguments always resolve to a JSON object.
        let args = if self.args_buf.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.args_buf).unwrap_or_else(|e| {
                warn!(
                    tool_name = %self.name,
                    tool_call_id = %self.id,
                    error = %e,
                    "model sent tool call with invalid JSON arguments; substituting {{}}"
                );
                serde_json::Value::Object(Default::default())
            })
        };
        ToolCall { id: self.id, name: self.name, args }
    }
}

#[cfg(test)]
mod tests {
    use automata_model::ScriptedMockProvider;
    use automata_tools::{builtin, ToolkitType};

    use super::*;

    fn mock_config() -> Arc<AutomataAgentConfig> {
        let mut cfg = AutomataAgentConfig::default();
        cfg.model.provider = "mock".into();
        cfg.max_iters = 3;
        Arc::new(cfg)
    }

    fn builder(model: ScriptedMockProvider) -> Box<dyn AgentBuilder> {
        Box::new(AutomataAgentBuilder::new(mock_config()).unwrap().with_model(Arc::new(model)))
    }

    #[test]
    fn zero_max_iters_is_rejected_at_construction() {
        let mut cfg = AutomataAgentConfig::default();
        cfg.model.provider = "mock".into();
        cfg.max_iters = 0;
        assert!(AutomataAgentBuilder::new(Arc::new(cfg)).is_err());
    }

    #[test]
    fn unknown_provider_is_a_construction_failure() {
        let mut cfg = AutomataAgentConfig::default();
        cfg.model.provider = "carrier-pigeon".into();
        let err = AutomataBuilderFactory.create(Arc::new(cfg)).err().unwrap();
        assert!(format!("{err:#}").contains("unknown model provider"));
    }

    #[test]
    fn blank_instructions_are_missing() {
        let b = builder(ScriptedMockProvider::always_text("x")).with_instructions("  \n".into());
        assert!(matches!(b.build().err(), Some(BuildError::MissingInstructions)));
    }

    #[test]
    fn mismatched_toolkit_key_is_invalid() {
        let mut kits = Toolkits::new();
        kits.insert(ToolkitType::PyRetriever, builtin::toolkit(ToolkitType::PyWriter).unwrap());
        let b = builder(ScriptedMockProvider::always_text("x"))
            .with_toolkits(kits)
            .with_instructions("go".into());
        assert!(matches!(b.build().err(), Some(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn plain_text_reply_is_returned() {
        let mut agent = builder(ScriptedMockProvider::always_text("hello"))
            .with_instructions("say hi".into())
            .build()
            .unwrap();
        assert_eq!(agent.run().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn tool_round_feeds_result_back_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "x = 1\n").unwrap();
        let args = serde_json::json!({ "path": file }).to_string();

        let model = Arc::new(ScriptedMockProvider::tool_then_text("c1", "read_file", args, "done"));
        let requests = Arc::clone(&model.requests);
        let mut kits = Toolkits::new();
        kits.insert(ToolkitType::PyRetriever, builtin::toolkit(ToolkitType::PyRetriever).unwrap());

        let builder: Box<dyn AgentBuilder> =
            Box::new(AutomataAgentBuilder::new(mock_config()).unwrap().with_model(model));
        let mut agent =
            builder.with_toolkits(kits).with_instructions("read it".into()).build().unwrap();
        assert_eq!(agent.run().await.unwrap(), "done");

        let seen = requests.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].tools.iter().any(|t| t.name == "read_file"));
        let last = seen[1].messages.last().unwrap();
        assert!(matches!(
            &last.content,
            automata_model::MessageContent::ToolResult { content, .. } if content.contains("x = 1")
        ));
    }

    #[tokio::test]
    async fn exhausting_rounds_fails() {
        let looping: Vec<Vec<ResponseEvent>> = (0..3)
            .map(|i| {
                vec![
                    ResponseEvent::ToolCall {
                        index: 0,
                        id: format!("c{i}"),
                        name: "missing".into(),
                        arguments: "{}".into(),
                    },
                    ResponseEvent::Done,
                ]
            })
            .collect();
        let mut agent = builder(ScriptedMockProvider::new(looping))
            .with_instructions("loop".into())
            .build()
            .unwrap();
        let err = agent.run().await.unwrap_err();
        assert!(err.to_string().contains("exceeded max iterations"), "{err}");
    }

    #[tokio::test]
    async fn agents_are_single_use() {
        let mut agent = builder(ScriptedMockProvider::always_text("once"))
            .with_instructions("go".into())
            .build()
            .unwrap();
        agent.run().await.unwrap();
        let err = agent.run().await.unwrap_err();
        assert!(err.to_string().contains("already run"));
    }

    /// Emits one text delta, then fails mid-stream.
    struct BrokenStream;

    #[async_trait]
    impl ModelProvider for BrokenStream {
        fn name(&self) -> &str {
            "broken"
        }

        fn model_name(&self) -> &str {
            "broken-model"
        }

        async fn complete(
            &self,
            _req: CompletionRequest,
        ) -> anyhow::Result<automata_model::ResponseStream> {
            let events: Vec<anyhow::Result<ResponseEvent>> = vec![
                Ok(ResponseEvent::TextDelta("partial".into())),
                Err(anyhow::anyhow!("openai error: rate limited")),
                Ok(ResponseEvent::Done),
            ];
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    #[tokio::test]
    async fn stream_error_fails_the_run() {
        let builder: Box<dyn AgentBuilder> = Box::new(
            AutomataAgentBuilder::new(mock_config()).unwrap().with_model(Arc::new(BrokenStream)),
        );
        let mut agent = builder.with_instructions("go".into()).build().unwrap();
        let err = agent.run().await.unwrap_err();
        assert!(err.to_string().contains("rate limited"), "{err:#}");
    }

    #[test]
    fn fragmented_tool_arguments_are_joined() {
        let ptc = PendingToolCall {
            id: "c".into(),
            name: "read_file".into(),
            args_buf: r#"{"path":"a.py"}"#.into(),
        };
        assert_eq!(ptc.finish().args["path"], "a.py");
        let broken = PendingToolCall { id: "c".into(), name: "t".into(), args_buf: "{oops".into() };
        assert!(broken.finish().args.is_object());
    }
}
