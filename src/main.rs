// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use automata_config::{AgentConfigVersion, ConfigResolver, FileConfigResolver};
use automata_core::AutomataInstance;
use automata_tools::{builtin, ToolkitType, Toolkits};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let resolver = resolver(&cli);

    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig { version } => {
                let config = resolver.load(*version)?;
                print!("{}", serde_yaml::to_string(&config).context("serializing config")?);
                return Ok(());
            }
            Commands::ListConfigs => {
                list_configs(&resolver);
                return Ok(());
            }
        }
    }

    let instructions = read_instructions(cli.instructions.as_deref())?;

    let mut instance = AutomataInstance::new(cli.config_version)
        .with_resolver(Arc::new(resolver));
    if let Some(description) = &cli.description {
        instance = instance.with_description(description);
    }
    if !cli.toolkits.is_empty() {
        instance = instance.with_toolkits(builtin_toolkits(&cli.toolkits)?);
    }
    tracing::debug!(?instance, "running instance");

    let output = instance.run(instructions).await?;
    println!("{output}");
    Ok(())
}

fn resolver(cli: &Cli) -> FileConfigResolver {
    let resolver = FileConfigResolver::new();
    match &cli.config_dir {
        Some(dir) => resolver.with_extra_dir(dir),
        None => resolver,
    }
}

/// Positional instructions win; otherwise stdin is read unless it is a terminal.
fn read_instructions(arg: Option<&str>) -> anyhow::Result<String> {
    if let Some(text) = arg {
        return Ok(text.to_string());
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no instructions given; pass them as an argument or pipe them on stdin");
    }
    let mut buf = String::new();
    stdin.lock().read_to_string(&mut buf).context("reading instructions from stdin")?;
    Ok(buf)
}

fn builtin_toolkits(kinds: &[ToolkitType]) -> anyhow::Result<Toolkits> {
    let mut toolkits = Toolkits::new();
    for &kind in kinds {
        let kit = builtin::toolkit(kind)
            .with_context(|| format!("toolkit {kind} has no builtin implementation"))?;
        toolkits.insert(kind, kit);
    }
    Ok(toolkits)
}

fn list_configs(resolver: &FileConfigResolver) {
    for version in AgentConfigVersion::ALL {
        match resolver.load(version) {
            Ok(cfg) if cfg.description.is_empty() => println!("{version:<20} ok"),
            Ok(cfg) => println!("{version:<20} ok       {}", cfg.description),
            Err(e) => println!("{version:<20} error    {e}"),
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
