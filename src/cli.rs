// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use automata_config::AgentConfigVersion;
use automata_tools::ToolkitType;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser, Debug)]
#[command(
    name = "automata",
    about = "Build an agent from a versioned configuration and run it once",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Instructions for the agent.  Read from stdin when omitted.
    #[arg(value_name = "INSTRUCTIONS")]
    pub instructions: Option<String>,

    /// Agent configuration to load
    #[arg(
        long,
        short = 'c',
        value_enum,
        default_value_t = AgentConfigVersion::Default,
        env = "AUTOMATA_CONFIG_VERSION"
    )]
    pub config_version: AgentConfigVersion,

    /// Builtin toolkit to give the agent.  May be repeated:
    /// -t py-retriever -t py-writer
    #[arg(long = "toolkit", short = 't', value_enum)]
    pub toolkits: Vec<ToolkitType>,

    /// Directory searched last (highest priority) for <version>.yaml
    #[arg(long, value_name = "DIR", env = "AUTOMATA_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Free-text description of this run, shown in logs
    #[arg(long)]
    pub description: Option<String>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the resolved configuration record as YAML and exit
    ShowConfig {
        #[arg(value_enum)]
        version: AgentConfigVersion,
    },
    /// List every configuration version and whether it resolves
    ListConfigs,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "automata", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_default_version_without_toolkits() {
        let cli = Cli::try_parse_from(["automata", "do it"]).unwrap();
        assert_eq!(cli.config_version, AgentConfigVersion::Default);
        assert!(cli.toolkits.is_empty());
        assert_eq!(cli.instructions.as_deref(), Some("do it"));
    }

    #[test]
    fn toolkits_and_version_parse_from_kebab_tags() {
        let cli = Cli::try_parse_from([
            "automata", "-c", "automata-writer", "-t", "py-retriever", "-t", "py-writer", "go",
        ])
        .unwrap();
        assert_eq!(cli.config_version, AgentConfigVersion::AutomataWriter);
        assert_eq!(cli.toolkits, vec![ToolkitType::PyRetriever, ToolkitType::PyWriter]);
    }

    #[test]
    fn show_config_takes_a_version() {
        let cli = Cli::try_parse_from(["automata", "show-config", "test"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::ShowConfig { version: AgentConfigVersion::Test })
        ));
    }

    #[test]
    fn unknown_toolkit_is_rejected() {
        assert!(Cli::try_parse_from(["automata", "-t", "telepathy", "x"]).is_err());
    }
}
