//! CLI surface (spec §6): a positional or `-p/--prompt` turn, plus an
//! `index` subcommand to populate the retrieval layer's chunk store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// An interactive coding assistant that turns a natural-language request
/// into a sequence of tool invocations.
#[derive(Debug, Parser)]
#[command(name = "cortex", version, about)]
pub struct Cli {
    /// The prompt to execute, if not given via `--prompt` or a subcommand.
    pub prompt: Option<String>,

    /// Prompt to execute (overrides the positional argument).
    #[arg(short = 'p', long = "prompt")]
    pub prompt_flag: Option<String>,

    /// Don't open the interactive approval UI; auto-deny anything that
    /// would otherwise prompt, print the result, and exit.
    #[arg(long)]
    pub non_interactive: bool,

    /// Project root to operate in; defaults to the current directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The effective prompt text: `--prompt` wins over the positional
    /// argument.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt_flag.as_deref().or(self.prompt.as_deref())
    }
}

/// Subcommands beyond "run a turn".
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk the project root and (re)populate the retrieval layer's
    /// chunk store.
    Index,
}
