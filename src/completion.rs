//! Shell completion scripts for the `declmap` command tree.

use anyhow::{Context, Result};
use clap::{Command, CommandFactory};
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

fn command() -> (Command, String) {
    let cmd = Cli::command();
    let name = cmd.get_name().to_string();
    (cmd, name)
}

/// Write the completion script for `shell` into `out`.
pub fn render(shell: Shell, out: &mut dyn io::Write) {
    let (mut cmd, name) = command();
    generate(CompletionShell::from(shell), &mut cmd, name, out);
}

/// Write the completion script into `dir`, returning the file path.
pub fn write_to(shell: Shell, dir: &Path) -> Result<PathBuf> {
    let (mut cmd, name) = command();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    generate_to(CompletionShell::from(shell), &mut cmd, name, dir).context("Failed to generate completion file")
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    if args.stdout {
        render(args.shell, &mut io::stdout());
        return Ok(());
    }

    let dir = args
        .out_dir
        .ok_or_else(|| anyhow::anyhow!("--out-dir is required unless --stdout is set"))?;

    if ctx.dry_run {
        if !ctx.quiet {
            eprintln!("Would write {:?} completion into {}", args.shell, dir.display());
        }
        return Ok(());
    }

    let path = write_to(args.shell, &dir)?;
    if !ctx.quiet {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}
