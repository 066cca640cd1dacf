use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::CommandFactory;
use shelf_agent::{AgentConfig, LinkMode};

use crate::cli::Cli;

/// Startup problems reported before any protocol traffic.
#[derive(Debug, PartialEq, Eq)]
pub enum UsageError {
    MissingBaseDir,
    NotADirectory(PathBuf),
}

impl UsageError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingBaseDir => 1,
            Self::NotADirectory(_) => 3,
        }
    }
}

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBaseDir => write!(f, "Required: base directory"),
            Self::NotADirectory(p) => {
                write!(f, "{:?} does not exist or is not a directory", p.display().to_string())
            }
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let file_config = match &cli.config {
        Some(path) => AgentConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AgentConfig::default(),
    };
    let config = match resolve_config(&cli, file_config) {
        Ok(config) => config,
        Err(usage) => {
            eprintln!("{usage}");
            eprintln!("{}", Cli::command().render_usage());
            return Ok(ExitCode::from(usage.exit_code()));
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_dir = ?config.base_dir,
        link_mode = ?config.link_mode,
        "starting lfs-shelf"
    );

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let summary = shelf_agent::serve(config, stdin, stdout).context("reading requests")?;
    tracing::debug!(?summary, "exiting");
    Ok(ExitCode::SUCCESS)
}

/// Merge flags over the file config and validate the base directory.
pub fn resolve_config(cli: &Cli, mut config: AgentConfig) -> Result<AgentConfig, UsageError> {
    if let Some(arg) = cli.basedir.as_deref() {
        let trimmed = arg.trim();
        if !trimmed.is_empty() {
            config.base_dir = Some(PathBuf::from(trimmed));
        }
    }
    if cli.temp_dir.is_some() {
        config.temp_dir = cli.temp_dir.clone();
    }
    if cli.hard_link {
        config.link_mode = LinkMode::HardLink;
    }

    let base = config
        .base_dir
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(UsageError::MissingBaseDir)?;
    if !base.is_dir() {
        return Err(UsageError::NotADirectory(base.to_path_buf()));
    }
    Ok(config)
}
