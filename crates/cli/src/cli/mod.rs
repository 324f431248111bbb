//! Argument parsing (§6) — a `run` subcommand plus the `--check-config`
//! doctor-style flag (SPEC_FULL §C.2), in the teacher's `clap::Parser`
//! style.

pub mod doctor;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use sa_domain::config::Config;

#[derive(Parser, Debug)]
#[command(name = "sa", about = "LLM-driven task orchestrator")]
pub struct Cli {
    /// Path to the TOML config file. Falls back to the `SA_CONFIG` env var,
    /// then to `config.toml`, then to built-in defaults if none exist.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Load and validate config, print a pass/fail report, and exit without
    /// starting a session.
    #[arg(long, global = true)]
    pub check_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the orchestrator against a session, reading prompts from stdin.
    Run {
        /// Resume (or start) this session id. A fresh UUID is minted if absent.
        #[arg(long)]
        sid: Option<String>,
    },
}

/// Resolve the config path (`--config`, then `SA_CONFIG`, then `config.toml`)
/// and load it, falling back to `Config::default()` when the file is absent
/// — the teacher's `load_config` convention.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, String)> {
    let path = explicit
        .map(|p| p.to_path_buf())
        .or_else(|| std::env::var("SA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok((Config::default(), path.display().to_string()));
    }

    let config = Config::load(&path)?;
    Ok((config, path.display().to_string()))
}
