//! `sa` — the external CLI surface (§6): parse arguments, load config,
//! wire every crate together via [`bootstrap::build_app`], and drive the
//! stdin prompt loop in [`run`].

mod bootstrap;
mod cli;
mod run;

use clap::Parser;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let args = Cli::parse();
    let (config, config_path) = cli::load_config(args.config.as_deref())?;

    if args.check_config {
        let ok = cli::doctor::run(&config, &config_path);
        std::process::exit(if ok { 0 } else { 1 });
    }

    let sid = match args.command {
        Some(Command::Run { sid }) => sid,
        None => None,
    };
    let session_id = sid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let app = match bootstrap::build_app(&config, session_id.clone()) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize session");
            return Err(e);
        }
    };

    let exit_code = run::run(&config, app).await;
    std::process::exit(exit_code);
}
