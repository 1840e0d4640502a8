use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use codeden_core::{CoreConfig, Workbench};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

fn parse_args() -> Result<Option<PathBuf>> {
    let mut config = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(path) = args.next() else {
                    bail!("--config needs a path");
                };
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                eprintln!("usage: codeden-bridge [--config <path>]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = parse_args()?;
    let config = CoreConfig::load_from(config_path.as_deref()).context("loading configuration")?;
    let workbench = Arc::new(Workbench::new(config).context("starting workbench")?);

    tracing::info!("=== Codeden bridge listening on stdio ===");

    let stdin = BufReader::new(tokio::io::stdin());
    codeden_bridge::serve(workbench, stdin, tokio::io::stdout()).await?;

    tracing::info!("bridge stopped");
    Ok(())
}
