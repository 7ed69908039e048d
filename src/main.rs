use anyhow::Result;
use clap::Parser;
use databot::cli::{choose_session, formatting, CliArgs, CliState};
use databot::session::SessionManager;
use std::env;
use tokio::io::{self, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = args.load_config()?;

    // Initialize logging based on config
    let default_directive = format!("databot={}", config.logging.level.to_lowercase());
    let env_override = env::var("RUST_LOG").unwrap_or_default();
    let combined_filter = if env_override.trim().is_empty() {
        default_directive.clone()
    } else if env_override.contains("databot") {
        env_override
    } else {
        format!("{},{}", env_override, default_directive)
    };

    tracing_subscriber::fmt()
        .with_env_filter(combined_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Missing credentials are fatal before any interaction
    config.require_runtime_credentials()?;

    let mut reader = BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    let enabled: Vec<&str> = config.tools.enabled.iter().map(String::as_str).collect();
    stdout
        .write_all(formatting::render_banner(&enabled).as_bytes())
        .await?;

    let selection = choose_session(&args, &mut reader, &mut stdout, &SessionManager::new()).await?;
    let mut cli = CliState::new_with_config(config, selection.id)?;

    cli.run_repl(&mut reader, &mut stdout).await?;
    Ok(())
}
