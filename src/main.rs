//! CLI entry point for the docvault tool.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use docvault_core::{ApiClient, ChannelNotifier, ClientConfig, ClientEvent, Session};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod commands;

use cli::{Args, Command};
use commands::Context;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_client_config(&args)?;
    let session = Arc::new(match app_config::resolve_token_path() {
        Some(path) => Session::with_token_file(path),
        None => Session::new(),
    });

    match &args.command {
        Command::Login { token } => return commands::run_login_command(&session, token),
        Command::Logout => {
            commands::run_logout_command(&session);
            return Ok(());
        }
        _ => {}
    }

    if !session.hydrate(args.token.as_deref()) {
        debug!("no credential held; requests go out unauthenticated");
    }

    let (notifier, mut events) = ChannelNotifier::new();
    let client = ApiClient::new(&config, Arc::clone(&session), Arc::new(notifier))
        .with_context(|| format!("Invalid base URL '{}'", config.base_url))?;
    info!(base_url = %client.base_url(), "docvault starting");

    let ctx = Context {
        client,
        config,
        quiet: args.quiet,
    };
    let result = commands::dispatch(&ctx, args.command).await;
    report_client_events(&mut events);
    result
}

/// Defaults, then the config file, then `--base-url`.
fn resolve_client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    if let Some(file_config) = app_config::load_default_file_config()? {
        debug!(?file_config, "loaded config file");
        file_config.apply_to(&mut config);
    }
    if let Some(base_url) = &args.base_url {
        if url::Url::parse(base_url).is_err() {
            bail!("Invalid --base-url '{base_url}'. Expected an absolute URL");
        }
        config.base_url.clone_from(base_url);
    }
    Ok(config)
}

fn report_client_events(events: &mut mpsc::UnboundedReceiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::RateLimited(advisory) => warn!(
                endpoint = %advisory.endpoint,
                retry_after_secs = advisory.remaining().as_secs(),
                "Rate limited by the server; retry after the advertised wait"
            ),
            ClientEvent::SessionExpired => {
                warn!("Session expired; run `docvault login <token>` to sign in again");
            }
        }
    }
}
