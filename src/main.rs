use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::TryStreamExt;
use std::io::Write;
use tracing::info;

use searchcode_relay::comms::local_api::{self, AppState};
use searchcode_relay::config::Config;
use searchcode_relay::transport::SearchKey;
use searchcode_relay::utils;

#[derive(Parser)]
#[command(name = "searchcode-relay", version, about = "Credential-caching searchcode relay")]
struct AppCli {
    /// Config file path (JSON); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP relay
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Perform a single lookup and print the upstream response
    Lookup { code: String },
}

async fn lookup_once(config: &Config, code: &str) -> Result<()> {
    let key = SearchKey::parse(code)?;
    let state = AppState::from_config(config)?;

    let token = state.tokens.get_credential().await.context("obtaining credential")?;
    let response = state.lookup.forward(&key, &token).await.context("forwarding lookup")?;

    let status = response.status;
    let body: Vec<u8> = response
        .body
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .context("reading lookup response")?;

    eprintln!("{}", status);
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Lookup { code }) => lookup_once(&config, &code).await?,
        Some(Commands::Serve { port }) => {
            info!("Starting searchcode relay on port {port}");
            local_api::serve(config, port).await?;
        }
        None => {
            info!("Starting searchcode relay on port 8080");
            local_api::serve(config, 8080).await?;
        }
    }

    Ok(())
}
