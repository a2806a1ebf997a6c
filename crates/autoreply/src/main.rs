//! `autoreply` - console client for the email auto-responder.
//!
//! Signs in with Google through the backend, lists unread emails, requests
//! AI-generated replies and sends the approved ones.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod app;
mod command;
mod config;
mod navigator;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use app::{App, Flow};
use command::Command;
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they do not interleave with command output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autoreply=info,autoreply_core=info,autoreply_api=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env()?;
    info!(
        "Starting autoreply (backend {}, data in {})",
        config.api_url,
        config.data_dir.display()
    );

    // An optional argument is the address the app was opened at, e.g. the
    // provider redirect.
    let location = match std::env::args().nth(1) {
        Some(arg) => config.app_url.join(&arg)?,
        None => config.app_url.clone(),
    };

    let mut app = App::new(&config)?;
    app.start(&location).await;
    run(&mut app).await?;

    info!("Exiting");
    Ok(())
}

/// Reads commands from stdin until `quit`, end of input or Ctrl-C.
async fn run(app: &mut App) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                if app.handle(command).await == Flow::Exit {
                    break;
                }
            }
            Err(e) => {
                debug!("Rejected input: {line}");
                println!("{e}");
            }
        }
    }
    Ok(())
}
