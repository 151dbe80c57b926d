mod api;
mod app;
mod cache;
mod commands;
mod config;
mod error;
mod mutation;
mod query;
mod session;

use api::client::{Gateway, HttpGateway};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kardex")]
#[command(about = "A terminal client for browsing and editing stock movements")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/kardex/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Log in and store the session token
  Login { username: String },
  /// Clear the stored session token
  Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_tracing()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;
  let session = session::SessionStore::open()?;

  match args.command {
    Some(Command::Login { username }) => {
      let password = config::Config::get_password()?;
      let gateway = HttpGateway::new(&config, session.clone())?;
      match gateway.login(&username, &password).await {
        Ok(token) => {
          session.login(&token)?;
          println!("Logged in as {}", username);
        }
        Err(e) => println!("Login failed: {}", e),
      }
    }
    Some(Command::Logout) => {
      session.logout()?;
      println!("Logged out");
    }
    None => {
      let mut app = app::App::new(config, session)?;
      app.run().await?;
    }
  }

  Ok(())
}

/// Log to a daily file under the user data dir; stdout belongs to the UI.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("kardex")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "kardex.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
