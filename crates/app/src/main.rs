use std::error::Error;

use services::{AppServices, Clock};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Args, ArgsError, Env, print_usage};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let parsed = Args::parse(std::env::args().skip(1), &Env::from_process()).inspect_err(|_| {
        print_usage();
    })?;
    let Some(args) = parsed else {
        print_usage();
        return Ok(());
    };

    init_tracing();
    prepare_sqlite_file(&args.db_url)?;
    debug!(db = %args.db_url, user = %args.user, weights = %args.weights, "opening storage");

    let app = AppServices::new_sqlite(&args.db_url, Clock::default(), args.weights).await?;
    commands::run(&app, args.user, args.command).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
