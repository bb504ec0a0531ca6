//! Ripple - reactive SQL from the command line.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use db_ripple::classify::TableClassifier;
use db_ripple::cli::{Cli, Command};
use db_ripple::config::Config;
use db_ripple::db::BindParams;
use db_ripple::error::RippleError;
use db_ripple::fingerprint::fingerprint;
use db_ripple::logging;
use db_ripple::notify::listener;
use db_ripple::pipeline::{ReactiveDb, ReactiveOptions};
use serde_json::json;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<RippleError>() {
            Some(err) => {
                error!("{}: {}", err.category(), err);
                eprintln!("{}: {}", err.category(), err);
            }
            None => {
                error!("{e:#}");
                eprintln!("Error: {e:#}");
            }
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let config = resolve_config(&cli)?;
    match config.logging.resolved_file() {
        Some(path) => logging::init_file_logging(&path, &config.logging.level),
        None => logging::init_stderr_logging(&config.logging.level),
    }
    info!("Loaded config from: {}", cli.config_path().display());

    match &cli.command {
        Command::Compile => {
            let compiled = config.database.load_source()?.compile()?;
            println!("{}", compiled.script);
            println!("-- tables: {}", compiled.tables.join(", "));
        }
        Command::Classify { sql } => {
            let source = config.database.load_source()?;
            let classifier = TableClassifier::new(source.schema.table_names().as_slice())?;
            println!("{}", classifier.classify(sql));
        }
        Command::Fingerprint { text } => {
            println!("{}", fingerprint(text));
        }
        Command::Exec { sql } => exec(&config, sql).await?,
        Command::Export { out } => {
            let db = open(&config).await?;
            let image = db.export().await?;
            std::fs::write(out, &image)
                .with_context(|| format!("Failed to write image to {}", out.display()))?;
            info!("Exported {} bytes to {}", image.len(), out.display());
            db.destroy().await?;
        }
    }

    Ok(())
}

/// Builds the effective config. CLI flags override the file; the environment fills what is still unset.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load_from_file(&cli.config_path())?;
    cli.apply_to(&mut config)?;
    config.database.apply_env_defaults();
    Ok(config)
}

async fn open(config: &Config) -> anyhow::Result<ReactiveDb> {
    let source = config.database.load_source()?;
    let db = ReactiveDb::new(ReactiveOptions::default().delivery(config.notify.delivery));
    db.initialize(source, Vec::new()).await?;
    Ok(db)
}

async fn exec(config: &Config, statements: &[String]) -> anyhow::Result<()> {
    let db = open(config).await?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let watcher = listener(move |timestamp| {
        if let Ok(mut seen) = sink.lock() {
            seen.push(timestamp);
        }
    });

    let mut report = Vec::with_capacity(statements.len());
    let mut failed = 0;
    for sql in statements {
        match db.query(&watcher, sql, &BindParams::None).await {
            Some(outcome) => {
                let delivered = match outcome.notification {
                    Some(notification) => Some(notification.wait().await.invoked),
                    None => None,
                };
                report.push(json!({
                    "sql": sql,
                    "results": outcome.results,
                    "notified": delivered,
                }));
            }
            None => {
                failed += 1;
                report.push(json!({ "sql": sql, "error": "statement failed, see log" }));
            }
        }
    }

    let timestamps = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    let output = json!({
        "statements": report,
        "notifications": timestamps,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    db.destroy().await?;
    if failed > 0 {
        anyhow::bail!("{failed} of {} statements failed", statements.len());
    }
    Ok(())
}
