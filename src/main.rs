use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use predlob_rs::cli::{self, Command};
use predlob_rs::config::Settings;
use predlob_rs::market_data::adapters::replay::JsonLinesReplay;
use predlob_rs::market_data::adapters::FeedSource;
use predlob_rs::market_data::FeedRouter;
use predlob_rs::engine::registry::MarketRegistry;
use predlob_rs::telemetry;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "predlob", version, about = "Prediction-market price ladder and matcher")]
struct Args {
    /// Settings file (TOML); defaults to ./predlob.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Interactive shell over an in-memory registry (default)
    Repl,
    /// Apply a JSON-lines file of market events and print the resulting books
    Replay { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    settings.validate()?;
    telemetry::init_tracing(&settings.log_filter);
    telemetry::init_metrics(settings.metrics_port)?;
    info!(?settings, "Loaded settings");

    match args.mode.unwrap_or(Mode::Repl) {
        Mode::Repl => repl(settings.registry()?),
        Mode::Replay { file } => replay(&settings, file).await,
    }
}

async fn replay(settings: &Settings, file: PathBuf) -> anyhow::Result<()> {
    let router = FeedRouter::new(settings.registry()?);
    let registry = router.registry();
    let (tx, rx) = mpsc::channel(settings.feed_channel_capacity);

    let router_task = tokio::spawn(router.run(rx));
    let sent = JsonLinesReplay::new(&file).run(tx).await?;
    let stats = router_task.await?;

    println!(
        "Replayed {} events from {}: {} applied, {} unknown market, {} ignored, {} rejected",
        sent,
        file.display(),
        stats.applied,
        stats.unknown_market,
        stats.ignored,
        stats.failed
    );
    let registry = registry.lock();
    for key in registry.markets() {
        println!("\n{}", cli::render_book(&registry, &key.exchange_id, &key.market_id));
    }
    Ok(())
}

fn repl(mut registry: MarketRegistry) -> anyhow::Result<()> {
    println!("Type 'help' for available commands.");
    loop {
        print!("\npredlob> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break; // EOF
        }

        let cmd = match cli::parse(&input) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match cli::execute(&mut registry, &cmd) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Error: {e}"),
        }
        if cmd == Command::Quit {
            break;
        }
    }
    Ok(())
}
