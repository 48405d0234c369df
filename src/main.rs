use clap::Parser;
use stampede::batch::{self, BatchRunner};
use stampede::common::ShutdownSignal;
use stampede::config::parser::{Cli, Command};
use stampede::config::scenarios::{self, Selection};
use stampede::config::{Config, validation};
use stampede::errors::Result;
use stampede::metrics::reporting;
use stampede::metrics::aggregate::aggregate;
use stampede::realtime;
use stampede::report;
use stampede::runner::LoadTestRunner;
use stampede::verdict;
use std::process;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    // Initialize the application and run
    if let Err(e) = run().await {
        error!("Application failed: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = Config::from(args);
            init_logging(&config);
            banner();
            validation::validate(&config)?;
            execute_run(config).await
        }
        Command::Quick(args) => {
            let base = args.into_config();
            init_logging(&base);
            banner();
            match scenarios::pick_interactive(&base)? {
                Selection::Config(config) => {
                    validation::validate(&config)?;
                    execute_run(config).await
                }
                Selection::Quit => {
                    println!("\nBye!\n");
                    Ok(())
                }
            }
        }
        Command::Batch(args) => {
            let base = args.into_config();
            init_logging(&base);
            banner();
            validation::validate(&base)?;
            execute_batch(base).await
        }
    }
}

/// Run one scenario end to end: orchestrate, aggregate, assess, report
async fn execute_run(config: Config) -> Result<()> {
    config.print_summary();

    let backend = realtime::backend_for(&config);
    let shutdown_tx = spawn_signal_handler();
    let mut runner = LoadTestRunner::new(
        config.clone(),
        backend,
        ShutdownSignal::new(shutdown_tx.subscribe()),
    );

    let metrics = runner.run().await?;
    let statistics = aggregate(&metrics);
    let assessment = verdict::assess(&metrics, &statistics);

    reporting::print_report(&config, &metrics, &statistics, &assessment);
    report::save_run_report(&config.output.report_dir, &config, &metrics, &statistics)?;

    // A completed run exits 0 regardless of the verdict
    Ok(())
}

/// Run the batch ladder and persist the comparison
async fn execute_batch(base: Config) -> Result<()> {
    let backend = realtime::backend_for(&base);
    let shutdown_tx = spawn_signal_handler();
    let ladder = scenarios::batch_scenarios(&base);

    let mut batch_runner = BatchRunner::new(ladder, backend).with_shutdown(shutdown_tx);
    let results = batch_runner.run().await;

    batch::print_comparison(&results);
    batch::save_report(&results, &base)?;
    Ok(())
}

/// Translate Ctrl+C into the graceful-shutdown broadcast
fn spawn_signal_handler() -> broadcast::Sender<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        warn!("Received Ctrl+C, initiating graceful shutdown...");
        let _ = tx.send(());
    });
    shutdown_tx
}

fn banner() {
    info!("🐎 Stampede - Realtime Presence/Broadcast Load Testing Tool");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
}

/// Initialize logging based on configuration
fn init_logging(config: &Config) {
    let stampede_level = if config.output.verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    format!("stampede={}", stampede_level)
                        .parse()
                        .expect("Invalid filter directive"),
                )
                .add_directive(
                    "tokio_tungstenite=warn"
                        .parse()
                        .expect("Invalid filter directive"),
                )
                .add_directive(
                    "tungstenite=warn"
                        .parse()
                        .expect("Invalid filter directive"),
                ),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    if config.output.verbose {
        info!("Verbose logging enabled");
    }
}
