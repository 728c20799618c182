use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use drift_gate::alert::engine::evaluate_alerts;
use drift_gate::alert::rules::apply_alert_rules;
use drift_gate::alert::sink::{build_sinks, AlertSink};
use drift_gate::config::{Config, ConfigOverrides};
use drift_gate::drift::history::{record_from_outcome, summarize_runs};
use drift_gate::drift::{
    check_and_report, exit_code_for_error, CategoricalMethod, CheckOutcome, CheckStatus,
    NumericMethod,
};
use drift_gate::output::csv::{empty_scores_csv, runs_to_csv, scores_to_csv};
use drift_gate::output::json::{render_json, render_report_json};
use drift_gate::output::table::{render_dropped_table, render_history_table, render_scores_table};
use drift_gate::output::ReportFormat;
use drift_gate::server::run_server;
use drift_gate::snapshot::store::RunStore;
use drift_gate::snapshot::{LoadError, SnapshotFormat};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "drift-gate",
    version,
    about = "Detect data drift between two tabular snapshots and gate on it"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
struct CheckArgs {
    #[arg(long)]
    baseline: PathBuf,
    #[arg(long)]
    current: PathBuf,
    #[arg(long)]
    report: PathBuf,
    #[arg(long)]
    threshold: Option<f64>,
    /// Comma-separated columns to leave out of the comparison.
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,
    /// psi, wasserstein or ks.
    #[arg(long)]
    numeric_method: Option<NumericMethod>,
    /// psi or jensen_shannon.
    #[arg(long)]
    categorical_method: Option<CategoricalMethod>,
    /// auto, parquet or csv. Auto picks by file extension.
    #[arg(long)]
    snapshot_format: Option<SnapshotFormat>,
    #[arg(long)]
    record: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Check {
        #[command(flatten)]
        args: CheckArgs,
    },
    Watch {
        #[command(flatten)]
        args: CheckArgs,
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    History {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code_for_error(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    if let Commands::Check { args } | Commands::Watch { args, .. } = &cli.command {
        config.apply_overrides(ConfigOverrides {
            threshold: args.threshold,
            excluded_columns: args.exclude.clone(),
            report_format: args.format,
            record_runs: args.record.then_some(true),
            numeric_method: args.numeric_method,
            categorical_method: args.categorical_method,
            snapshot_format: args.snapshot_format,
        });
        config.validate()?;
    }

    match &cli.command {
        Commands::Check { args } => run_check_command(&config, args, cli.output),
        Commands::Watch {
            args,
            interval_secs,
            iterations,
        } => run_watch_loop(&config, args, cli.output, *interval_secs, *iterations).await,
        Commands::History { limit } => {
            let store = RunStore::open(&config.resolved_db_path())?;
            let records = store.load_runs((*limit).max(1))?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_history_table(&records));
                    println!("{}", summarize_runs(&records));
                }
                OutputFormat::Json => println!("{}", render_json(&records)?),
                OutputFormat::Csv => print!("{}", runs_to_csv(&records)?),
            }
            Ok(0)
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            run_server(config, addr).await?;
            Ok(0)
        }
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
            Ok(0)
        }
    }
}

fn run_check_command(config: &Config, args: &CheckArgs, output: OutputFormat) -> Result<u8> {
    let outcome = execute_check(config, args)?;
    print_outcome(&outcome, output)?;
    if config.storage.record_runs {
        let store = RunStore::open(&config.resolved_db_path())?;
        store.insert_run(&record_from_outcome(
            args.baseline.display().to_string(),
            args.current.display().to_string(),
            &outcome,
        ))?;
    }
    Ok(outcome.exit_code())
}

fn execute_check(config: &Config, args: &CheckArgs) -> Result<CheckOutcome> {
    check_and_report(
        &args.baseline,
        &args.current,
        Some(&args.report),
        &config.load_options(),
        &config.drift_settings(),
        config.report.format,
    )
}

async fn run_watch_loop(
    config: &Config,
    args: &CheckArgs,
    output: OutputFormat,
    interval_secs: u64,
    iterations: u32,
) -> Result<u8> {
    let sinks = build_sinks(config.alerts.enable_stdout, &config.alerts.webhook)?;
    let store = if config.storage.record_runs {
        Some(RunStore::open(&config.resolved_db_path())?)
    } else {
        None
    };
    let mut previous: Option<CheckStatus> = match &store {
        Some(store) => store.load_runs(1)?.first().map(|r| r.status),
        None => None,
    };

    let interval = Duration::from_secs(interval_secs.max(1));
    let total_iterations = iterations.max(1);
    let mut last_exit: Option<u8> = None;
    let mut last_load_error: Option<anyhow::Error> = None;

    for i in 0..total_iterations {
        info!("watch iteration {}", i + 1);
        match execute_check(config, args) {
            Ok(outcome) => {
                print_outcome(&outcome, output)?;
                let alerts = apply_alert_rules(
                    evaluate_alerts(previous, &outcome),
                    &config.alerts.rules,
                );
                dispatch_alerts(&sinks, &alerts).await;
                if let Some(store) = &store {
                    store.insert_run(&record_from_outcome(
                        args.baseline.display().to_string(),
                        args.current.display().to_string(),
                        &outcome,
                    ))?;
                }
                previous = Some(outcome.status());
                last_exit = Some(outcome.exit_code());
            }
            Err(err) if err.downcast_ref::<LoadError>().is_some() => {
                warn!("skipping watch iteration {}: {err:#}", i + 1);
                last_load_error = Some(err);
            }
            Err(err) => return Err(err),
        }

        if i + 1 < total_iterations {
            tokio::time::sleep(interval).await;
        }
    }

    match (last_exit, last_load_error) {
        (Some(code), _) => Ok(code),
        (None, Some(err)) => Err(err),
        (None, None) => Ok(0),
    }
}

async fn dispatch_alerts(
    sinks: &[Box<dyn AlertSink>],
    alerts: &[drift_gate::alert::engine::AlertEvent],
) {
    for alert in alerts {
        for sink in sinks {
            if let Err(err) = sink.send(alert).await {
                warn!("failed sending alert: {err}");
            }
        }
    }
}

fn print_outcome(outcome: &CheckOutcome, format: OutputFormat) -> Result<()> {
    match outcome {
        CheckOutcome::Evaluated { report, decision } => match format {
            OutputFormat::Table => {
                println!("{}", render_scores_table(report, decision));
                if !report.dropped.is_empty() {
                    println!("{}", render_dropped_table(&report.dropped));
                }
                println!("{}", outcome.message());
            }
            OutputFormat::Json => println!("{}", render_report_json(report, decision)?),
            OutputFormat::Csv => print!("{}", scores_to_csv(report, decision)?),
        },
        CheckOutcome::NoEvaluableFeatures(empty) => match format {
            OutputFormat::Table => {
                if !empty.dropped.is_empty() {
                    println!("{}", render_dropped_table(&empty.dropped));
                }
                println!("{}", empty.message());
            }
            OutputFormat::Json => println!("{}", render_json(empty)?),
            OutputFormat::Csv => print!("{}", empty_scores_csv()?),
        },
    }
    Ok(())
}

fn handle_config_command(
    init: bool,
    show: bool,
    config: &Config,
    config_path: &Path,
) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}
