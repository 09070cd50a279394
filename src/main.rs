use bean_import::{
    run_import, ConsolePrompter, ImportConfig, ImportError, OfxReader, Period, DEFAULT_PAYEES,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Reconcile an OFX statement against a beancount LEDGER and write new
/// entries to stdout
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The OFX file to parse
    statement: PathBuf,

    /// The beancount ledger to reconcile against
    ledger: PathBuf,

    /// Append new entries to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only import a year, month or day: YYYY, YYYY-MM or YYYY-MM-DD
    #[arg(long)]
    period: Option<Period>,

    /// Ledger account to reconcile; found through `accid` metadata by default
    #[arg(long)]
    account: Option<String>,

    /// Payee file used for name substitutions
    #[arg(long, default_value = DEFAULT_PAYEES)]
    payees: PathBuf,

    /// Use the ledger's operating currency for every posting without asking
    #[arg(short, long)]
    default_currency: bool,

    /// Currency to use instead of the ledger's operating currency
    #[arg(long)]
    currency: Option<String>,

    /// Only match entries dated within this many days of the bank record
    #[arg(long)]
    window: Option<i64>,
}

impl From<Cli> for ImportConfig {
    fn from(cli: Cli) -> Self {
        ImportConfig {
            output: cli.output,
            period: cli.period,
            account: cli.account,
            payees: cli.payees,
            use_default_currency: cli.default_currency,
            currency: cli.currency,
            match_window_days: cli.window,
            ..ImportConfig::new(cli.statement, cli.ledger)
        }
    }
}

fn main() -> ExitCode {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging disabled: {}", e);
    }

    let config = ImportConfig::from(Cli::parse());
    eprintln!("OFX File: {}", config.statement.display());
    eprintln!("LEDGER File: {}", config.ledger.display());
    eprintln!("PAYEES File: {}", config.payees.display());
    if let Some(output) = &config.output {
        eprintln!("OUTPUT File: {}", output.display());
    }

    match run_import(&config, &OfxReader::new(), ConsolePrompter::stdio()) {
        Ok(report) => {
            if let Err(e) = emit(report.output.as_deref()) {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
            eprintln!("{}", report.stats);
            ExitCode::SUCCESS
        }
        Err(ImportError::Interrupted { error, output }) => {
            if let Err(e) = emit(output.as_deref()) {
                eprintln!("error: {}", e);
            }
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Write buffered entries to stdout
fn emit(output: Option<&str>) -> std::io::Result<()> {
    let Some(output) = output else {
        return Ok(());
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()
}
