//! Statement import runs
//!
//! A run reads a bank statement, loads the ledger, and walks every pending
//! record through reconcile, insert or skip. See [`Importer`] for the loop
//! and [`run_import`] for the whole run.

pub mod config;
pub mod session;

pub use config::*;
pub use session::*;

use crate::traits::*;
use crate::types::*;

/// Import `config.statement` into `config.ledger`
///
/// Missing inputs, unreadable files and an unresolvable target account end
/// the run with an error before any record is processed. A fatal error later
/// in the run comes back as [`ImportError::Interrupted`], carrying whatever
/// entries were already buffered.
pub fn run_import<P: Prompter>(
    config: &ImportConfig,
    reader: &dyn StatementReader,
    prompter: P,
) -> ImportResult<ImportReport> {
    config.validate()?;

    let statement = reader.read(&config.statement)?;
    tracing::info!(
        path = %config.statement.display(),
        account = %statement.account_id,
        transactions = statement.transactions.len(),
        "read statement"
    );

    let mut importer = Importer::from_config(config, &statement, prompter)?;
    if let Err(error) = importer.run(&statement.transactions) {
        let output = importer.finish().output;
        tracing::error!(error = %error, buffered = output.is_some(), "import interrupted");
        return Err(ImportError::Interrupted {
            error: Box::new(error),
            output,
        });
    }
    let report = importer.finish();
    tracing::info!(stats = %report.stats, "import finished");
    Ok(report)
}
