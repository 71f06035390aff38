use rusqlite::Connection;

use crate::cli::open_db;
use crate::error::Result;
use crate::evaluator::{evaluate_transactions, EvaluateResult};
use crate::settings::Settings;

pub(crate) fn evaluate_pending(conn: &Connection, settings: &Settings, rerun: bool) -> Result<EvaluateResult> {
    let config = settings.evaluator_config()?;
    let oracle = settings.oracle.disambiguator()?;
    evaluate_transactions(conn, &config, oracle.as_ref(), rerun)
}

pub(crate) fn print_summary(result: &EvaluateResult) {
    println!(
        "{} evaluated: {} matched, {} need review, {} flagged",
        result.evaluated, result.matched, result.needs_review, result.flagged
    );
    if result.unreadable > 0 {
        println!("{} rows could not be read and were skipped", result.unreadable);
    }
}

pub fn run(rerun: bool) -> Result<()> {
    let (settings, conn) = open_db()?;
    let result = evaluate_pending(&conn, &settings, rerun)?;
    print_summary(&result);
    Ok(())
}
