use std::path::PathBuf;

use crate::cli::evaluate::{evaluate_pending, print_summary};
use crate::cli::open_db;
use crate::error::Result;
use crate::importer::import_file;

pub fn run(file: &str, format: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (settings, conn) = open_db()?;

    let result = import_file(&conn, &file_path, format)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} imported, {} skipped (duplicates), {} rejected",
        result.imported, result.skipped, result.rejected
    );

    let eval = evaluate_pending(&conn, &settings, false)?;
    print_summary(&eval);
    Ok(())
}
