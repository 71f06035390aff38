use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::reviewer::get_flagged_transactions;

pub fn flagged() -> Result<()> {
    let (_, conn) = open_db()?;
    let rows = get_flagged_transactions(&conn)?;

    if rows.is_empty() {
        println!("No flagged transactions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Vendor", "Category", "Amount", "Reason"]);
    for r in &rows {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.date),
            Cell::new(&r.vendor),
            Cell::new(&r.category),
            Cell::new(money(r.amount()).red().to_string()),
            Cell::new(r.flag_reason.as_deref().unwrap_or_default()),
        ]);
    }
    println!("Flagged Transactions ({})\n{table}", rows.len());
    Ok(())
}
