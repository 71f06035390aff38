use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{confidence, money};
use crate::reviewer::{get_review_queue, resolve};

pub fn list() -> Result<()> {
    let (_, conn) = open_db()?;
    let queue = get_review_queue(&conn)?;

    if queue.is_empty() {
        println!("{}", "Nothing to review.".green());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Vendor", "Amount", "Odometer", "Vehicle", "Conf", "Why"]);
    for item in &queue {
        let vehicle = match (&item.matched_vehicle, item.needs_review) {
            (Some(v), true) => v.yellow().to_string(),
            (Some(v), false) => v.clone(),
            (None, _) if item.match_method.is_some() => "unmatched".red().to_string(),
            (None, _) => String::new(),
        };
        let why: Vec<&str> = item
            .match_reason
            .iter()
            .chain(item.flag_reason.iter())
            .map(String::as_str)
            .collect();
        let amount = if item.is_flagged() {
            money(item.amount()).red().to_string()
        } else {
            money(item.amount())
        };
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(&item.date),
            Cell::new(&item.vendor),
            Cell::new(amount),
            Cell::new(item.odometer.map(|o| o.to_string()).unwrap_or_default()),
            Cell::new(vehicle),
            Cell::new(confidence(item.match_confidence)),
            Cell::new(why.join("; ")),
        ]);
    }
    println!("Review Queue ({})\n{table}", queue.len());
    println!("Resolve with `apnexus review resolve <id> [--vehicle <identifier>] [--clear-flag]`.");
    Ok(())
}

pub fn resolve_one(id: i64, vehicle: Option<&str>, clear_flag: bool) -> Result<()> {
    let (_, conn) = open_db()?;
    resolve(&conn, id, vehicle, clear_flag)?;
    match vehicle {
        Some(v) => println!("Transaction {id} assigned to {}", v.trim()),
        None => println!("Transaction {id} marked reviewed"),
    }
    if clear_flag {
        println!("{}", "Flag cleared.".green());
    }
    Ok(())
}
