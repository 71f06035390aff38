pub mod config;
pub mod evaluate;
pub mod import;
pub mod init;
pub mod report;
pub mod review;
pub mod status;
pub mod vehicles;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{ApnexusError, Result};
use crate::settings::{load_settings, Settings};

/// Settings plus a connection to an initialized database.
pub(crate) fn open_db() -> Result<(Settings, Connection)> {
    let settings = load_settings()?;
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(ApnexusError::Other(format!(
            "Database not found at {}. Run `apnexus init` first.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    Ok((settings, conn))
}

#[derive(Parser)]
#[command(
    name = "apnexus",
    version,
    about = "Match fuel-card purchases to fleet vehicles and flag unusual expenses."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for APNexus data (default: ~/Documents/apnexus)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage the reference fleet.
    Vehicles {
        #[command(subcommand)]
        command: VehiclesCommands,
    },
    /// Import a fuel-card or expense CSV and evaluate the new rows.
    Import {
        /// Path to the CSV file
        file: String,
        /// Format key: fuel_card or expenses (detected from the header if omitted)
        #[arg(long)]
        format: Option<String>,
    },
    /// Match and flag transactions that have not been evaluated yet.
    Evaluate {
        /// Re-evaluate every transaction that has not been reviewed
        #[arg(long)]
        rerun: bool,
    },
    /// Work the review queue.
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Inspect and validate settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum VehiclesCommands {
    /// Add a vehicle to the fleet.
    Add {
        /// Fleet identifier, e.g. 'TRK-12'
        identifier: String,
        /// Fuel type: gasoline or diesel
        #[arg(long)]
        fuel: String,
        /// Current odometer reading
        #[arg(long, default_value = "0")]
        odometer: i64,
        #[arg(long, default_value = "")]
        make: String,
        #[arg(long, default_value = "")]
        model: String,
    },
    /// List active vehicles.
    List,
    /// Remove a vehicle from matching without deleting its history.
    Retire {
        identifier: String,
    },
}

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List transactions needing review or flagged.
    List,
    /// Resolve one queued transaction.
    Resolve {
        /// Transaction ID (shown in `apnexus review list`)
        id: i64,
        /// Assign this vehicle as a manual match
        #[arg(long)]
        vehicle: Option<String>,
        /// Clear the anomaly flag
        #[arg(long = "clear-flag")]
        clear_flag: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Show all flagged transactions with their reasons.
    Flagged,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Validate thresholds and the disambiguation service settings.
    Check,
}
