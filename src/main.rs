mod cli;
mod db;
mod error;
mod evaluator;
mod flagger;
mod fmt;
mod importer;
mod lexicon;
mod matcher;
mod models;
mod oracle;
mod reviewer;
mod settings;
mod thresholds;

use clap::Parser;
use env_logger::Env;

use cli::{Cli, Commands, ConfigCommands, ReportCommands, ReviewCommands, VehiclesCommands};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Vehicles { command } => match command {
            VehiclesCommands::Add {
                identifier,
                fuel,
                odometer,
                make,
                model,
            } => cli::vehicles::add(&identifier, &fuel, odometer, &make, &model),
            VehiclesCommands::List => cli::vehicles::list(),
            VehiclesCommands::Retire { identifier } => cli::vehicles::retire(&identifier),
        },
        Commands::Import { file, format } => cli::import::run(&file, format.as_deref()),
        Commands::Evaluate { rerun } => cli::evaluate::run(rerun),
        Commands::Review { command } => match command {
            ReviewCommands::List => cli::review::list(),
            ReviewCommands::Resolve {
                id,
                vehicle,
                clear_flag,
            } => cli::review::resolve_one(id, vehicle.as_deref(), clear_flag),
        },
        Commands::Report { command } => match command {
            ReportCommands::Flagged => cli::report::flagged(),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::Check => cli::config::check(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
