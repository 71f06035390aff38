use colored::Colorize;

use crate::error::Result;
use crate::settings::{load_settings, settings_path};

pub fn show() -> Result<()> {
    let settings = load_settings()?;
    let path = settings_path();
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    let json = serde_json::to_string_pretty(&settings)?;
    println!("{json}");
    Ok(())
}

/// Builds everything an evaluation run would, without touching the database.
pub fn check() -> Result<()> {
    let settings = load_settings()?;
    let config = settings.evaluator_config()?;
    settings.oracle.disambiguator()?;
    println!("{}", "Configuration OK".green());
    println!(
        "  odometer window {} mi (tight {} mi), review below {}%",
        config.matching.odometer_window, config.matching.tight_window, config.matching.review_below
    );
    let lexicon = &config.flagging.lexicon;
    println!(
        "  keywords: {} gas stations, {} restaurants, {} personal",
        lexicon.gas_stations.len(),
        lexicon.restaurants.len(),
        lexicon.personal.len()
    );
    match settings.oracle.endpoint.as_deref() {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            println!("  disambiguation via {endpoint} ({}s timeout)", settings.oracle.timeout_secs)
        }
        _ => println!("  disambiguation offline (closest-odometer fallback)"),
    }
    Ok(())
}
