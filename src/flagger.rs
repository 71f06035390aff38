use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::fmt::money;
use crate::models::{FlagResult, Transaction, Vehicle};
use crate::thresholds::FlagConfig;

const FUEL_CATEGORY: &str = "fuel";
const MEAL_CATEGORY: &str = "meal";

/// Rule-based anomaly check for a single transaction. Every rule that fires
/// appends a reason; there is no severity ranking.
pub fn flag_transaction(txn: &Transaction, config: &FlagConfig) -> FlagResult {
    let mut reasons = Vec::new();
    let amount = txn.amount.abs();
    let category = txn.category_name.to_lowercase();

    if let Some((key, ceiling)) = config.ceiling_for(&txn.category_name) {
        if amount > ceiling {
            reasons.push(format!(
                "{} exceeds the {key} ceiling of {}",
                money(amount),
                money(ceiling)
            ));
        }
    }

    if let Some(station) = config.lexicon.gas_stations.find(&txn.vendor_name) {
        if !category.contains(FUEL_CATEGORY) {
            reasons.push(format!(
                "vendor looks like a gas station ({station}) but category is '{}', expected {FUEL_CATEGORY}",
                txn.category_name
            ));
        }
    } else if let Some(restaurant) = config.lexicon.restaurants.find(&txn.vendor_name) {
        if !category.contains(MEAL_CATEGORY) {
            reasons.push(format!(
                "vendor looks like a restaurant ({restaurant}) but category is '{}', expected {MEAL_CATEGORY}",
                txn.category_name
            ));
        }
    }

    if let Some(word) = config.lexicon.personal.find(&txn.memo) {
        reasons.push(format!("memo mentions a personal expense ('{word}')"));
    }

    if amount > config.global_ceiling {
        reasons.push(format!(
            "{} exceeds the global ceiling of {}",
            money(amount),
            money(config.global_ceiling)
        ));
    }

    if !reasons.is_empty() {
        debug!("flagged {:?}: {}", txn.id, reasons.join("; "));
    }
    FlagResult { reasons }
}

/// `flag_transaction` plus odometer and fuel-economy checks against the
/// vehicle the purchase was matched to.
pub fn flag_fuel_purchase(txn: &Transaction, vehicle: Option<&Vehicle>, config: &FlagConfig) -> FlagResult {
    let mut result = flag_transaction(txn, config);
    let (Some(vehicle), Some(odometer)) = (vehicle, txn.odometer.filter(|o| *o > 0)) else {
        return result;
    };

    if odometer < vehicle.current_odometer {
        result.reasons.push(format!(
            "odometer {odometer} is below {}'s recorded {}",
            vehicle.identifier, vehicle.current_odometer
        ));
        return result;
    }

    let gallons = match txn.gallons {
        Some(g) if g > Decimal::ZERO => g,
        _ => return result,
    };
    let miles = odometer - vehicle.current_odometer;
    if miles == 0 {
        return result;
    }
    let Some(mpg) = (Decimal::from(miles) / gallons).to_f64() else {
        return result;
    };
    if mpg < config.mpg_min || mpg > config.mpg_max {
        result.reasons.push(format!(
            "fuel economy {mpg:.1} mpg outside {:.1}-{:.1} ({miles} mi on {gallons} gal)",
            config.mpg_min, config.mpg_max
        ));
    }
    result
}
