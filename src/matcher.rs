use log::{debug, warn};

use crate::models::{FuelType, MatchMethod, MatchResult, Transaction, Vehicle};
use crate::oracle::{build_prompt, parse_reply, Candidate, Disambiguator};
use crate::thresholds::MatchConfig;

/// Match a fuel purchase to a fleet vehicle.
///
/// Stages run in strict precedence and the first one that decides wins:
/// direct id, missing odometer, odometer window, fuel compatibility, then a
/// single candidate (near or loose) or disambiguation among several. Only the
/// last stage talks to the oracle, and any oracle failure falls back to the
/// closest candidate. "No match" is a result, never an error.
pub fn match_vehicle(
    txn: &Transaction,
    fleet: &[Vehicle],
    config: &MatchConfig,
    oracle: &dyn Disambiguator,
) -> MatchResult {
    if let Some(vehicle) = direct_match(txn, fleet) {
        debug!("direct id match {}", vehicle.identifier);
        return MatchResult::matched(
            vehicle,
            MatchConfig::DIRECT_ID_CONFIDENCE,
            MatchMethod::DirectId,
            config.review_below,
        );
    }

    let odometer = match txn.odometer {
        Some(o) if o > 0 => o,
        _ => return MatchResult::unmatched("no odometer reading"),
    };

    let usable = usable_fleet(fleet);
    if usable.is_empty() {
        return MatchResult::unmatched("reference fleet is empty");
    }

    let in_window = within_window(&usable, odometer, config.odometer_window);
    if in_window.is_empty() {
        return MatchResult::unmatched("no candidate within odometer window");
    }

    let candidates = match transaction_fuel(txn, config) {
        Some(fuel) => filter_by_fuel(in_window, fuel),
        None => {
            debug!("fuel type unknown, skipping fuel filter");
            in_window
        }
    };

    match candidates.as_slice() {
        [] => MatchResult::unmatched("no fuel-compatible candidate within odometer window"),
        [only] if only.delta < config.tight_window => MatchResult::matched(
            only.vehicle,
            MatchConfig::NEAR_EXACT_CONFIDENCE,
            MatchMethod::OdometerProximity,
            config.review_below,
        ),
        [only] => MatchResult::matched(
            only.vehicle,
            config.loose_confidence,
            MatchMethod::OdometerProximity,
            config.review_below,
        )
        .forced_review()
        .with_reason("single candidate, odometer delta exceeds tight threshold"),
        several => disambiguate(txn, several, config, oracle),
    }
}

fn direct_match<'a>(txn: &Transaction, fleet: &'a [Vehicle]) -> Option<&'a Vehicle> {
    let wanted = txn.vehicle_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    fleet
        .iter()
        .find(|v| v.identifier.trim().eq_ignore_ascii_case(wanted))
}

fn usable_fleet(fleet: &[Vehicle]) -> Vec<&Vehicle> {
    fleet
        .iter()
        .filter(|v| {
            let ok = !v.identifier.trim().is_empty() && v.current_odometer >= 0;
            if !ok {
                warn!("skipping malformed reference vehicle {:?}", v.identifier);
            }
            ok
        })
        .collect()
}

/// Candidates within `window` of `odometer`, closest first, ties by identifier.
pub fn within_window<'a>(fleet: &[&'a Vehicle], odometer: i64, window: u64) -> Vec<Candidate<'a>> {
    let mut out: Vec<Candidate<'a>> = fleet
        .iter()
        .map(|v| Candidate {
            vehicle: *v,
            delta: v.current_odometer.abs_diff(odometer),
        })
        .filter(|c| c.delta <= window)
        .collect();
    out.sort_by(|a, b| {
        a.delta
            .cmp(&b.delta)
            .then_with(|| a.vehicle.identifier.cmp(&b.vehicle.identifier))
    });
    out
}

/// Keep only candidates burning `fuel`. Order is preserved, so applying the
/// filter twice gives the same set as applying it once.
pub fn filter_by_fuel(mut candidates: Vec<Candidate<'_>>, fuel: FuelType) -> Vec<Candidate<'_>> {
    candidates.retain(|c| c.vehicle.fuel_type == fuel);
    candidates
}

fn transaction_fuel(txn: &Transaction, config: &MatchConfig) -> Option<FuelType> {
    txn.fuel_type.or_else(|| {
        txn.product
            .as_deref()
            .and_then(|p| config.lexicon.classify_fuel(p))
    })
}

fn disambiguate(
    txn: &Transaction,
    candidates: &[Candidate<'_>],
    config: &MatchConfig,
    oracle: &dyn Disambiguator,
) -> MatchResult {
    let prompt = build_prompt(txn, candidates);
    let picked = oracle
        .disambiguate(&prompt)
        .and_then(|reply| parse_reply(&reply, candidates.len()));

    match picked {
        Ok((index, confidence)) => {
            let confidence = confidence.clamp(1, MatchConfig::MODEL_CONFIDENCE_CAP);
            let chosen = &candidates[index];
            debug!(
                "oracle picked {} of {} candidates at {confidence}",
                chosen.vehicle.identifier,
                candidates.len()
            );
            MatchResult::matched(chosen.vehicle, confidence, MatchMethod::ExternalModel, config.review_below)
        }
        Err(e) => {
            warn!("disambiguation failed, falling back to closest odometer: {e}");
            let closest = &candidates[0];
            MatchResult::matched(
                closest.vehicle,
                config.fallback_confidence,
                MatchMethod::OdometerProximity,
                config.review_below,
            )
            .forced_review()
            .with_reason(format!("disambiguation fallback: {e}"))
        }
    }
}

impl MatchResult {
    fn forced_review(mut self) -> Self {
        self.needs_review = true;
        self
    }
}
