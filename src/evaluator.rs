use log::{debug, info, warn};
use rusqlite::Connection;

use crate::db::{load_fleet, reset_odometers, transaction_from_row, TRANSACTION_COLUMNS};
use crate::error::Result;
use crate::flagger::{flag_fuel_purchase, flag_transaction};
use crate::matcher::match_vehicle;
use crate::models::{FlagResult, MatchResult, Transaction, Vehicle};
use crate::oracle::Disambiguator;
use crate::thresholds::EvaluatorConfig;

#[derive(Debug, Default, PartialEq)]
pub struct EvaluateResult {
    pub evaluated: usize,
    pub matched: usize,
    pub needs_review: usize,
    pub flagged: usize,
    pub unreadable: usize,
}

/// Card purchases that should be tied to a fleet vehicle.
pub fn is_fuel_purchase(txn: &Transaction) -> bool {
    txn.odometer.is_some()
        || txn.vehicle_id.is_some()
        || txn.product.is_some()
        || txn.category_name.to_lowercase().contains("fuel")
}

/// Evaluate pending transactions (every unreviewed one when `rerun`) and
/// write the match and flag outcome back to each row.
///
/// The fleet is loaded once per call and transactions are walked in date
/// order, so a confident match advances the vehicle's odometer before the
/// next purchase is matched.
pub fn evaluate_transactions(
    conn: &Connection,
    config: &EvaluatorConfig,
    oracle: &dyn Disambiguator,
    rerun: bool,
) -> Result<EvaluateResult> {
    if rerun {
        // replay readings from each vehicle's registered odometer
        let reset = reset_odometers(conn)?;
        debug!("reset {reset} vehicle odometers for rerun");
    }
    let mut fleet = load_fleet(conn)?;
    if fleet.is_empty() {
        warn!("no active vehicles; fuel purchases will be left unmatched");
    }

    let filter = if rerun {
        "reviewed_at IS NULL"
    } else {
        "evaluated_at IS NULL AND reviewed_at IS NULL"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE {filter} ORDER BY date, id"
    ))?;
    let mut result = EvaluateResult::default();
    let pending: Vec<Transaction> = stmt
        .query_map([], transaction_from_row)?
        .filter_map(|r| match r {
            Ok(txn) => Some(txn),
            Err(e) => {
                warn!("skipping unreadable transaction: {e}");
                result.unreadable += 1;
                None
            }
        })
        .collect();

    for txn in &pending {
        let Some(id) = txn.id else { continue };
        let (matched, flags) = evaluate_one(txn, &fleet, config, oracle);

        if let Some(m) = &matched {
            if m.matched_id.is_some() {
                result.matched += 1;
            }
            if m.needs_review {
                result.needs_review += 1;
            }
        }
        if flags.flagged() {
            result.flagged += 1;
        }

        save_outcome(conn, id, matched.as_ref(), &flags)?;
        if let Some(m) = &matched {
            advance_odometer(conn, &mut fleet, txn, m)?;
        }
        result.evaluated += 1;
    }

    info!(
        "evaluated {} transactions: {} matched, {} need review, {} flagged",
        result.evaluated, result.matched, result.needs_review, result.flagged
    );
    Ok(result)
}

fn evaluate_one(
    txn: &Transaction,
    fleet: &[Vehicle],
    config: &EvaluatorConfig,
    oracle: &dyn Disambiguator,
) -> (Option<MatchResult>, FlagResult) {
    if !is_fuel_purchase(txn) {
        return (None, flag_transaction(txn, &config.flagging));
    }
    let matched = match_vehicle(txn, fleet, &config.matching, oracle);
    let vehicle = matched
        .matched_id
        .as_deref()
        .and_then(|id| fleet.iter().find(|v| v.identifier == id));
    let flags = flag_fuel_purchase(txn, vehicle, &config.flagging);
    debug!(
        "txn {:?}: {} ({}%), {} flag reasons",
        txn.id,
        matched.method,
        matched.confidence,
        flags.reasons.len()
    );
    (Some(matched), flags)
}

fn save_outcome(conn: &Connection, id: i64, matched: Option<&MatchResult>, flags: &FlagResult) -> Result<()> {
    let match_reason = matched.and_then(|m| {
        if m.reasons.is_empty() {
            None
        } else {
            Some(m.reasons.join("; "))
        }
    });
    conn.execute(
        "UPDATE transactions SET evaluated_at = datetime('now'), matched_vehicle = ?1, match_confidence = ?2, \
         match_method = ?3, match_reason = ?4, needs_review = ?5, is_flagged = ?6, flag_reason = ?7 WHERE id = ?8",
        rusqlite::params![
            matched.and_then(|m| m.matched_id.clone()),
            matched.map(|m| m.confidence),
            matched.map(|m| m.method.as_str()),
            match_reason,
            matched.map(|m| m.needs_review).unwrap_or(false) as i32,
            flags.flagged() as i32,
            flags.summary(),
            id,
        ],
    )?;
    Ok(())
}

fn advance_odometer(conn: &Connection, fleet: &mut [Vehicle], txn: &Transaction, m: &MatchResult) -> Result<()> {
    if m.needs_review {
        return Ok(());
    }
    let (Some(id), Some(odometer)) = (m.matched_id.as_deref(), txn.odometer) else {
        return Ok(());
    };
    if let Some(vehicle) = fleet.iter_mut().find(|v| v.identifier == id) {
        if odometer > vehicle.current_odometer {
            conn.execute(
                "UPDATE vehicles SET current_odometer = ?1 WHERE identifier = ?2",
                rusqlite::params![odometer, id],
            )?;
            debug!("{id} odometer {} -> {odometer}", vehicle.current_odometer);
            vehicle.current_odometer = odometer;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::insert_transaction;
    use crate::db::testing::{add_vehicle, test_db};
    use crate::models::FuelType;
    use crate::oracle::stub::StubDisambiguator;
    use crate::oracle::OracleError;
    use crate::thresholds::ThresholdSettings;

    fn config() -> EvaluatorConfig {
        EvaluatorConfig::from_settings(&ThresholdSettings::default()).unwrap()
    }

    fn fuel_txn(day: u32, odometer: i64, product: &str, amount: Decimal) -> Transaction {
        let mut t = Transaction::new(NaiveDate::from_ymd_opt(2025, 5, day).unwrap(), amount);
        t.vendor_name = "PILOT 118".into();
        t.category_name = "Fuel".into();
        t.odometer = Some(odometer);
        t.product = Some(product.into());
        t
    }

    fn row_outcome(conn: &Connection, id: i64) -> (Option<String>, Option<i64>, Option<String>, i32, i32, Option<String>) {
        conn.query_row(
            "SELECT matched_vehicle, match_confidence, match_method, needs_review, is_flagged, flag_reason \
             FROM transactions WHERE id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate_matches_and_persists() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 49_500, FuelType::Diesel);
        add_vehicle(&conn, "V2", 80_000, FuelType::Gasoline);
        let id = insert_transaction(&conn, &fuel_txn(3, 50_000, "DIESEL", dec!(95.20)), None).unwrap();

        let oracle = StubDisambiguator::failing(OracleError::Unavailable);
        let result = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(result.evaluated, 1);
        assert_eq!(result.matched, 1);
        assert_eq!(result.needs_review, 0);

        let (vehicle, conf, method, review, flagged, _) = row_outcome(&conn, id);
        assert_eq!(vehicle.as_deref(), Some("V1"));
        assert_eq!(conf, Some(95));
        assert_eq!(method.as_deref(), Some("odometer_proximity"));
        assert_eq!(review, 0);
        assert_eq!(flagged, 0);

        let odo: i64 = conn
            .query_row("SELECT current_odometer FROM vehicles WHERE identifier = 'V1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(odo, 50_000);
    }

    #[test]
    fn test_evaluate_skips_already_evaluated_unless_rerun() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 49_500, FuelType::Diesel);
        insert_transaction(&conn, &fuel_txn(3, 50_000, "DIESEL", dec!(95.20)), None).unwrap();
        let oracle = StubDisambiguator::failing(OracleError::Unavailable);
        evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        let again = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(again.evaluated, 0);
        let rerun = evaluate_transactions(&conn, &config(), &oracle, true).unwrap();
        assert_eq!(rerun.evaluated, 1);
    }

    #[test]
    fn test_rerun_does_not_flag_earlier_fills() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Gasoline);
        let mut first = fuel_txn(1, 10_300, "UNL", dec!(42));
        first.gallons = Some(dec!(15));
        let first = insert_transaction(&conn, &first, None).unwrap();
        let mut second = fuel_txn(8, 10_600, "UNL", dec!(42));
        second.gallons = Some(dec!(15));
        insert_transaction(&conn, &second, None).unwrap();
        let oracle = StubDisambiguator::failing(OracleError::Unavailable);

        let initial = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(initial.flagged, 0);
        let rerun = evaluate_transactions(&conn, &config(), &oracle, true).unwrap();
        assert_eq!(rerun.evaluated, 2);
        assert_eq!(rerun.flagged, 0);
        assert_eq!(rerun.matched, 2);

        let (vehicle, conf, _, review, flagged, reason) = row_outcome(&conn, first);
        assert_eq!(vehicle.as_deref(), Some("V1"));
        assert_eq!(conf, Some(95));
        assert_eq!(review, 0);
        assert_eq!(flagged, 0, "{reason:?}");
        let odo: i64 = conn
            .query_row("SELECT current_odometer FROM vehicles WHERE identifier = 'V1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(odo, 10_600);
    }

    #[test]
    fn test_non_fuel_transactions_only_flagged() {
        let (_dir, conn) = test_db();
        let mut t = Transaction::new(NaiveDate::from_ymd_opt(2025, 5, 9).unwrap(), dec!(2500));
        t.vendor_name = "Staples".into();
        t.category_name = "office".into();
        let id = insert_transaction(&conn, &t, None).unwrap();
        let oracle = StubDisambiguator::failing(OracleError::Unavailable);
        let result = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(result.flagged, 1);
        assert_eq!(result.matched, 0);
        let (vehicle, conf, method, review, flagged, reason) = row_outcome(&conn, id);
        assert!(vehicle.is_none() && conf.is_none() && method.is_none());
        assert_eq!(review, 0);
        assert_eq!(flagged, 1);
        assert!(reason.unwrap().contains("office ceiling"));
    }

    #[test]
    fn test_odometer_advances_in_date_order() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Gasoline);
        // inserted out of order on purpose
        let later = insert_transaction(&conn, &fuel_txn(20, 10_900, "UNL", dec!(40)), None).unwrap();
        insert_transaction(&conn, &fuel_txn(10, 10_400, "UNL", dec!(40)), None).unwrap();
        let oracle = StubDisambiguator::failing(OracleError::Unavailable);
        let result = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(result.matched, 2);
        // the later fill is 500 from the advanced odometer, not 900
        let (_, conf, _, review, _, _) = row_outcome(&conn, later);
        assert_eq!(conf, Some(95));
        assert_eq!(review, 0);
        let odo: i64 = conn
            .query_row("SELECT current_odometer FROM vehicles WHERE identifier = 'V1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(odo, 10_900);
    }

    #[test]
    fn test_review_results_do_not_advance_odometer() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Diesel);
        add_vehicle(&conn, "V2", 10_200, FuelType::Diesel);
        let id = insert_transaction(&conn, &fuel_txn(2, 10_100, "DSL", dec!(60)), None).unwrap();
        let oracle = StubDisambiguator::replying("no idea");
        let result = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(result.needs_review, 1);
        let (_, conf, _, review, _, _) = row_outcome(&conn, id);
        assert_eq!(conf, Some(65));
        assert_eq!(review, 1);
        let odos: Vec<i64> = conn
            .prepare("SELECT current_odometer FROM vehicles ORDER BY identifier")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(odos, vec![10_000, 10_200]);
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO transactions (date, amount) VALUES ('not-a-date', '12.00')",
            [],
        )
        .unwrap();
        let oracle = StubDisambiguator::failing(OracleError::Unavailable);
        let result = evaluate_transactions(&conn, &config(), &oracle, false).unwrap();
        assert_eq!(result.unreadable, 1);
        assert_eq!(result.evaluated, 0);
    }
}
