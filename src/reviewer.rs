use rusqlite::Connection;

use crate::db::{parse_decimal, vehicle_exists};
use crate::error::{ApnexusError, Result};

pub struct ReviewItem {
    pub id: i64,
    pub date: String,
    pub vendor: String,
    pub category: String,
    pub amount: String,
    pub odometer: Option<i64>,
    pub matched_vehicle: Option<String>,
    pub match_confidence: Option<u8>,
    pub match_method: Option<String>,
    pub match_reason: Option<String>,
    pub needs_review: bool,
    pub flag_reason: Option<String>,
}

impl ReviewItem {
    pub fn is_flagged(&self) -> bool {
        self.flag_reason.is_some()
    }

    pub fn amount(&self) -> rust_decimal::Decimal {
        parse_decimal(&self.amount).unwrap_or_default()
    }
}

fn query_items(conn: &Connection, filter: &str) -> Result<Vec<ReviewItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, date, vendor, category, amount, odometer, matched_vehicle, match_confidence, \
         match_method, match_reason, needs_review, flag_reason \
         FROM transactions WHERE reviewed_at IS NULL AND ({filter}) ORDER BY date, id"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            let needs_review: i32 = row.get(10)?;
            Ok(ReviewItem {
                id: row.get(0)?,
                date: row.get(1)?,
                vendor: row.get(2)?,
                category: row.get(3)?,
                amount: row.get(4)?,
                odometer: row.get(5)?,
                matched_vehicle: row.get(6)?,
                match_confidence: row.get(7)?,
                match_method: row.get(8)?,
                match_reason: row.get(9)?,
                needs_review: needs_review != 0,
                flag_reason: row.get(11)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Everything a person still has to look at: uncertain matches and flags.
pub fn get_review_queue(conn: &Connection) -> Result<Vec<ReviewItem>> {
    query_items(conn, "needs_review = 1 OR is_flagged = 1")
}

pub fn get_flagged_transactions(conn: &Connection) -> Result<Vec<ReviewItem>> {
    query_items(conn, "is_flagged = 1")
}

/// Close out a queued transaction. An assigned vehicle is recorded as a
/// manual match at full confidence; `clear_flag` drops the anomaly reasons.
/// The row is stamped reviewed either way so later reruns leave it alone.
pub fn resolve(conn: &Connection, transaction_id: i64, vehicle: Option<&str>, clear_flag: bool) -> Result<()> {
    let mut stmt = conn.prepare("SELECT 1 FROM transactions WHERE id = ?1")?;
    if !stmt.exists([transaction_id])? {
        return Err(ApnexusError::UnknownTransaction(transaction_id));
    }

    if let Some(identifier) = vehicle {
        let identifier = identifier.trim();
        if !vehicle_exists(conn, identifier)? {
            return Err(ApnexusError::UnknownVehicle(identifier.to_string()));
        }
        conn.execute(
            "UPDATE transactions SET matched_vehicle = ?1, match_confidence = 100, match_method = 'manual', \
             match_reason = NULL WHERE id = ?2",
            rusqlite::params![identifier, transaction_id],
        )?;
    }
    if clear_flag {
        conn.execute(
            "UPDATE transactions SET is_flagged = 0, flag_reason = NULL WHERE id = ?1",
            [transaction_id],
        )?;
    }
    conn.execute(
        "UPDATE transactions SET needs_review = 0, reviewed_at = datetime('now') WHERE id = ?1",
        [transaction_id],
    )?;
    Ok(())
}
