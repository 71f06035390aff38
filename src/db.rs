use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use log::warn;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{FuelType, Transaction, Vehicle};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vehicles (
    id INTEGER PRIMARY KEY,
    identifier TEXT NOT NULL UNIQUE,
    make TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL DEFAULT '',
    fuel_type TEXT NOT NULL,
    current_odometer INTEGER NOT NULL DEFAULT 0,
    initial_odometer INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    format TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    vendor TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    memo TEXT NOT NULL DEFAULT '',
    amount TEXT NOT NULL,
    odometer INTEGER,
    fuel_type TEXT,
    card_vehicle TEXT,
    product TEXT,
    gallons TEXT,
    import_id INTEGER,
    evaluated_at TEXT,
    matched_vehicle TEXT,
    match_confidence INTEGER,
    match_method TEXT,
    match_reason TEXT,
    needs_review INTEGER DEFAULT 0,
    is_flagged INTEGER DEFAULT 0,
    flag_reason TEXT,
    reviewed_at TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_unevaluated ON transactions(evaluated_at);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

fn to_sql_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

pub const TRANSACTION_COLUMNS: &str =
    "id, date, vendor, category, memo, amount, odometer, fuel_type, card_vehicle, product, gallons";

/// Map a row selected with `TRANSACTION_COLUMNS`.
pub fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date: String = row.get(1)?;
    let amount: String = row.get(5)?;
    let fuel_type: Option<String> = row.get(7)?;
    let gallons: Option<String> = row.get(10)?;
    Ok(Transaction {
        id: Some(row.get(0)?),
        transaction_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| to_sql_error(1, format!("bad date '{date}': {e}")))?,
        vendor_name: row.get(2)?,
        category_name: row.get(3)?,
        memo: row.get(4)?,
        amount: parse_decimal(&amount).ok_or_else(|| to_sql_error(5, format!("bad amount '{amount}'")))?,
        odometer: row.get(6)?,
        fuel_type: fuel_type.and_then(|f| f.parse::<FuelType>().ok()),
        vehicle_id: row.get(8)?,
        product: row.get(9)?,
        gallons: gallons.as_deref().and_then(parse_decimal),
    })
}

pub fn insert_transaction(conn: &Connection, txn: &Transaction, import_id: Option<i64>) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (date, vendor, category, memo, amount, odometer, fuel_type, card_vehicle, product, gallons, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            txn.transaction_date.format("%Y-%m-%d").to_string(),
            txn.vendor_name,
            txn.category_name,
            txn.memo,
            txn.amount.to_string(),
            txn.odometer,
            txn.fuel_type.map(|f| f.as_str()),
            txn.vehicle_id,
            txn.product,
            txn.gallons.map(|g| g.to_string()),
            import_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_vehicle(conn: &Connection, vehicle: &Vehicle) -> Result<i64> {
    conn.execute(
        "INSERT INTO vehicles (identifier, make, model, fuel_type, current_odometer, initial_odometer) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![
            vehicle.identifier.trim(),
            vehicle.make,
            vehicle.model,
            vehicle.fuel_type.as_str(),
            vehicle.current_odometer,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Active fleet, read fresh on every call. Rows with an unreadable fuel type
/// are skipped with a warning rather than failing the whole load.
pub fn load_fleet(conn: &Connection) -> Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(
        "SELECT identifier, make, model, fuel_type, current_odometer FROM vehicles \
         WHERE is_active = 1 ORDER BY identifier",
    )?;
    let rows: Vec<(String, String, String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut fleet = Vec::with_capacity(rows.len());
    for (identifier, make, model, fuel, current_odometer) in rows {
        match fuel.parse::<FuelType>() {
            Ok(fuel_type) => fleet.push(Vehicle {
                identifier,
                current_odometer,
                fuel_type,
                make,
                model,
            }),
            Err(e) => warn!("skipping vehicle {identifier}: {e}"),
        }
    }
    Ok(fleet)
}

/// Put every vehicle back on the odometer it was registered with, so a full
/// re-evaluation replays readings from the start.
pub fn reset_odometers(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("UPDATE vehicles SET current_odometer = initial_odometer", [])?)
}

pub fn vehicle_exists(conn: &Connection, identifier: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM vehicles WHERE identifier = ?1 AND is_active = 1")?;
    Ok(stmt.exists([identifier.trim()])?)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    pub fn add_vehicle(conn: &Connection, id: &str, odo: i64, fuel: FuelType) {
        insert_vehicle(
            conn,
            &Vehicle {
                identifier: id.into(),
                current_odometer: odo,
                fuel_type: fuel,
                make: "Ford".into(),
                model: "F-250".into(),
            },
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::testing::*;
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["vehicles", "transactions", "imports"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_transaction_roundtrip_keeps_decimals() {
        let (_dir, conn) = test_db();
        let mut txn = Transaction::new(NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(), dec!(101.37));
        txn.vendor_name = "LOVE'S #512".into();
        txn.odometer = Some(88_120);
        txn.gallons = Some(dec!(23.418));
        txn.fuel_type = Some(FuelType::Diesel);
        let id = insert_transaction(&conn, &txn, None).unwrap();

        let loaded = conn
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
                [id],
                transaction_from_row,
            )
            .unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.amount, dec!(101.37));
        assert_eq!(loaded.gallons, Some(dec!(23.418)));
        assert_eq!(loaded.fuel_type, Some(FuelType::Diesel));
        assert_eq!(loaded.vendor_name, "LOVE'S #512");
    }

    #[test]
    fn test_load_fleet_skips_retired_and_unreadable() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Diesel);
        add_vehicle(&conn, "V2", 20_000, FuelType::Gasoline);
        conn.execute("UPDATE vehicles SET is_active = 0 WHERE identifier = 'V2'", []).unwrap();
        conn.execute(
            "INSERT INTO vehicles (identifier, fuel_type) VALUES ('V3', 'hydrogen')",
            [],
        )
        .unwrap();
        let fleet = load_fleet(&conn).unwrap();
        assert_eq!(fleet.len(), 1);
        assert_eq!(fleet[0].identifier, "V1");
        assert!(vehicle_exists(&conn, "V1").unwrap());
        assert!(!vehicle_exists(&conn, "V2").unwrap());
    }

    #[test]
    fn test_reset_odometers_restores_registration_reading() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Diesel);
        conn.execute("UPDATE vehicles SET current_odometer = 12500", []).unwrap();
        assert_eq!(load_fleet(&conn).unwrap()[0].current_odometer, 12_500);
        reset_odometers(&conn).unwrap();
        assert_eq!(load_fleet(&conn).unwrap()[0].current_odometer, 10_000);
    }

    #[test]
    fn test_duplicate_vehicle_identifier_rejected() {
        let (_dir, conn) = test_db();
        add_vehicle(&conn, "V1", 10_000, FuelType::Diesel);
        let dup = Vehicle {
            identifier: "V1".into(),
            current_odometer: 0,
            fuel_type: FuelType::Diesel,
            make: String::new(),
            model: String::new(),
        };
        assert!(insert_vehicle(&conn, &dup).is_err());
    }
}
