use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::db::{insert_transaction, parse_decimal};
use crate::error::{ApnexusError, Result};
use crate::models::{FuelType, Transaction};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return parse_decimal(inner).map(|d| -d);
    }
    parse_decimal(s)
}

/// Accepts `MM/DD/YYYY` (card statements) and `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn parse_odometer(raw: &str) -> Option<i64> {
    let s = raw.replace(',', "");
    s.trim().parse::<i64>().ok().filter(|o| *o > 0)
}

fn non_empty(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn is_duplicate_row(conn: &Connection, txn: &Transaction) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions WHERE date = ?1 AND amount = ?2 AND vendor = ?3 \
         AND odometer IS ?4 AND card_vehicle IS ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        txn.transaction_date.format("%Y-%m-%d").to_string(),
        txn.amount.to_string(),
        txn.vendor_name,
        txn.odometer,
        txn.vehicle_id,
    ])?)
}

/// Lowercased header name -> column index.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_lowercase(), i))
                .collect(),
        )
    }

    fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// First alias present in the header wins.
    fn get<'r>(&self, record: &'r csv::StringRecord, aliases: &[&str]) -> &'r str {
        aliases
            .iter()
            .find_map(|a| self.0.get(*a))
            .and_then(|i| record.get(*i))
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Import formats, enum dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImportFormat {
    FuelCard,
    Expenses,
}

const ALL_FORMATS: &[ImportFormat] = &[ImportFormat::FuelCard, ImportFormat::Expenses];

impl ImportFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::FuelCard => "fuel_card",
            Self::Expenses => "expenses",
        }
    }

    fn detect(&self, columns: &Columns) -> bool {
        match self {
            Self::FuelCard => columns.has("odometer") || columns.has("gallons") || columns.has("product"),
            Self::Expenses => columns.has("category") && (columns.has("vendor") || columns.has("merchant")),
        }
    }

    fn row(&self, columns: &Columns, record: &csv::StringRecord) -> Option<Transaction> {
        let date = parse_date(columns.get(record, &["date", "transaction date"]))?;
        let amount = parse_amount(columns.get(record, &["amount", "total"]))?;
        let mut txn = Transaction::new(date, amount);
        txn.vendor_name = columns.get(record, &["merchant", "vendor", "site"]).trim().to_string();
        txn.memo = columns.get(record, &["memo", "notes", "description"]).trim().to_string();
        match self {
            Self::FuelCard => {
                txn.category_name = non_empty(columns.get(record, &["category"])).unwrap_or_else(|| "Fuel".into());
                txn.vehicle_id = non_empty(columns.get(record, &["vehicle", "vehicle id", "unit", "asset"]));
                txn.product = non_empty(columns.get(record, &["product", "product description"]));
                txn.gallons = parse_decimal(columns.get(record, &["gallons", "quantity"]).replace(',', "").as_str())
                    .filter(|g| *g > Decimal::ZERO);
                txn.odometer = parse_odometer(columns.get(record, &["odometer", "mileage"]));
                txn.fuel_type = columns.get(record, &["fuel type"]).parse::<FuelType>().ok();
            }
            Self::Expenses => {
                txn.category_name = columns.get(record, &["category"]).trim().to_string();
            }
        }
        Some(txn)
    }

    pub fn parse(&self, file_path: &Path) -> Result<ParsedFile> {
        let file = std::fs::File::open(file_path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(std::io::BufReader::new(file));
        let columns = Columns::new(rdr.headers()?);
        let mut parsed = ParsedFile::default();
        for (line, result) in rdr.records().enumerate() {
            let Ok(record) = result else {
                parsed.rejected += 1;
                continue;
            };
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            match self.row(&columns, &record) {
                Some(txn) => parsed.rows.push(txn),
                None => {
                    warn!("{}: row {} has no readable date or amount", file_path.display(), line + 2);
                    parsed.rejected += 1;
                }
            }
        }
        Ok(parsed)
    }
}

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub rows: Vec<Transaction>,
    pub rejected: usize,
}

pub fn get_by_key(key: &str) -> Option<ImportFormat> {
    ALL_FORMATS.iter().find(|f| f.key() == key).copied()
}

pub fn detect_format(file_path: &Path) -> Result<Option<ImportFormat>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let columns = Columns::new(rdr.headers()?);
    Ok(ALL_FORMATS.iter().find(|f| f.detect(&columns)).copied())
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub duplicate_file: bool,
}

pub fn import_file(conn: &Connection, file_path: &Path, format_key: Option<&str>) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
        if stmt.exists([&checksum])? {
            return Ok(ImportResult {
                imported: 0,
                skipped: 0,
                rejected: 0,
                duplicate_file: true,
            });
        }
    }

    let format = match format_key {
        Some(key) => get_by_key(key).ok_or_else(|| ApnexusError::UnknownFormat(key.to_string()))?,
        None => detect_format(file_path)?.ok_or_else(|| {
            ApnexusError::UnknownFormat(format!("could not detect the format of {}", file_path.display()))
        })?,
    };

    let parsed = format.parse(file_path)?;

    conn.execute(
        "INSERT INTO imports (filename, format, record_count, checksum) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            format.key(),
            parsed.rows.len() as i64,
            checksum,
        ],
    )?;
    let import_id = conn.last_insert_rowid();

    let mut imported = 0usize;
    let mut skipped = 0usize;
    for txn in &parsed.rows {
        if is_duplicate_row(conn, txn)? {
            skipped += 1;
            continue;
        }
        insert_transaction(conn, txn, Some(import_id))?;
        imported += 1;
    }

    info!(
        "imported {imported} {} rows from {} ({skipped} duplicates, {} rejected)",
        format.key(),
        file_path.display(),
        parsed.rejected
    );
    Ok(ImportResult {
        imported,
        skipped,
        rejected: parsed.rejected,
        duplicate_file: false,
    })
}
