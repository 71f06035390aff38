use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::{insert_vehicle, vehicle_exists};
use crate::error::{ApnexusError, Result};
use crate::models::{FuelType, Vehicle};

pub fn add(identifier: &str, fuel: &str, odometer: i64, make: &str, model: &str) -> Result<()> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(ApnexusError::Other("vehicle identifier cannot be blank".into()));
    }
    if odometer < 0 {
        return Err(ApnexusError::Other(format!("odometer cannot be negative, got {odometer}")));
    }
    let fuel_type: FuelType = fuel.parse().map_err(ApnexusError::Other)?;

    let (_, conn) = open_db()?;
    insert_vehicle(
        &conn,
        &Vehicle {
            identifier: identifier.to_string(),
            current_odometer: odometer,
            fuel_type,
            make: make.to_string(),
            model: model.to_string(),
        },
    )?;
    println!("Added vehicle: {identifier} ({fuel_type}, {odometer} mi)");
    Ok(())
}

pub fn list() -> Result<()> {
    let (_, conn) = open_db()?;
    let mut stmt = conn.prepare(
        "SELECT identifier, make, model, fuel_type, current_odometer FROM vehicles \
         WHERE is_active = 1 ORDER BY identifier",
    )?;
    let rows: Vec<(String, String, String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        println!("No vehicles. Add one with `apnexus vehicles add`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Identifier", "Make", "Model", "Fuel", "Odometer"]);
    for (identifier, make, model, fuel, odometer) in rows {
        table.add_row(vec![
            Cell::new(identifier),
            Cell::new(make),
            Cell::new(model),
            Cell::new(fuel),
            Cell::new(odometer),
        ]);
    }
    println!("Fleet\n{table}");
    Ok(())
}

pub fn retire(identifier: &str) -> Result<()> {
    let (_, conn) = open_db()?;
    let identifier = identifier.trim();
    if !vehicle_exists(&conn, identifier)? {
        return Err(ApnexusError::UnknownVehicle(identifier.to_string()));
    }
    conn.execute(
        "UPDATE vehicles SET is_active = 0 WHERE identifier = ?1",
        [identifier],
    )?;
    println!("Retired vehicle: {identifier}");
    Ok(())
}
