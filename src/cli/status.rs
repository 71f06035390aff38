use crate::db::get_connection;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let db_path = settings.db_path();

    println!("Company:    {}", if settings.company_name.is_empty() { "(not set)" } else { &settings.company_name });
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        let vehicles = count("SELECT count(*) FROM vehicles WHERE is_active = 1")?;
        let transactions = count("SELECT count(*) FROM transactions")?;
        let pending = count("SELECT count(*) FROM transactions WHERE evaluated_at IS NULL")?;
        let review = count("SELECT count(*) FROM transactions WHERE needs_review = 1 AND reviewed_at IS NULL")?;
        let flagged = count("SELECT count(*) FROM transactions WHERE is_flagged = 1")?;

        println!();
        println!("Vehicles:      {vehicles}");
        println!("Transactions:  {transactions}");
        println!("Unevaluated:   {pending}");
        println!("Needs review:  {review}");
        println!("Flagged:       {flagged}");
    } else {
        println!();
        println!("Database not found. Run `apnexus init` to set up.");
    }

    Ok(())
}
