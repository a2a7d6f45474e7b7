use crate::db::get_connection;
use crate::error::Result;
use crate::settings::Settings;

pub fn run() -> Result<()> {
    let settings = Settings::load();
    let db_path = settings.db_path();

    println!(
        "Property:   {}",
        if settings.property_name.is_empty() { "(not set)" } else { &settings.property_name }
    );
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        println!();
        println!("Invoices:           {}", count("SELECT count(*) FROM invoices")?);
        println!(
            "  open:             {}",
            count("SELECT count(*) FROM invoices WHERE is_reconciled = 0 AND manual_status = 0")?
        );
        println!("Booking.com payouts: {}", count("SELECT count(*) FROM booking_payments")?);
        println!("Card settlements:   {}", count("SELECT count(*) FROM card_payments")?);
        println!("Bank transactions:  {}", count("SELECT count(*) FROM bank_transactions")?);
        println!("Matches:            {}", count("SELECT count(*) FROM reconciliation_matches")?);
        println!("Imported files:     {}", count("SELECT count(*) FROM imported_files")?);
    } else {
        println!();
        println!("Database not found. Run `hotel-recon init` to set up.");
    }
    Ok(())
}
