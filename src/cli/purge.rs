use crate::cli::open_db;
use crate::db::delete_month;
use crate::error::{AppError, Result};

pub fn run(month: &str, yes: bool) -> Result<()> {
    if !yes {
        return Err(AppError::Other(format!(
            "This deletes every invoice, payment and import of {month}. Re-run with --yes to confirm."
        )));
    }
    let conn = open_db()?;
    let result = delete_month(&conn, month)?;
    println!(
        "Deleted {} invoices, {} payments, {} matches, {} imports for {month}",
        result.invoices, result.payments, result.matches, result.imports
    );
    if result.reopened > 0 {
        println!("Reopened {} invoices whose payment was deleted", result.reopened);
    }
    Ok(())
}
