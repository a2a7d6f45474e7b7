use colored::Colorize;

use crate::cli::open_db;
use crate::error::Result;
use crate::reconciler::run_reconciliation;

pub fn run() -> Result<()> {
    let conn = open_db()?;
    let result = run_reconciliation(&conn)?;

    let summary = format!("{} invoices matched", result.matched);
    if result.matched > 0 {
        println!("{}", summary.green().bold());
    } else {
        println!("{summary}");
    }
    for label in ["booking", "card", "bank"] {
        let n = result
            .assignments
            .iter()
            .filter(|a| a.payment.label() == label)
            .count();
        if n > 0 {
            println!("  {label}: {n}");
        }
    }
    println!(
        "  Open before run: {}\n  Candidate payments: {}",
        result.open_invoices, result.candidates
    );
    Ok(())
}
