use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::{AppError, Result};
use crate::fmt::{money, percent};
use crate::invoices::{list_invoices, set_manual_status, update_comment, update_dunning, Dunning};

pub fn list(open_only: bool) -> Result<()> {
    let conn = open_db()?;
    let rows = list_invoices(&conn, open_only)?;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Number", "Recipient", "Payment", "Amount", "Status", "Match", "Dunning", "Comment"]);
    for row in &rows {
        let inv = &row.invoice;
        let status = if inv.manual_status {
            "verified".cyan().to_string()
        } else if inv.is_reconciled {
            let on = inv.reconciled_date.map(|d| format!(" {d}")).unwrap_or_default();
            format!("reconciled{on}").green().to_string()
        } else {
            "open".yellow().to_string()
        };
        let matched = row
            .matches
            .iter()
            .map(|m| {
                format!(
                    "{} #{} {} {}",
                    m.payment.label(),
                    m.payment.id(),
                    m.match_type.as_str(),
                    percent(m.confidence)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let dunning = [
            inv.dunning_status.clone(),
            inv.dunning_method.clone(),
            inv.dunning_date.map(|d| d.to_string()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
        table.add_row(vec![
            Cell::new(inv.invoice_date),
            Cell::new(&inv.invoice_number),
            Cell::new(&inv.recipient),
            Cell::new(&inv.payment_type),
            Cell::new(money(inv.amount)),
            Cell::new(status),
            Cell::new(matched),
            Cell::new(dunning),
            Cell::new(inv.comment.as_deref().unwrap_or_default()),
        ]);
    }
    let settled = rows.iter().filter(|r| r.invoice.is_settled()).count();
    println!("Invoices\n{table}");
    println!("{} invoices, {settled} settled", rows.len());
    Ok(())
}

pub fn verify(invoice: &str) -> Result<()> {
    let conn = open_db()?;
    set_manual_status(&conn, invoice, true)?;
    println!("Marked {invoice} as verified");
    Ok(())
}

pub fn unverify(invoice: &str) -> Result<()> {
    let conn = open_db()?;
    let removed = set_manual_status(&conn, invoice, false)?;
    println!("Reopened {invoice} ({removed} matches removed)");
    Ok(())
}

pub fn comment(invoice: &str, text: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    update_comment(&conn, invoice, text)?;
    println!("Updated comment on {invoice}");
    Ok(())
}

pub fn dunning(invoice: &str, status: Option<&str>, method: Option<&str>, date: Option<&str>) -> Result<()> {
    let date = date
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| AppError::Other(format!("Invalid date '{d}' (expected YYYY-MM-DD)")))
        })
        .transpose()?;
    let conn = open_db()?;
    update_dunning(&conn, invoice, &Dunning { status, method, date })?;
    println!("Updated dunning on {invoice}");
    Ok(())
}
