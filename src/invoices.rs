use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Invoice, MatchType, PaymentRef, ReconciliationMatch};
use crate::reconciler::{invoice_from_row, INVOICE_COLUMNS};

pub struct InvoiceWithMatches {
    pub invoice: Invoice,
    pub matches: Vec<ReconciliationMatch>,
}

pub fn find_invoice_id(conn: &Connection, invoice_number: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM invoices WHERE invoice_number = ?1",
        [invoice_number],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::UnknownInvoice(invoice_number.to_string()),
        other => other.into(),
    })
}

/// All invoices (or only unsettled ones) with their matches, newest first.
pub fn list_invoices(conn: &Connection, open_only: bool) -> Result<Vec<InvoiceWithMatches>> {
    let filter = if open_only {
        "WHERE is_reconciled = 0 AND manual_status = 0"
    } else {
        ""
    };
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices {filter} ORDER BY invoice_date DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let invoices = stmt
        .query_map([], invoice_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, invoice_id, booking_payment_id, card_payment_id, bank_transaction_id, \
         match_type, confidence, created_at FROM reconciliation_matches ORDER BY id",
    )?;
    let rows: Vec<(i64, i64, Option<i64>, Option<i64>, Option<i64>, String, f64, String)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_invoice: HashMap<i64, Vec<ReconciliationMatch>> = HashMap::new();
    for (id, invoice_id, booking, card, bank, match_type, confidence, created_at) in rows {
        let (Some(payment), Some(match_type)) = (
            PaymentRef::from_columns(booking, card, bank),
            MatchType::from_key(&match_type),
        ) else {
            log::warn!("Skipping malformed match row {id}");
            continue;
        };
        by_invoice.entry(invoice_id).or_default().push(ReconciliationMatch {
            id,
            invoice_id,
            payment,
            match_type,
            confidence,
            created_at,
        });
    }

    Ok(invoices
        .into_iter()
        .map(|invoice| {
            let matches = by_invoice.remove(&invoice.id).unwrap_or_default();
            InvoiceWithMatches { invoice, matches }
        })
        .collect())
}

/// Set or clear the manual verification flag.
///
/// Clearing also drops every match of the invoice and reopens it, so the
/// next reconciliation run can match it again. Returns the number of
/// matches removed.
pub fn set_manual_status(conn: &Connection, invoice_number: &str, verified: bool) -> Result<usize> {
    let id = find_invoice_id(conn, invoice_number)?;
    if verified {
        conn.execute("UPDATE invoices SET manual_status = 1 WHERE id = ?1", [id])?;
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM reconciliation_matches WHERE invoice_id = ?1", [id])?;
    tx.execute(
        "UPDATE invoices SET manual_status = 0, is_reconciled = 0, reconciled_date = NULL WHERE id = ?1",
        [id],
    )?;
    tx.commit()?;
    Ok(removed)
}

pub fn update_comment(conn: &Connection, invoice_number: &str, comment: Option<&str>) -> Result<()> {
    let id = find_invoice_id(conn, invoice_number)?;
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    conn.execute("UPDATE invoices SET comment = ?1 WHERE id = ?2", rusqlite::params![comment, id])?;
    Ok(())
}

pub struct Dunning<'a> {
    pub status: Option<&'a str>,
    pub method: Option<&'a str>,
    pub date: Option<NaiveDate>,
}

/// Replace all dunning fields of an invoice.
pub fn update_dunning(conn: &Connection, invoice_number: &str, dunning: &Dunning) -> Result<()> {
    let id = find_invoice_id(conn, invoice_number)?;
    conn.execute(
        "UPDATE invoices SET dunning_status = ?1, dunning_method = ?2, dunning_date = ?3 WHERE id = ?4",
        rusqlite::params![dunning.status, dunning.method, dunning.date, id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn setup_matched_invoice(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO invoices (invoice_date, payment_type, invoice_number, recipient, amount, is_reconciled, reconciled_date) \
             VALUES ('2025-06-15', 'Visa', 'R-1', 'Gast', 45.5, 1, '2025-06-20')",
            [],
        ).unwrap();
        let inv = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO card_payments (transaction_date, card_type, amount) VALUES ('2025-06-15', 'VISA', 45.5)",
            [],
        ).unwrap();
        let card = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO reconciliation_matches (invoice_id, card_payment_id, match_type, confidence) \
             VALUES (?1, ?2, 'AUTOMATIC', 0.9)",
            rusqlite::params![inv, card],
        ).unwrap();
        conn.execute(
            "INSERT INTO invoices (invoice_date, payment_type, invoice_number, recipient, amount) \
             VALUES ('2025-06-16', 'Bar', 'R-2', 'Gast', 10.0)",
            [],
        ).unwrap();
        inv
    }

    #[test]
    fn test_list_invoices_with_matches() {
        let (_dir, conn) = test_db();
        setup_matched_invoice(&conn);
        let all = list_invoices(&conn, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].invoice.invoice_number, "R-2");
        assert!(all[0].matches.is_empty());
        assert_eq!(all[1].matches.len(), 1);
        assert!(matches!(all[1].matches[0].payment, PaymentRef::Card(_)));
        assert_eq!(all[1].matches[0].match_type, MatchType::Automatic);

        let open = list_invoices(&conn, true).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].invoice.invoice_number, "R-2");
    }

    #[test]
    fn test_unverify_clears_matches() {
        let (_dir, conn) = test_db();
        let inv = setup_matched_invoice(&conn);
        set_manual_status(&conn, "R-1", true).unwrap();
        let removed = set_manual_status(&conn, "R-1", false).unwrap();
        assert_eq!(removed, 1);
        let (reconciled, manual, date): (bool, bool, Option<String>) = conn.query_row(
            "SELECT is_reconciled, manual_status, reconciled_date FROM invoices WHERE id = ?1", [inv],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        ).unwrap();
        assert!(!reconciled);
        assert!(!manual);
        assert!(date.is_none());
    }

    #[test]
    fn test_verify_marks_settled() {
        let (_dir, conn) = test_db();
        setup_matched_invoice(&conn);
        set_manual_status(&conn, "R-2", true).unwrap();
        let all = list_invoices(&conn, false).unwrap();
        assert!(all.iter().all(|i| i.invoice.is_settled()));
    }

    #[test]
    fn test_unknown_invoice() {
        let (_dir, conn) = test_db();
        assert!(matches!(
            set_manual_status(&conn, "nope", true),
            Err(AppError::UnknownInvoice(_))
        ));
    }

    #[test]
    fn test_update_comment_and_dunning() {
        let (_dir, conn) = test_db();
        setup_matched_invoice(&conn);
        update_comment(&conn, "R-2", Some("  Gast zahlt bar  ")).unwrap();
        update_dunning(&conn, "R-2", &Dunning {
            status: Some("1. Mahnung"),
            method: Some("E-Mail"),
            date: NaiveDate::from_ymd_opt(2025, 7, 1),
        }).unwrap();
        let open = list_invoices(&conn, true).unwrap();
        let inv = &open[0].invoice;
        assert_eq!(inv.comment.as_deref(), Some("Gast zahlt bar"));
        assert_eq!(inv.dunning_status.as_deref(), Some("1. Mahnung"));
        assert_eq!(inv.dunning_method.as_deref(), Some("E-Mail"));
        assert_eq!(inv.dunning_date, NaiveDate::from_ymd_opt(2025, 7, 1));

        update_comment(&conn, "R-2", Some("")).unwrap();
        let open = list_invoices(&conn, true).unwrap();
        assert!(open[0].invoice.comment.is_none());
    }
}
