use std::path::Path;

use rusqlite::Connection;

use crate::error::{AppError, Result};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY,
    invoice_date TEXT NOT NULL,
    payment_type TEXT NOT NULL DEFAULT '',
    invoice_number TEXT NOT NULL UNIQUE,
    recipient TEXT NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    is_reconciled INTEGER NOT NULL DEFAULT 0,
    reconciled_date TEXT,
    manual_status INTEGER NOT NULL DEFAULT 0,
    comment TEXT,
    dunning_status TEXT,
    dunning_method TEXT,
    dunning_date TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS booking_payments (
    id INTEGER PRIMARY KEY,
    reference_number TEXT NOT NULL UNIQUE,
    check_in_date TEXT,
    check_out_date TEXT,
    payout_date TEXT,
    amount REAL NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS card_payments (
    id INTEGER PRIMARY KEY,
    transaction_date TEXT NOT NULL,
    card_type TEXT NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    gross_amount REAL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id INTEGER PRIMARY KEY,
    booking_date TEXT NOT NULL,
    sender_receiver TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS reconciliation_matches (
    id INTEGER PRIMARY KEY,
    invoice_id INTEGER NOT NULL,
    booking_payment_id INTEGER,
    card_payment_id INTEGER,
    bank_transaction_id INTEGER,
    match_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (invoice_id) REFERENCES invoices(id),
    FOREIGN KEY (booking_payment_id) REFERENCES booking_payments(id),
    FOREIGN KEY (card_payment_id) REFERENCES card_payments(id),
    FOREIGN KEY (bank_transaction_id) REFERENCES bank_transactions(id),
    CHECK ((booking_payment_id IS NOT NULL) + (card_payment_id IS NOT NULL)
         + (bank_transaction_id IS NOT NULL) <= 1)
);

CREATE INDEX IF NOT EXISTS idx_matches_invoice ON reconciliation_matches(invoice_id);

CREATE TABLE IF NOT EXISTS imported_files (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    file_type TEXT NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0,
    date_range_start TEXT,
    date_range_end TEXT,
    logs TEXT,
    checksum TEXT,
    imported_at TEXT DEFAULT (datetime('now'))
);
";

pub const DB_FILENAME: &str = "hotel-recon.db";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub struct PurgeResult {
    pub invoices: usize,
    pub payments: usize,
    pub matches: usize,
    pub imports: usize,
    pub reopened: usize,
}

/// Delete every invoice, payment and import record dated in `month` (YYYY-MM).
///
/// Payouts are dated by payout date, or check-in when no payout date is known.
/// Matches attached to deleted rows go with them. Invoices outside the
/// month that lose their only match are reopened unless manually verified.
pub fn delete_month(conn: &Connection, month: &str) -> Result<PurgeResult> {
    let prefix = month_prefix(month)?;
    let tx = conn.unchecked_transaction()?;

    let affected_invoices: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT DISTINCT m.invoice_id FROM reconciliation_matches m \
             LEFT JOIN booking_payments b ON m.booking_payment_id = b.id \
             LEFT JOIN card_payments c ON m.card_payment_id = c.id \
             LEFT JOIN bank_transactions t ON m.bank_transaction_id = t.id \
             WHERE COALESCE(b.payout_date, b.check_in_date) LIKE ?1 OR c.transaction_date LIKE ?1 OR t.booking_date LIKE ?1",
        )?;
        let ids = stmt
            .query_map([&prefix], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids
    };

    let matches = tx.execute(
        "DELETE FROM reconciliation_matches WHERE \
         invoice_id IN (SELECT id FROM invoices WHERE invoice_date LIKE ?1) \
         OR booking_payment_id IN (SELECT id FROM booking_payments WHERE COALESCE(payout_date, check_in_date) LIKE ?1) \
         OR card_payment_id IN (SELECT id FROM card_payments WHERE transaction_date LIKE ?1) \
         OR bank_transaction_id IN (SELECT id FROM bank_transactions WHERE booking_date LIKE ?1)",
        [&prefix],
    )?;

    let mut reopened = 0usize;
    for invoice_id in &affected_invoices {
        reopened += tx.execute(
            "UPDATE invoices SET is_reconciled = 0, reconciled_date = NULL \
             WHERE id = ?1 AND manual_status = 0 AND invoice_date NOT LIKE ?2 \
             AND NOT EXISTS (SELECT 1 FROM reconciliation_matches WHERE invoice_id = ?1)",
            rusqlite::params![invoice_id, prefix],
        )?;
    }

    let invoices = tx.execute("DELETE FROM invoices WHERE invoice_date LIKE ?1", [&prefix])?;
    let mut payments = tx.execute(
        "DELETE FROM booking_payments WHERE COALESCE(payout_date, check_in_date) LIKE ?1",
        [&prefix],
    )?;
    payments += tx.execute("DELETE FROM card_payments WHERE transaction_date LIKE ?1", [&prefix])?;
    payments += tx.execute("DELETE FROM bank_transactions WHERE booking_date LIKE ?1", [&prefix])?;
    let imports = tx.execute("DELETE FROM imported_files WHERE date_range_start LIKE ?1", [&prefix])?;

    tx.commit()?;
    log::info!("Purged {month}: {invoices} invoices, {payments} payments, {matches} matches");

    Ok(PurgeResult {
        invoices,
        payments,
        matches,
        imports,
        reopened,
    })
}

fn month_prefix(month: &str) -> Result<String> {
    let parts: Vec<&str> = month.split('-').collect();
    let valid = parts.len() == 2
        && parts[0].len() == 4
        && parts[0].parse::<i32>().is_ok()
        && parts[1].parse::<u32>().map_or(false, |m| (1..=12).contains(&m));
    if !valid {
        return Err(AppError::InvalidMonth(month.to_string()));
    }
    let m: u32 = parts[1].parse().unwrap_or_default();
    Ok(format!("{}-{m:02}-%", parts[0]))
}
