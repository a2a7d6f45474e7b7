use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::detect::{detect_delimiter, detect_kind, FileKind};
use crate::error::Result;
use crate::models::ImportedFile;
use crate::parse::{parse_amount, parse_date, round_cents};
use crate::reconciler::classify_payment_type;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Decode file bytes, dropping a UTF-8 BOM. Invalid UTF-8 (Latin-1 exports)
/// is decoded lossily so header tokens still match.
fn decode(data: &[u8]) -> String {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    String::from_utf8_lossy(data).into_owned()
}

fn read_records(content: &str, delimiter: u8) -> Vec<csv::StringRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());
    rdr.records()
        .filter_map(|r| r.ok())
        .filter(|r| r.iter().any(|f| !f.trim().is_empty()))
        .collect()
}

fn cell(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

/// Resolve header cells to canonical fields.
///
/// Fields are resolved in table order; for each field the keywords are tried
/// in order and the first unclaimed header cell containing the keyword
/// (case-insensitive) wins.
fn resolve_columns<F: Copy + Eq + Hash>(
    header: &csv::StringRecord,
    table: &[(F, &[&str])],
) -> HashMap<F, usize> {
    let cells: Vec<String> = header.iter().map(|c| c.trim().to_lowercase()).collect();
    let mut resolved: HashMap<F, usize> = HashMap::new();
    for (field, keywords) in table {
        let found = keywords.iter().find_map(|kw| {
            cells
                .iter()
                .enumerate()
                .find(|(i, c)| c.contains(kw) && !resolved.values().any(|v| v == i))
                .map(|(i, _)| i)
        });
        if let Some(idx) = found {
            resolved.insert(*field, idx);
        }
    }
    resolved
}

fn describe_mapping<F: Copy + Eq + Hash>(
    header: &csv::StringRecord,
    table: &[(F, &[&str])],
    columns: &HashMap<F, usize>,
    label: fn(&F) -> &'static str,
) -> String {
    let mapping: Vec<String> = table
        .iter()
        .map(|(field, _)| match columns.get(field) {
            Some(&i) => format!("{}={} ({})", label(field), i, cell(header, i)),
            None => format!("{}=-", label(field)),
        })
        .collect();
    format!("Column mapping: {}", mapping.join(", "))
}

#[derive(Debug, Default, Clone, Copy)]
struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    fn observe_start(&mut self, date: Option<NaiveDate>) {
        if let Some(d) = date {
            self.start = Some(self.start.map_or(d, |s| s.min(d)));
        }
    }

    fn observe_end(&mut self, date: Option<NaiveDate>) {
        if let Some(d) = date {
            self.end = Some(self.end.map_or(d, |e| e.max(d)));
        }
    }

    fn observe(&mut self, date: NaiveDate) {
        self.observe_start(Some(date));
        self.observe_end(Some(date));
    }
}

// ---------------------------------------------------------------------------
// process_file
// ---------------------------------------------------------------------------

/// What one normalizer run produced; handed back to the upload handler.
#[derive(Debug)]
pub struct ImportOutcome {
    pub kind: FileKind,
    pub count: usize,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    pub logs: Vec<String>,
}

impl ImportOutcome {
    fn new(kind: FileKind, count: usize, range: DateRange, logs: Vec<String>) -> Self {
        Self {
            kind,
            count,
            date_range_start: range.start,
            date_range_end: range.end,
            logs,
        }
    }
}

pub fn process_file(conn: &Connection, file_path: &Path) -> Result<ImportOutcome> {
    let data = std::fs::read(file_path)?;
    process_bytes(conn, &data)
}

fn process_bytes(conn: &Connection, data: &[u8]) -> Result<ImportOutcome> {
    let content = decode(data);
    let header = content.lines().next().unwrap_or("");
    let kind = detect_kind(header);
    let delimiter = detect_delimiter(header);
    log::debug!("Detected {} with delimiter {:?}", kind.key(), delimiter as char);

    let records = read_records(&content, delimiter);
    let logs = vec![format!(
        "Detected {} ({} rows, delimiter '{}')",
        kind.name(),
        records.len().saturating_sub(1),
        if delimiter == b'\t' { "\\t".to_string() } else { (delimiter as char).to_string() }
    )];

    match kind {
        FileKind::BookingPayout => import_booking(conn, &records, logs),
        FileKind::PmsInvoice => import_invoices(conn, &records, logs),
        FileKind::BankStatement => import_bank(conn, &records, logs),
        FileKind::CardSettlement => import_card(conn, &records, logs),
        FileKind::Unknown | FileKind::Error => {
            Ok(ImportOutcome::new(FileKind::Unknown, 0, DateRange::default(), logs))
        }
    }
}

// ---------------------------------------------------------------------------
// Booking.com payouts: dynamic column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BookingField {
    Reference,
    CheckIn,
    CheckOut,
    PayoutDate,
    Amount,
}

impl BookingField {
    fn label(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::CheckIn => "check-in",
            Self::CheckOut => "check-out",
            Self::PayoutDate => "payout date",
            Self::Amount => "amount",
        }
    }
}

const BOOKING_COLUMNS: &[(BookingField, &[&str])] = &[
    (BookingField::Reference, &["referenznummer", "reference number", "buchungsnummer", "booking number", "reference"]),
    (BookingField::CheckIn, &["anreise", "check-in", "check in", "arrival"]),
    (BookingField::CheckOut, &["abreise", "check-out", "checkout", "check out", "departure"]),
    (BookingField::PayoutDate, &["datum der auszahlung", "auszahlungsdatum", "payout date", "datum", "date"]),
    (BookingField::Amount, &["auszahlungsbetrag", "payout amount", "nettobetrag", "net amount", "betrag", "amount"]),
];

fn import_booking(
    conn: &Connection,
    records: &[csv::StringRecord],
    mut logs: Vec<String>,
) -> Result<ImportOutcome> {
    let mut range = DateRange::default();
    let Some((header, rows)) = records.split_first() else {
        return Ok(ImportOutcome::new(FileKind::BookingPayout, 0, range, logs));
    };

    let columns = resolve_columns(header, BOOKING_COLUMNS);
    logs.push(describe_mapping(header, BOOKING_COLUMNS, &columns, BookingField::label));

    let (Some(&idx_ref), Some(&idx_amount)) = (
        columns.get(&BookingField::Reference),
        columns.get(&BookingField::Amount),
    ) else {
        for field in [BookingField::Reference, BookingField::Amount] {
            if !columns.contains_key(&field) {
                logs.push(format!("Missing required column: {}", field.label()));
            }
        }
        log::warn!("Booking.com file lacks required columns, nothing imported");
        return Ok(ImportOutcome::new(FileKind::BookingPayout, 0, range, logs));
    };
    let idx_check_in = columns.get(&BookingField::CheckIn).copied();
    let idx_check_out = columns.get(&BookingField::CheckOut).copied();
    let idx_payout = columns.get(&BookingField::PayoutDate).copied();
    let date_at = |record: &csv::StringRecord, idx: Option<usize>| {
        idx.and_then(|i| parse_date(cell(record, i)))
    };

    let tx = conn.unchecked_transaction()?;
    let mut count = 0usize;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO booking_payments (reference_number, check_in_date, check_out_date, payout_date, amount) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(reference_number) DO UPDATE SET \
             check_in_date = excluded.check_in_date, check_out_date = excluded.check_out_date, \
             payout_date = excluded.payout_date, amount = excluded.amount",
        )?;
        for (n, record) in rows.iter().enumerate() {
            let line = n + 2;
            let reference = cell(record, idx_ref);
            if reference.is_empty() {
                logs.push(format!("Row {line}: no reference number, skipped"));
                continue;
            }
            let amount = match parse_amount(cell(record, idx_amount)) {
                Some(a) if a != 0.0 => round_cents(a),
                _ => continue,
            };
            let check_in = date_at(record, idx_check_in);
            let check_out = date_at(record, idx_check_out);
            let payout = date_at(record, idx_payout);
            stmt.execute(rusqlite::params![reference, check_in, check_out, payout, amount])?;
            range.observe_start(check_in);
            range.observe_end(payout);
            count += 1;
        }
    }
    tx.commit()?;

    Ok(ImportOutcome::new(FileKind::BookingPayout, count, range, logs))
}

// ---------------------------------------------------------------------------
// PMS invoice export: header mapping with positional fallback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InvoiceField {
    Date,
    Number,
    PaymentType,
    Recipient,
    Amount,
}

impl InvoiceField {
    fn label(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Number => "number",
            Self::PaymentType => "payment type",
            Self::Recipient => "recipient",
            Self::Amount => "amount",
        }
    }

    /// Column in the stock export: date, payment type, number, recipient, amount.
    fn default_index(&self) -> usize {
        match self {
            Self::Date => 0,
            Self::PaymentType => 1,
            Self::Number => 2,
            Self::Recipient => 3,
            Self::Amount => 4,
        }
    }
}

const INVOICE_COLUMNS: &[(InvoiceField, &[&str])] = &[
    (InvoiceField::Date, &["rechnungsdatum", "invoice date", "datum", "date"]),
    (InvoiceField::Number, &["rechnungsnummer", "rechnungsnr", "invoice number", "invoice no", "nummer", "number"]),
    (InvoiceField::PaymentType, &["zahlungsart", "payment type", "payment method", "zahlung", "payment"]),
    (InvoiceField::Recipient, &["empfänger", "empfaenger", "recipient", "kunde", "customer", "gast", "guest", "name"]),
    (InvoiceField::Amount, &["betrag", "amount", "summe", "total"]),
];

/// A key cell holding a channel label instead of an invoice number means the
/// columns are shifted.
fn looks_like_payment_label(value: &str) -> bool {
    !value.chars().any(|c| c.is_ascii_digit()) && classify_payment_type(value).is_some()
}

fn import_invoices(
    conn: &Connection,
    records: &[csv::StringRecord],
    mut logs: Vec<String>,
) -> Result<ImportOutcome> {
    let mut range = DateRange::default();
    let Some((header, rows)) = records.split_first() else {
        return Ok(ImportOutcome::new(FileKind::PmsInvoice, 0, range, logs));
    };

    let mut columns = resolve_columns(header, INVOICE_COLUMNS);
    for (field, _) in INVOICE_COLUMNS {
        if !columns.contains_key(field) {
            let idx = field.default_index();
            if !columns.values().any(|&v| v == idx) {
                columns.insert(*field, idx);
            }
        }
    }
    logs.push(describe_mapping(header, INVOICE_COLUMNS, &columns, InvoiceField::label));

    let (Some(&idx_date), Some(&idx_number), Some(&idx_amount)) = (
        columns.get(&InvoiceField::Date),
        columns.get(&InvoiceField::Number),
        columns.get(&InvoiceField::Amount),
    ) else {
        for field in [InvoiceField::Date, InvoiceField::Number, InvoiceField::Amount] {
            if !columns.contains_key(&field) {
                logs.push(format!("Missing required column: {}", field.label()));
            }
        }
        log::warn!("Invoice file lacks required columns, nothing imported");
        return Ok(ImportOutcome::new(FileKind::PmsInvoice, 0, range, logs));
    };
    let text_at = |record: &csv::StringRecord, field: InvoiceField| -> String {
        columns
            .get(&field)
            .map(|&i| cell(record, i).to_string())
            .unwrap_or_default()
    };

    let tx = conn.unchecked_transaction()?;
    let mut count = 0usize;
    {
        // Re-import refreshes amount and payment type; reconciliation, comment
        // and dunning fields stay as they are.
        let mut stmt = tx.prepare_cached(
            "INSERT INTO invoices (invoice_date, invoice_number, recipient, payment_type, amount) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(invoice_number) DO UPDATE SET \
             amount = excluded.amount, payment_type = excluded.payment_type",
        )?;
        for (n, record) in rows.iter().enumerate() {
            let line = n + 2;
            let Some(date) = parse_date(cell(record, idx_date)) else {
                logs.push(format!("Row {line}: invalid invoice date '{}'", cell(record, idx_date)));
                continue;
            };
            let number = cell(record, idx_number);
            if number.is_empty() {
                logs.push(format!("Row {line}: no invoice number, skipped"));
                continue;
            }
            if looks_like_payment_label(number) {
                logs.push(format!("Row {line}: '{number}' is not an invoice number, skipped"));
                continue;
            }
            let Some(amount) = parse_amount(cell(record, idx_amount)) else {
                logs.push(format!("Row {line}: invalid amount '{}'", cell(record, idx_amount)));
                continue;
            };
            stmt.execute(rusqlite::params![
                date,
                number,
                text_at(record, InvoiceField::Recipient),
                text_at(record, InvoiceField::PaymentType),
                round_cents(amount),
            ])?;
            range.observe(date);
            count += 1;
        }
    }
    tx.commit()?;

    Ok(ImportOutcome::new(FileKind::PmsInvoice, count, range, logs))
}

// ---------------------------------------------------------------------------
// Bank statement (CAMT-style CSV): fixed columns, append-only
// ---------------------------------------------------------------------------

const BANK_IDX_BOOKING_DATE: usize = 1;
const BANK_IDX_DESCRIPTION: usize = 4;
const BANK_IDX_COUNTERPARTY: usize = 11;
const BANK_IDX_AMOUNT: usize = 14;

fn import_bank(
    conn: &Connection,
    records: &[csv::StringRecord],
    mut logs: Vec<String>,
) -> Result<ImportOutcome> {
    let mut range = DateRange::default();
    let rows = records.get(1..).unwrap_or_default();

    let tx = conn.unchecked_transaction()?;
    let mut count = 0usize;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO bank_transactions (booking_date, sender_receiver, description, amount) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (n, record) in rows.iter().enumerate() {
            let line = n + 2;
            let Some(date) = parse_date(cell(record, BANK_IDX_BOOKING_DATE)) else {
                logs.push(format!("Row {line}: invalid booking date, skipped"));
                continue;
            };
            let Some(amount) = parse_amount(cell(record, BANK_IDX_AMOUNT)) else {
                logs.push(format!("Row {line}: invalid amount '{}'", cell(record, BANK_IDX_AMOUNT)));
                continue;
            };
            stmt.execute(rusqlite::params![
                date,
                cell(record, BANK_IDX_COUNTERPARTY),
                cell(record, BANK_IDX_DESCRIPTION),
                round_cents(amount),
            ])?;
            range.observe(date);
            count += 1;
        }
    }
    tx.commit()?;

    Ok(ImportOutcome::new(FileKind::BankStatement, count, range, logs))
}

// ---------------------------------------------------------------------------
// Card settlement: fixed columns, append-only
// ---------------------------------------------------------------------------

const CARD_IDX_DATE: usize = 0;
const CARD_IDX_TYPE: usize = 1;
const CARD_IDX_AMOUNT: usize = 2;
const CARD_IDX_GROSS: usize = 3;

fn import_card(
    conn: &Connection,
    records: &[csv::StringRecord],
    mut logs: Vec<String>,
) -> Result<ImportOutcome> {
    let mut range = DateRange::default();
    let rows = records.get(1..).unwrap_or_default();

    let tx = conn.unchecked_transaction()?;
    let mut count = 0usize;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO card_payments (transaction_date, card_type, amount, gross_amount) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (n, record) in rows.iter().enumerate() {
            let line = n + 2;
            let Some(date) = parse_date(cell(record, CARD_IDX_DATE)) else {
                logs.push(format!("Row {line}: invalid transaction date, skipped"));
                continue;
            };
            let gross = parse_amount(cell(record, CARD_IDX_GROSS)).map(round_cents);
            // Net of zero means the terminal only reported the gross figure
            let amount = match parse_amount(cell(record, CARD_IDX_AMOUNT)) {
                Some(net) if net != 0.0 => Some(net),
                _ => gross.filter(|g| *g != 0.0),
            };
            let Some(amount) = amount else {
                logs.push(format!("Row {line}: no usable amount, skipped"));
                continue;
            };
            stmt.execute(rusqlite::params![
                date,
                cell(record, CARD_IDX_TYPE),
                round_cents(amount),
                gross,
            ])?;
            range.observe(date);
            count += 1;
        }
    }
    tx.commit()?;

    Ok(ImportOutcome::new(FileKind::CardSettlement, count, range, logs))
}

// ---------------------------------------------------------------------------
// Upload handling and import history
// ---------------------------------------------------------------------------

pub struct FileReport {
    pub filename: String,
    pub kind: FileKind,
    pub count: usize,
    pub error: Option<String>,
}

impl FileReport {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Process uploaded files one after another. Each file commits on its own;
/// a failing file is recorded as an ERROR import and the rest continue.
pub fn import_files(conn: &Connection, paths: &[PathBuf]) -> Result<Vec<FileReport>> {
    let mut reports = Vec::new();
    for path in paths {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        let checksum = std::fs::read(path).ok().map(|d| compute_checksum(&d));

        let report = match process_file(conn, path) {
            Ok(outcome) => {
                log::info!("{filename}: {} records ({})", outcome.count, outcome.kind.key());
                record_import(conn, &filename, &outcome, checksum.as_deref())?;
                FileReport {
                    filename,
                    kind: outcome.kind,
                    count: outcome.count,
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("{filename}: import failed: {e}");
                let outcome = ImportOutcome::new(
                    FileKind::Error,
                    0,
                    DateRange::default(),
                    vec![format!("Error: {e}")],
                );
                record_import(conn, &filename, &outcome, checksum.as_deref())?;
                FileReport {
                    filename,
                    kind: FileKind::Error,
                    count: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    Ok(reports)
}

fn record_import(
    conn: &Connection,
    filename: &str,
    outcome: &ImportOutcome,
    checksum: Option<&str>,
) -> Result<i64> {
    let logs = serde_json::to_string(&outcome.logs)
        .map_err(|e| crate::error::AppError::Other(e.to_string()))?;
    conn.execute(
        "INSERT INTO imported_files (filename, file_type, record_count, date_range_start, date_range_end, logs, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            filename,
            outcome.kind.key(),
            outcome.count as i64,
            outcome.date_range_start,
            outcome.date_range_end,
            logs,
            checksum,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_imports(conn: &Connection) -> Result<Vec<ImportedFile>> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, file_type, record_count, date_range_start, date_range_end, logs, checksum, imported_at \
         FROM imported_files ORDER BY imported_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let logs: Option<String> = row.get(6)?;
            Ok(ImportedFile {
                id: row.get(0)?,
                filename: row.get(1)?,
                file_type: row.get(2)?,
                record_count: row.get(3)?,
                date_range_start: row.get(4)?,
                date_range_end: row.get(5)?,
                logs: logs
                    .and_then(|l| serde_json::from_str(&l).ok())
                    .unwrap_or_default(),
                checksum: row.get(7)?,
                imported_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
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

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0)).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const BOOKING_CSV: &str = "\
Typ;Referenznummer;Anreise;Abreise;Gastname;Betrag;Datum der Auszahlung
Reservierung;6640998854;10.06.2025;12.06.2025;Max Muster;82,00;12.06.2025
Reservierung;5522113344;01.06.2025;03.06.2025;Erika Muster;1.234,56;20.06.2025
Reservierung;;01.06.2025;03.06.2025;Nobody;10,00;20.06.2025
Reservierung;7777777777;01.06.2025;03.06.2025;Free Stay;0,00;20.06.2025
";

    fn bank_row(date: &str, description: &str, counterparty: &str, amount: &str) -> String {
        let mut cols = vec![""; 15];
        cols[0] = "DE001";
        cols[1] = date;
        cols[2] = date;
        cols[3] = "GUTSCHRIFT";
        cols[4] = description;
        cols[11] = counterparty;
        cols[14] = amount;
        cols.join(";")
    }

    fn bank_csv(rows: &[(&str, &str, &str, &str)]) -> String {
        let mut content = String::from(
            "Auftragskonto;Buchungstag;Valutadatum;Buchungstext;Verwendungszweck;Glaeubiger ID;\
             Mandatsreferenz;Kundenreferenz;Sammlerreferenz;Lastschrift Ursprungsbetrag;\
             Auslagenersatz Ruecklastschrift;Beguenstigter/Zahlungspflichtiger;Kontonummer/IBAN;\
             BIC (SWIFT-Code);Betrag;Waehrung;Info\n",
        );
        for (d, desc, cp, amt) in rows {
            content.push_str(&bank_row(d, desc, cp, amt));
            content.push('\n');
        }
        content
    }

    #[test]
    fn test_resolve_columns_skips_claimed_cells() {
        let header = csv::StringRecord::from(vec!["Referenznummer", "Anreise", "Datum", "Betrag"]);
        let cols = resolve_columns(&header, BOOKING_COLUMNS);
        assert_eq!(cols.get(&BookingField::Reference), Some(&0));
        assert_eq!(cols.get(&BookingField::CheckIn), Some(&1));
        assert_eq!(cols.get(&BookingField::PayoutDate), Some(&2));
        assert_eq!(cols.get(&BookingField::Amount), Some(&3));
        assert_eq!(cols.get(&BookingField::CheckOut), None);
    }

    #[test]
    fn test_resolve_columns_english_export() {
        let header = csv::StringRecord::from(vec![
            "Type", "Reference number", "Check-in", "Checkout", "Guest name", "Amount", "Payout date",
        ]);
        let cols = resolve_columns(&header, BOOKING_COLUMNS);
        assert_eq!(cols.get(&BookingField::Reference), Some(&1));
        assert_eq!(cols.get(&BookingField::CheckIn), Some(&2));
        assert_eq!(cols.get(&BookingField::CheckOut), Some(&3));
        assert_eq!(cols.get(&BookingField::Amount), Some(&5));
        assert_eq!(cols.get(&BookingField::PayoutDate), Some(&6));
    }

    #[test]
    fn test_booking_import() {
        let (dir, conn) = test_db();
        let path = write_file(dir.path(), "payout.csv", BOOKING_CSV);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::BookingPayout);
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.date_range_start, Some(date(2025, 6, 1)));
        assert_eq!(outcome.date_range_end, Some(date(2025, 6, 20)));
        assert!(outcome.logs.iter().any(|l| l.starts_with("Column mapping")));
        assert!(outcome.logs.iter().any(|l| l.contains("no reference number")));

        let amount: f64 = conn.query_row(
            "SELECT amount FROM booking_payments WHERE reference_number = '5522113344'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(amount, 1234.56);
    }

    #[test]
    fn test_booking_reimport_is_idempotent() {
        let (dir, conn) = test_db();
        let path = write_file(dir.path(), "payout.csv", BOOKING_CSV);
        process_file(&conn, &path).unwrap();
        process_file(&conn, &path).unwrap();
        assert_eq!(count(&conn, "booking_payments"), 2);
    }

    #[test]
    fn test_booking_reimport_updates_in_place() {
        let (dir, conn) = test_db();
        let path = write_file(dir.path(), "payout.csv", BOOKING_CSV);
        process_file(&conn, &path).unwrap();
        let changed = BOOKING_CSV.replace("82,00", "85,50");
        let path2 = write_file(dir.path(), "payout2.csv", &changed);
        process_file(&conn, &path2).unwrap();
        let amount: f64 = conn.query_row(
            "SELECT amount FROM booking_payments WHERE reference_number = '6640998854'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(amount, 85.5);
        assert_eq!(count(&conn, "booking_payments"), 2);
    }

    #[test]
    fn test_booking_missing_amount_column_is_fatal() {
        let (dir, conn) = test_db();
        let path = write_file(
            dir.path(),
            "payout.csv",
            "Referenznummer;Anreise;Datum\n123;01.06.2025;02.06.2025\n",
        );
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::BookingPayout);
        assert_eq!(outcome.count, 0);
        assert!(outcome.logs.iter().any(|l| l == "Missing required column: amount"));
        assert_eq!(count(&conn, "booking_payments"), 0);
    }

    #[test]
    fn test_invoice_import_and_upsert() {
        let (dir, conn) = test_db();
        let content = "\
Rechnungsdatum;Zahlungsart;Rechnungsnummer;Empfänger;Betrag
15.06.2025;Booking.com;R-1001;Max Muster;82,00
01.03.2025;Banküberweisung;Rechnung 18800 / 2025;Firma GmbH;150,00
kaputt;Visa;R-1002;Someone;10,00
";
        let path = write_file(dir.path(), "rechnungen.csv", content);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::PmsInvoice);
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.date_range_start, Some(date(2025, 3, 1)));
        assert_eq!(outcome.date_range_end, Some(date(2025, 6, 15)));

        conn.execute("UPDATE invoices SET comment = 'keep me' WHERE invoice_number = 'R-1001'", []).unwrap();
        let changed = content.replace("82,00", "90,00");
        let path2 = write_file(dir.path(), "rechnungen2.csv", &changed);
        process_file(&conn, &path2).unwrap();

        assert_eq!(count(&conn, "invoices"), 2);
        let (amount, comment): (f64, Option<String>) = conn.query_row(
            "SELECT amount, comment FROM invoices WHERE invoice_number = 'R-1001'", [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        ).unwrap();
        assert_eq!(amount, 90.0);
        assert_eq!(comment.as_deref(), Some("keep me"));
    }

    #[test]
    fn test_invoice_columns_follow_header() {
        let (dir, conn) = test_db();
        let content = "\
Rechnungsdatum;Zahlungsart;Rechnungsnummer;Empfänger;Betrag
15.06.2025;Booking.com;R-1001;Max Muster;82,00
16.06.2025;Booking.com;R-1002;Erika Muster;95,00
";
        let path = write_file(dir.path(), "rechnungen.csv", content);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.count, 2);
        assert!(outcome.logs.iter().any(|l| l.contains("number=2 (Rechnungsnummer)")));

        let mut stmt = conn
            .prepare("SELECT invoice_number, payment_type, recipient FROM invoices ORDER BY invoice_number")
            .unwrap();
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            rows,
            vec![
                ("R-1001".to_string(), "Booking.com".to_string(), "Max Muster".to_string()),
                ("R-1002".to_string(), "Booking.com".to_string(), "Erika Muster".to_string()),
            ]
        );
    }

    #[test]
    fn test_invoice_columns_in_other_order() {
        let (dir, conn) = test_db();
        let content = "\
Rechnungsdatum;Rechnungsnummer;Empfänger;Zahlungsart;Betrag
15.06.2025;R-1001;Max Muster;Booking.com;82,00
";
        let path = write_file(dir.path(), "rechnungen.csv", content);
        assert_eq!(process_file(&conn, &path).unwrap().count, 1);
        let (payment_type, recipient): (String, String) = conn
            .query_row(
                "SELECT payment_type, recipient FROM invoices WHERE invoice_number = 'R-1001'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(payment_type, "Booking.com");
        assert_eq!(recipient, "Max Muster");
    }

    #[test]
    fn test_invoice_row_with_payment_label_as_number_is_skipped() {
        let (dir, conn) = test_db();
        // First row carries the channel label where the number belongs
        let content = "\
Rechnungsdatum;Rechnungsnummer;Feld3;Feld4;Betrag
15.06.2025;Booking.com;R-1001;Max Muster;82,00
16.06.2025;R-1002;Visa;Erika Muster;95,00
";
        let path = write_file(dir.path(), "rechnungen.csv", content);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.count, 1);
        assert!(outcome.logs.iter().any(|l| l.contains("'Booking.com' is not an invoice number")));
        assert_eq!(count(&conn, "invoices"), 1);
    }

    #[test]
    fn test_bank_import_is_append_only() {
        let (dir, conn) = test_db();
        let content = bank_csv(&[
            ("20.03.2025", "Zahlung Rechnung 18800", "Firma GmbH", "150,00"),
            ("21.03.2025", "Miete", "Vermieter", "-1.200,00"),
            ("", "ohne Datum", "X", "1,00"),
        ]);
        let path = write_file(dir.path(), "konto.csv", &content);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::BankStatement);
        assert_eq!(outcome.count, 2);
        process_file(&conn, &path).unwrap();
        assert_eq!(count(&conn, "bank_transactions"), 4);

        let (sender, desc, amount): (String, String, f64) = conn.query_row(
            "SELECT sender_receiver, description, amount FROM bank_transactions ORDER BY id LIMIT 1", [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        ).unwrap();
        assert_eq!(sender, "Firma GmbH");
        assert_eq!(desc, "Zahlung Rechnung 18800");
        assert_eq!(amount, 150.0);
    }

    #[test]
    fn test_card_import_gross_fallback_and_duplicates() {
        let (dir, conn) = test_db();
        let content = "\
Transaktionsdatum;Kartenart;Betrag;Umsatz
14.06.2025;VISA;0,00;45,50
15.06.2025;Mastercard;99,10;100,00
16.06.2025;Maestro;;
";
        let path = write_file(dir.path(), "karten.csv", content);
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::CardSettlement);
        assert_eq!(outcome.count, 2);
        assert!(outcome.logs.iter().any(|l| l.contains("Row 4")));

        let amount: f64 = conn.query_row(
            "SELECT amount FROM card_payments WHERE card_type = 'VISA'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(amount, 45.5);

        process_file(&conn, &path).unwrap();
        assert_eq!(count(&conn, "card_payments"), 4);
    }

    #[test]
    fn test_tab_delimited_card_file() {
        let (dir, conn) = test_db();
        let path = write_file(
            dir.path(),
            "cards.tsv",
            "Date\tCard\tAmount\tGross\n2025-06-14\tVisa\t12.50\t13.00\n",
        );
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::CardSettlement);
        assert_eq!(outcome.count, 1);
    }

    #[test]
    fn test_unknown_format_is_not_an_error() {
        let (dir, conn) = test_db();
        let path = write_file(dir.path(), "random.csv", "foo,bar\n1,2\n");
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.kind, FileKind::Unknown);
        assert_eq!(outcome.count, 0);
    }

    #[test]
    fn test_bom_is_stripped() {
        let (dir, conn) = test_db();
        let mut data = b"\xEF\xBB\xBF".to_vec();
        data.extend_from_slice(b"Rechnungsdatum;Zahlungsart;Rechnungsnummer;Empf\xc3\xa4nger;Betrag\n01.01.2025;Visa;R-1;A;5,00\n");
        let path = dir.path().join("bom.csv");
        std::fs::write(&path, data).unwrap();
        let outcome = process_file(&conn, &path).unwrap();
        assert_eq!(outcome.count, 1);
    }

    #[test]
    fn test_import_files_records_history_and_errors() {
        let (dir, conn) = test_db();
        let good = write_file(dir.path(), "payout.csv", BOOKING_CSV);
        let missing = dir.path().join("does-not-exist.csv");
        let unknown = write_file(dir.path(), "notes.csv", "hello,world\n");

        let reports = import_files(&conn, &[missing, good, unknown]).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_error());
        assert_eq!(reports[0].kind, FileKind::Error);
        assert!(!reports[1].is_error());
        assert_eq!(reports[1].count, 2);
        assert_eq!(reports[2].kind, FileKind::Unknown);

        let history = list_imports(&conn).unwrap();
        assert_eq!(history.len(), 3);
        let error_row = history.iter().find(|h| h.file_type == "ERROR").unwrap();
        assert_eq!(error_row.record_count, 0);
        assert!(error_row.logs[0].starts_with("Error:"));
        let booking_row = history.iter().find(|h| h.file_type == "BOOKING").unwrap();
        assert_eq!(booking_row.date_range_start, Some(date(2025, 6, 1)));
        assert!(booking_row.checksum.is_some());
    }
}
