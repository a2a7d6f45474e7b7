use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{Months, NaiveDate};
use regex::Regex;
use rusqlite::Connection;

use crate::error::Result;
use crate::models::{BankTransaction, BookingPayment, CardPayment, Invoice, MatchType, PaymentRef};

/// Amounts must agree to the cent.
pub const AMOUNT_TOLERANCE: f64 = 0.01;
/// Slack around the [check-in, payout] span of an online payout.
pub const BOOKING_SLACK_DAYS: i64 = 5;
pub const CARD_WINDOW_DAYS: i64 = 5;
/// Transfers can trail the invoice by up to two months.
pub const BANK_WINDOW_DAYS: i64 = 60;
/// Payments older than this are never candidates.
pub const LOOKBACK_MONTHS: u32 = 9;

const CARD_BRANDS: &[&str] = &["ec-karte", "visa", "mastercard", "maestro", "visa electron"];

// ---------------------------------------------------------------------------
// Channel dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Booking,
    Card,
    Bank,
}

/// Map an invoice's free-text payment type to the channel it is matched on.
pub fn classify_payment_type(payment_type: &str) -> Option<Channel> {
    let pt = payment_type.to_lowercase();
    if pt.contains("booking.com") {
        Some(Channel::Booking)
    } else if CARD_BRANDS.iter().any(|b| pt.contains(b)) {
        Some(Channel::Card)
    } else if pt.contains("bank") {
        Some(Channel::Bank)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Match rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub invoice_id: i64,
    pub payment: PaymentRef,
    pub match_type: MatchType,
    pub confidence: f64,
}

fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() < AMOUNT_TOLERANCE
}

/// Whole days between two dates, unsigned.
pub fn day_diff(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("invalid digits regex"))
}

/// First run of ASCII digits in `text` ("18800" from "Rechnung 18800 / 2025").
pub fn extract_number(text: &str) -> Option<&str> {
    digits_re().find(text).map(|m| m.as_str())
}

fn names_overlap(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn assign(invoice: &Invoice, payment: PaymentRef, match_type: MatchType, confidence: f64) -> Assignment {
    Assignment {
        invoice_id: invoice.id,
        payment,
        match_type,
        confidence,
    }
}

pub fn match_booking(
    invoice: &Invoice,
    candidates: &[BookingPayment],
    claimed: &HashSet<PaymentRef>,
) -> Option<Assignment> {
    let slack = chrono::Duration::days(BOOKING_SLACK_DAYS);
    candidates.iter().find_map(|p| {
        let payment = PaymentRef::Booking(p.id);
        if claimed.contains(&payment) || !amounts_match(invoice.amount, p.amount) {
            return None;
        }
        let reference = p.reference_number.as_str();
        let ref_match = !reference.is_empty()
            && (invoice.recipient.contains(reference)
                || invoice.comment.as_deref().is_some_and(|c| c.contains(reference)));
        if ref_match {
            return Some(assign(invoice, payment, MatchType::ManualRef, 1.0));
        }
        let date_match = match (p.check_in_date, p.payout_date) {
            (Some(check_in), Some(payout)) => {
                invoice.invoice_date >= check_in - slack && invoice.invoice_date <= payout + slack
            }
            _ => false,
        };
        date_match.then(|| assign(invoice, payment, MatchType::Automatic, 0.85))
    })
}

pub fn match_card(
    invoice: &Invoice,
    candidates: &[CardPayment],
    claimed: &HashSet<PaymentRef>,
) -> Option<Assignment> {
    candidates.iter().find_map(|p| {
        let payment = PaymentRef::Card(p.id);
        let hit = !claimed.contains(&payment)
            && amounts_match(invoice.amount, p.amount)
            && day_diff(invoice.invoice_date, p.transaction_date) <= CARD_WINDOW_DAYS;
        hit.then(|| assign(invoice, payment, MatchType::Automatic, 0.9))
    })
}

pub fn match_bank(
    invoice: &Invoice,
    candidates: &[BankTransaction],
    claimed: &HashSet<PaymentRef>,
) -> Option<Assignment> {
    let number = extract_number(&invoice.invoice_number);
    candidates.iter().find_map(|t| {
        let payment = PaymentRef::Bank(t.id);
        if claimed.contains(&payment)
            || !amounts_match(invoice.amount, t.amount)
            || day_diff(invoice.invoice_date, t.booking_date) > BANK_WINDOW_DAYS
        {
            return None;
        }
        if number.is_some_and(|n| t.description.contains(n)) {
            return Some(assign(invoice, payment, MatchType::ManualRef, 1.0));
        }
        names_overlap(&t.sender_receiver, &invoice.recipient)
            .then(|| assign(invoice, payment, MatchType::Automatic, 0.8))
    })
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Candidates {
    pub booking: Vec<BookingPayment>,
    pub card: Vec<CardPayment>,
    pub bank: Vec<BankTransaction>,
}

impl Candidates {
    pub fn len(&self) -> usize {
        self.booking.len() + self.card.len() + self.bank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) const INVOICE_COLUMNS: &str = "id, invoice_date, payment_type, invoice_number, recipient, amount, \
     is_reconciled, reconciled_date, manual_status, comment, dunning_status, dunning_method, dunning_date";

pub(crate) fn invoice_from_row(row: &rusqlite::Row) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        invoice_date: row.get(1)?,
        payment_type: row.get(2)?,
        invoice_number: row.get(3)?,
        recipient: row.get(4)?,
        amount: row.get(5)?,
        is_reconciled: row.get(6)?,
        reconciled_date: row.get(7)?,
        manual_status: row.get(8)?,
        comment: row.get(9)?,
        dunning_status: row.get(10)?,
        dunning_method: row.get(11)?,
        dunning_date: row.get(12)?,
    })
}

/// Invoices still awaiting a payment, in load (id) order.
pub fn load_open_invoices(conn: &Connection) -> Result<Vec<Invoice>> {
    let sql = format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices \
         WHERE is_reconciled = 0 AND manual_status = 0 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], invoice_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Split `(claimed, record)` rows into available records, logging how many
/// were already claimed by earlier runs.
fn available<T>(label: &str, rows: Vec<(bool, T)>) -> Vec<T> {
    let total = rows.len();
    let free: Vec<T> = rows
        .into_iter()
        .filter_map(|(claimed, rec)| (!claimed).then_some(rec))
        .collect();
    log::debug!("{label}: {} of {total} payments available", free.len());
    free
}

/// Payments dated on or after `since` with no existing match.
pub fn load_candidates(conn: &Connection, since: NaiveDate) -> Result<Candidates> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.reference_number, p.check_in_date, p.check_out_date, p.payout_date, p.amount, \
         EXISTS(SELECT 1 FROM reconciliation_matches m WHERE m.booking_payment_id = p.id) \
         FROM booking_payments p WHERE COALESCE(p.payout_date, p.check_in_date) >= ?1 ORDER BY p.id",
    )?;
    let booking = stmt
        .query_map([since], |row| {
            Ok((
                row.get::<_, bool>(6)?,
                BookingPayment {
                    id: row.get(0)?,
                    reference_number: row.get(1)?,
                    check_in_date: row.get(2)?,
                    check_out_date: row.get(3)?,
                    payout_date: row.get(4)?,
                    amount: row.get(5)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT p.id, p.transaction_date, p.card_type, p.amount, p.gross_amount, \
         EXISTS(SELECT 1 FROM reconciliation_matches m WHERE m.card_payment_id = p.id) \
         FROM card_payments p WHERE p.transaction_date >= ?1 ORDER BY p.id",
    )?;
    let card = stmt
        .query_map([since], |row| {
            Ok((
                row.get::<_, bool>(5)?,
                CardPayment {
                    id: row.get(0)?,
                    transaction_date: row.get(1)?,
                    card_type: row.get(2)?,
                    amount: row.get(3)?,
                    gross_amount: row.get(4)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT t.id, t.booking_date, t.sender_receiver, t.description, t.amount, \
         EXISTS(SELECT 1 FROM reconciliation_matches m WHERE m.bank_transaction_id = t.id) \
         FROM bank_transactions t WHERE t.booking_date >= ?1 ORDER BY t.id",
    )?;
    let bank = stmt
        .query_map([since], |row| {
            Ok((
                row.get::<_, bool>(5)?,
                BankTransaction {
                    id: row.get(0)?,
                    booking_date: row.get(1)?,
                    sender_receiver: row.get(2)?,
                    description: row.get(3)?,
                    amount: row.get(4)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Candidates {
        booking: available("booking", booking),
        card: available("card", card),
        bank: available("bank", bank),
    })
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub struct ReconcileResult {
    pub matched: usize,
    pub open_invoices: usize,
    pub candidates: usize,
    pub assignments: Vec<Assignment>,
}

/// First-fit matching of each invoice, in order. A claimed payment is never
/// offered to a later invoice.
pub fn plan_matches(invoices: &[Invoice], candidates: &Candidates) -> Vec<Assignment> {
    let mut claimed: HashSet<PaymentRef> = HashSet::new();
    let mut assignments = Vec::new();
    for invoice in invoices {
        let found = match classify_payment_type(&invoice.payment_type) {
            Some(Channel::Booking) => match_booking(invoice, &candidates.booking, &claimed),
            Some(Channel::Card) => match_card(invoice, &candidates.card, &claimed),
            Some(Channel::Bank) => match_bank(invoice, &candidates.bank, &claimed),
            None => None,
        };
        if let Some(assignment) = found {
            log::debug!(
                "Invoice {} -> {} {:?} ({:.2})",
                invoice.invoice_number,
                assignment.payment.label(),
                assignment.match_type,
                assignment.confidence
            );
            claimed.insert(assignment.payment);
            assignments.push(assignment);
        }
    }
    assignments
}

pub fn run_reconciliation(conn: &Connection) -> Result<ReconcileResult> {
    reconcile_as_of(conn, chrono::Local::now().date_naive())
}

/// Match open invoices against payments from the lookback window ending
/// `today`. Nothing is written unless the whole run succeeds.
pub fn reconcile_as_of(conn: &Connection, today: NaiveDate) -> Result<ReconcileResult> {
    let since = today
        .checked_sub_months(Months::new(LOOKBACK_MONTHS))
        .unwrap_or(NaiveDate::MIN);
    let invoices = load_open_invoices(conn)?;
    let candidates = load_candidates(conn, since)?;
    log::info!(
        "Reconciling {} open invoices against {} candidate payments since {since}",
        invoices.len(),
        candidates.len()
    );
    if candidates.is_empty() {
        log::debug!("No unclaimed payments in the lookback window");
    }

    let assignments = plan_matches(&invoices, &candidates);

    let tx = conn.unchecked_transaction()?;
    {
        let mut insert = tx.prepare_cached(
            "INSERT INTO reconciliation_matches \
             (invoice_id, booking_payment_id, card_payment_id, bank_transaction_id, match_type, confidence) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut flag = tx.prepare_cached(
            "UPDATE invoices SET is_reconciled = 1, reconciled_date = ?1 WHERE id = ?2",
        )?;
        for a in &assignments {
            let (booking, card, bank) = a.payment.columns();
            insert.execute(rusqlite::params![
                a.invoice_id,
                booking,
                card,
                bank,
                a.match_type.as_str(),
                a.confidence,
            ])?;
            flag.execute(rusqlite::params![today, a.invoice_id])?;
        }
    }
    tx.commit()?;
    log::info!("Reconciliation matched {} invoices", assignments.len());

    Ok(ReconcileResult {
        matched: assignments.len(),
        open_invoices: invoices.len(),
        candidates: candidates.len(),
        assignments,
    })
}
