use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: i64,
    pub invoice_date: NaiveDate,
    pub payment_type: String,
    pub invoice_number: String,
    pub recipient: String,
    pub amount: f64,
    pub is_reconciled: bool,
    pub reconciled_date: Option<NaiveDate>,
    pub manual_status: bool,
    pub comment: Option<String>,
    pub dunning_status: Option<String>,
    pub dunning_method: Option<String>,
    pub dunning_date: Option<NaiveDate>,
}

impl Invoice {
    /// A manual status counts as reconciled regardless of any match.
    pub fn is_settled(&self) -> bool {
        self.is_reconciled || self.manual_status
    }
}

/// Online travel agency payout line (channel A).
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct BookingPayment {
    pub id: i64,
    pub reference_number: String,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub payout_date: Option<NaiveDate>,
    pub amount: f64,
}

/// Card network settlement line (channel D).
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct CardPayment {
    pub id: i64,
    pub transaction_date: NaiveDate,
    pub card_type: String,
    pub amount: f64,
    pub gross_amount: Option<f64>,
}

/// Bank statement line (channel C).
#[derive(Debug, Clone)]
pub struct BankTransaction {
    pub id: i64,
    pub booking_date: NaiveDate,
    pub sender_receiver: String,
    pub description: String,
    pub amount: f64,
}

/// The payment side of a reconciliation match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentRef {
    Booking(i64),
    Card(i64),
    Bank(i64),
}

impl PaymentRef {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Booking(_) => "booking",
            Self::Card(_) => "card",
            Self::Bank(_) => "bank",
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            Self::Booking(id) | Self::Card(id) | Self::Bank(id) => id,
        }
    }

    /// Foreign keys in (booking, card, bank) column order.
    pub fn columns(&self) -> (Option<i64>, Option<i64>, Option<i64>) {
        match *self {
            Self::Booking(id) => (Some(id), None, None),
            Self::Card(id) => (None, Some(id), None),
            Self::Bank(id) => (None, None, Some(id)),
        }
    }

    pub fn from_columns(booking: Option<i64>, card: Option<i64>, bank: Option<i64>) -> Option<Self> {
        match (booking, card, bank) {
            (Some(id), None, None) => Some(Self::Booking(id)),
            (None, Some(id), None) => Some(Self::Card(id)),
            (None, None, Some(id)) => Some(Self::Bank(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Automatic,
    ManualRef,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "AUTOMATIC",
            Self::ManualRef => "MANUAL_REF",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "AUTOMATIC" => Some(Self::Automatic),
            "MANUAL_REF" => Some(Self::ManualRef),
            _ => None,
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct ReconciliationMatch {
    pub id: i64,
    pub invoice_id: i64,
    pub payment: PaymentRef,
    pub match_type: MatchType,
    pub confidence: f64,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub id: i64,
    pub filename: String,
    pub file_type: String,
    pub record_count: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    pub logs: Vec<String>,
    pub checksum: Option<String>,
    pub imported_at: String,
}
