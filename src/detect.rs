/// Source format of an uploaded file, as recorded in the import history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    BookingPayout,
    PmsInvoice,
    BankStatement,
    CardSettlement,
    Unknown,
    Error,
}

impl FileKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::BookingPayout => "BOOKING",
            Self::PmsInvoice => "INVOICE",
            Self::BankStatement => "BANK",
            Self::CardSettlement => "CARD",
            Self::Unknown => "UNKNOWN",
            Self::Error => "ERROR",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BookingPayout => "Booking.com payout",
            Self::PmsInvoice => "PMS invoice export",
            Self::BankStatement => "Bank statement",
            Self::CardSettlement => "Card settlement",
            Self::Unknown => "Unknown format",
            Self::Error => "Import error",
        }
    }
}

/// Classify a file by the tokens present in its header line.
///
/// Checks run in a fixed order; the first one that fits wins.
pub fn detect_kind(header: &str) -> FileKind {
    let has = |token: &str| header.contains(token);

    if (has("Referenznummer") && has("Datum"))
        || has("Booking.com")
        || (has("Reference number") && (has("Date") || has("Payout")))
    {
        return FileKind::BookingPayout;
    }
    if has("Rechnungsdatum") && has("Rechnungsnummer") {
        return FileKind::PmsInvoice;
    }
    if (has("Buchungstag") && has("Verwendungszweck")) || has("Valutadatum") {
        return FileKind::BankStatement;
    }
    if (has("Transaktionsdatum") || has("Belegdatum")) && (has("Umsatz") || has("Betrag")) {
        return FileKind::CardSettlement;
    }
    if has("Date") && has("Amount") {
        return FileKind::CardSettlement;
    }
    FileKind::Unknown
}

/// Pick the field delimiter from the header line: `;`, then tab, then `,`.
pub fn detect_delimiter(header: &str) -> u8 {
    if header.contains(';') {
        b';'
    } else if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}
