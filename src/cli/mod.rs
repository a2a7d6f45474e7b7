pub mod history;
pub mod import;
pub mod init;
pub mod invoices;
pub mod purge;
pub mod reconcile;
pub mod status;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::{AppError, Result};
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "hotel-recon",
    about = "Reconcile hotel invoices against Booking.com payouts, card settlements and bank transfers."
)]
pub struct Cli {
    /// Show debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// Only log errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for data (default: ~/Documents/hotel-recon)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Property name shown in status output
        #[arg(long)]
        property: Option<String>,
    },
    /// Import CSV exports (PMS invoices, Booking.com payouts, bank statements, card settlements).
    Import {
        /// Files to import; the format is detected from each header line
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Match open invoices against unclaimed payments.
    Reconcile,
    /// List invoices with their matches.
    Invoices {
        /// Only show invoices that are neither reconciled nor manually verified
        #[arg(long)]
        open: bool,
    },
    /// Mark an invoice as manually verified.
    Verify {
        /// Invoice number
        invoice: String,
    },
    /// Clear the manual status and all matches of an invoice.
    Unverify {
        /// Invoice number
        invoice: String,
    },
    /// Set or clear the comment of an invoice.
    Comment {
        /// Invoice number
        invoice: String,
        /// Comment text (omit to clear)
        text: Option<String>,
    },
    /// Set the dunning fields of an invoice.
    Dunning {
        /// Invoice number
        invoice: String,
        /// Dunning status, e.g. '1. Mahnung'
        #[arg(long)]
        status: Option<String>,
        /// How the reminder was sent, e.g. 'E-Mail'
        #[arg(long)]
        method: Option<String>,
        /// Date the reminder was sent: YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Show the import history.
    History {
        /// Include the per-file log lines
        #[arg(long)]
        logs: bool,
    },
    /// Delete all invoices, payments and imports of a month.
    Purge {
        /// Month: YYYY-MM
        month: String,
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Show current database and summary statistics.
    Status,
}

/// Open the configured database, refusing to create one implicitly.
pub(crate) fn open_db() -> Result<Connection> {
    let db_path = Settings::load().db_path();
    if !db_path.exists() {
        return Err(AppError::Settings(format!(
            "No database found at {}\nRun `hotel-recon init` to create one.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok(conn)
}
