mod cli;
mod db;
mod detect;
mod error;
mod fmt;
mod importer;
mod invoices;
mod models;
mod parse;
mod reconciler;
mod settings;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Init { data_dir, property } => cli::init::run(data_dir, property),
        Commands::Import { files } => cli::import::run(&files),
        Commands::Reconcile => cli::reconcile::run(),
        Commands::Invoices { open } => cli::invoices::list(open),
        Commands::Verify { invoice } => cli::invoices::verify(&invoice),
        Commands::Unverify { invoice } => cli::invoices::unverify(&invoice),
        Commands::Comment { invoice, text } => cli::invoices::comment(&invoice, text.as_deref()),
        Commands::Dunning {
            invoice,
            status,
            method,
            date,
        } => cli::invoices::dunning(&invoice, status.as_deref(), method.as_deref(), date.as_deref()),
        Commands::History { logs } => cli::history::run(logs),
        Commands::Purge { month, yes } => cli::purge::run(&month, yes),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
