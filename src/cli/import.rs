use std::path::PathBuf;

use colored::Colorize;

use crate::cli::open_db;
use crate::error::Result;
use crate::importer::import_files;

pub fn run(files: &[String]) -> Result<()> {
    let conn = open_db()?;
    let paths: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();

    let reports = import_files(&conn, &paths)?;
    for report in &reports {
        match &report.error {
            Some(err) => println!("{} {}: {err}", "error".red().bold(), report.filename),
            None => println!(
                "{} {}: {} records ({})",
                "processed".green(),
                report.filename,
                report.count,
                report.kind.name()
            ),
        }
    }

    let failed = reports.iter().filter(|r| r.is_error()).count();
    let total: usize = reports.iter().map(|r| r.count).sum();
    println!("{} files, {total} records, {failed} failed", reports.len());
    Ok(())
}
