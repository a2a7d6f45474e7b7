use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::importer::list_imports;

pub fn run(show_logs: bool) -> Result<()> {
    let conn = open_db()?;
    let imports = list_imports(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Imported", "File", "Type", "Records", "From", "To"]);
    for imp in &imports {
        table.add_row(vec![
            Cell::new(imp.id),
            Cell::new(&imp.imported_at),
            Cell::new(&imp.filename),
            Cell::new(&imp.file_type),
            Cell::new(imp.record_count),
            Cell::new(imp.date_range_start.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(imp.date_range_end.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }
    println!("Import history\n{table}");

    if show_logs {
        for imp in &imports {
            println!("\n#{} {}", imp.id, imp.filename);
            for line in &imp.logs {
                println!("  {line}");
            }
        }
    }
    Ok(())
}
