use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{expand_path, Settings};

pub fn run(data_dir: Option<String>, property: Option<String>) -> Result<()> {
    let mut settings = Settings::load();
    if let Some(dir) = data_dir {
        settings.data_dir = expand_path(&dir);
    }
    if let Some(name) = property {
        settings.property_name = name.trim().to_string();
    }
    settings.save()?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!("Initialized hotel-recon at {}", resolved.display());
    Ok(())
}
