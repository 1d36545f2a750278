//! Status command for a quick look at the engine's state.

use std::io::Write;

use anyhow::Result;

use sd_core::analytics::open_by_priority;

use crate::Config;
use crate::commands::open_database;
use crate::tickets::FileTicketDirectory;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;

    writeln!(writer, "Support desk SLA engine")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Tickets:  {}", config.tickets_path.display())?;
    for (table, count) in db.table_counts()? {
        writeln!(writer, "- {table}: {count}")?;
    }

    let directory = FileTicketDirectory::load(&config.tickets_path)?;
    let backlog = open_by_priority(directory.all());
    if !backlog.is_empty() {
        writeln!(writer, "Open backlog:")?;
        for (priority, count) in backlog {
            writeln!(writer, "- {}: {count}", priority.as_str())?;
        }
    }
    Ok(())
}
