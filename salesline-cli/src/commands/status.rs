//! Status command - row counts of the stored tables

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Salesline Data Status".bold());
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Table", "Rows"]);
    for entry in &status.tables {
        table.add_row(vec![entry.table.clone(), entry.rows.to_string()]);
    }
    println!("{}", table);
    println!();

    match &status.last_refresh {
        Some(at) => println!("Cache refreshed: {} UTC", at),
        None => output::warning("Cache never refreshed. Run 'sl run' to publish data."),
    }
    println!("Database: {}", status.database.dimmed());

    Ok(())
}
