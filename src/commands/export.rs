use crate::storage::{export_csv, load_table};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportArgs {
    /// Result table to export
    #[arg(long)]
    pub table: PathBuf,

    /// CSV file to write
    #[arg(long)]
    pub csv: PathBuf,
}

pub fn run(args: ExportArgs) -> Result<()> {
    let table = load_table(&args.table)?;
    export_csv(&table, &args.csv)?;
    println!("Exported {} rows to {}", table.rows.len(), args.csv.display());
    Ok(())
}
