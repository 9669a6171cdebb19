//! `qr history`: list the pre-image snapshots of a block.

use crate::cmd::{Project, parse_block_id};
use crate::output::{OutputMode, format_micros, pretty_section, render_mode};
use clap::Args;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Block ID whose history to list. Works for deleted blocks too.
    pub id: String,
}

/// Execute `qr history <id>`.
///
/// # Errors
///
/// Returns an error if the id is malformed or unknown, or the store fails.
pub fn run_history(args: &HistoryArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let id = parse_block_id(&args.id)?;
    let conn = project.open_store()?;
    let rows = project.repository(&conn).history(id)?;

    render_mode(
        output,
        &rows,
        |rows, w| {
            for row in rows {
                writeln!(w, "v{}  {}  {}  {}", row.version, row.modified_at_us, row.modified_by, row.content)?;
            }
            Ok(())
        },
        |rows, w| {
            pretty_section(w, &format!("History of {id}"))?;
            for row in rows {
                writeln!(
                    w,
                    "v{:<4} {}  {:<16} {}",
                    row.version,
                    format_micros(row.modified_at_us),
                    row.modified_by,
                    row.content
                )?;
            }
            Ok(())
        },
    )
}
