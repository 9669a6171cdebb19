//! `qr roots`: list a workspace's live top-level blocks.

use crate::cmd::Project;
use crate::cmd::show::write_block_line;
use crate::output::{OutputMode, pretty_section, render_mode};
use clap::Args;
use quire_core::error::BlockError;
use quire_core::model::{Block, BlockType};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct RootsArgs {
    /// Workspace to list.
    #[arg(short, long)]
    pub workspace: String,

    /// Only blocks of this type (e.g. `page`).
    #[arg(short = 't', long = "type")]
    pub block_type: Option<String>,
}

fn write_lines(w: &mut dyn Write, blocks: &[Block]) -> io::Result<()> {
    for block in blocks {
        write_block_line(w, block)?;
    }
    Ok(())
}

/// Execute `qr roots --workspace <id>`.
///
/// # Errors
///
/// Returns an error if the type is unknown, the workspace is blank, or the
/// store fails.
pub fn run_roots(args: &RootsArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let block_type = args
        .block_type
        .as_deref()
        .map(str::parse::<BlockType>)
        .transpose()
        .map_err(BlockError::from)?;

    let conn = project.open_store()?;
    let roots = project
        .repository(&conn)
        .list_roots(&args.workspace, block_type)?;

    render_mode(
        output,
        &roots,
        |roots, w| write_lines(w, roots),
        |roots, w| {
            pretty_section(w, &format!("Workspace {} ({} roots)", args.workspace, roots.len()))?;
            write_lines(w, roots)
        },
    )
}
