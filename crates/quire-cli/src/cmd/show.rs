//! `qr show`: display one block with its properties and direct children.

use crate::cmd::{Project, parse_block_id};
use crate::output::{OutputMode, format_micros, pretty_kv, pretty_rule, pretty_section, render_mode};
use clap::Args;
use quire_core::model::{Block, BlockDetail, Property};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Block ID to display.
    pub id: String,

    /// Also show a soft-deleted block.
    #[arg(long)]
    pub include_deleted: bool,
}

/// One text row per block: id, type, version, title.
pub fn write_block_line(w: &mut dyn Write, block: &Block) -> io::Result<()> {
    let deleted = if block.is_deleted { "  (deleted)" } else { "" };
    writeln!(
        w,
        "{}  {}  v{}  {}{deleted}",
        block.id,
        block.block_type,
        block.version,
        block.title().unwrap_or("-"),
    )
}

/// Header fields shared by `show`, `create` and `update`.
pub fn write_block_pretty(w: &mut dyn Write, block: &Block, properties: &[Property]) -> io::Result<()> {
    pretty_section(w, block.title().unwrap_or("(untitled)"))?;
    pretty_kv(w, "ID", block.id.to_string())?;
    pretty_kv(w, "Type", block.block_type.as_str())?;
    pretty_kv(w, "Workspace", &block.workspace_id)?;
    if let Some(parent) = block.parent_id {
        pretty_kv(w, "Parent", parent.to_string())?;
    }
    pretty_kv(w, "Version", block.version.to_string())?;
    pretty_kv(w, "Created", format!("{} by {}", format_micros(block.created_at_us), block.created_by))?;
    pretty_kv(w, "Updated", format_micros(block.updated_at_us))?;
    if let Some(deleted_at) = block.deleted_at_us {
        pretty_kv(w, "Deleted", format_micros(deleted_at))?;
    }
    pretty_kv(w, "Public", block.permissions.public.to_string())?;

    if !properties.is_empty() {
        writeln!(w)?;
        writeln!(w, "Properties")?;
        for prop in properties {
            let value = prop
                .value
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            writeln!(w, "  {} ({}): {value}", prop.name, prop.property_type)?;
        }
    }
    Ok(())
}

fn write_detail_pretty(w: &mut dyn Write, detail: &BlockDetail) -> io::Result<()> {
    write_block_pretty(w, &detail.block, &detail.properties)?;
    if !detail.children.is_empty() {
        writeln!(w)?;
        writeln!(w, "Children ({})", detail.children.len())?;
        for child in &detail.children {
            write!(w, "  ")?;
            write_block_line(w, &child.block)?;
        }
    }
    pretty_rule(w)
}

fn write_detail_text(w: &mut dyn Write, detail: &BlockDetail) -> io::Result<()> {
    write_block_line(w, &detail.block)?;
    for prop in &detail.properties {
        let value = prop.value.as_ref().map_or_else(String::new, ToString::to_string);
        writeln!(w, "prop  {}  {}  {value}", prop.name, prop.property_type)?;
    }
    for child in &detail.children {
        write!(w, "child  ")?;
        write_block_line(w, &child.block)?;
    }
    Ok(())
}

/// Render a block detail in the requested mode.
pub fn render_detail(output: OutputMode, detail: &BlockDetail) -> anyhow::Result<()> {
    render_mode(
        output,
        detail,
        |d, w| write_detail_text(w, d),
        |d, w| write_detail_pretty(w, d),
    )
}

/// Execute `qr show <id>`.
///
/// # Errors
///
/// Returns `NotFound` for a missing block (or a soft-deleted one without
/// `--include-deleted`), or a storage error.
pub fn run_show(args: &ShowArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let id = parse_block_id(&args.id)?;
    let conn = project.open_store()?;
    let repo = project.repository(&conn);
    let detail = if args.include_deleted {
        repo.get_including_deleted(id)?
    } else {
        repo.get(id)?
    };
    render_detail(output, &detail)
}
