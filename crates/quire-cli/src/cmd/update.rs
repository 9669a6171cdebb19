//! `qr update`: change a block's content, type, parent or permissions.

use crate::cmd::show::{write_block_line, write_block_pretty};
use crate::cmd::{Project, parse_block_id, parse_json};
use crate::identity;
use crate::output::{OutputMode, pretty_rule, render_mode};
use clap::Args;
use quire_core::error::BlockError;
use quire_core::model::{BlockPatch, BlockType, Permissions};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Block ID to update.
    pub id: String,

    /// Replacement content payload (JSON object; `null` keeps the current one).
    #[arg(long)]
    pub content: Option<String>,

    /// New block type.
    #[arg(short = 't', long = "type")]
    pub block_type: Option<String>,

    /// Move the block under this parent.
    #[arg(short, long, conflicts_with = "root")]
    pub parent: Option<String>,

    /// Move the block to the workspace root.
    #[arg(long)]
    pub root: bool,

    /// Replacement permissions (JSON object, e.g. `{"public":true}`).
    #[arg(long)]
    pub permissions: Option<String>,

    /// Apply only if the block is still at this version.
    #[arg(long, value_name = "VERSION")]
    pub expect_version: Option<i64>,
}

fn build_patch(args: &UpdateArgs) -> Result<BlockPatch, BlockError> {
    let mut patch = BlockPatch::default();
    if let Some(raw) = &args.content {
        patch = patch.content(parse_json("content", raw)?);
    }
    if let Some(raw) = &args.block_type {
        patch = patch.block_type(raw.parse::<BlockType>()?);
    }
    if let Some(raw) = &args.parent {
        patch = patch.parent(Some(parse_block_id(raw)?));
    } else if args.root {
        patch = patch.parent(None);
    }
    if let Some(raw) = &args.permissions {
        let permissions: Permissions = serde_json::from_value(parse_json("permissions", raw)?)
            .map_err(|e| BlockError::InvalidInput(format!("--permissions: {e}")))?;
        patch = patch.permissions(permissions);
    }
    if let Some(version) = args.expect_version {
        patch = patch.expect_version(version);
    }
    Ok(patch)
}

/// Execute `qr update <id>`.
///
/// # Errors
///
/// Returns an error when no user identity resolves, an argument is
/// malformed, the block is missing or deleted, or the expected version is stale.
pub fn run_update(
    args: &UpdateArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let user = identity::require_user(user_flag)?;
    let id = parse_block_id(&args.id)?;
    let patch = build_patch(args)?;

    let conn = project.open_store()?;
    let updated = project.repository(&conn).update(&user, id, patch)?;
    render_mode(
        output,
        &updated,
        |u, w| write_block_line(w, &u.block),
        |u, w| {
            write_block_pretty(w, &u.block, &u.properties)?;
            pretty_rule(w)
        },
    )
}
