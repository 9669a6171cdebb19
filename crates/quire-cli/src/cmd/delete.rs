//! `qr delete`: soft-delete a block, or a whole subtree with `--recursive`.

use crate::cmd::{Project, parse_block_id};
use crate::identity;
use crate::output::{OutputMode, render_mode};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Block ID to delete.
    pub id: String,

    /// Also delete every live descendant.
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct DeleteReport {
    id: String,
    recursive: bool,
    /// Rows newly marked deleted by this call.
    deleted: usize,
}

/// Execute `qr delete <id>`.
///
/// Without `--recursive`, children stay live but become unreachable through
/// tree reads. Deleting an already-deleted block succeeds and marks nothing.
///
/// # Errors
///
/// Returns an error when no user identity resolves, the id is malformed or
/// unknown, or the store fails.
pub fn run_delete(
    args: &DeleteArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let user = identity::require_user(user_flag)?;
    let id = parse_block_id(&args.id)?;

    let conn = project.open_store()?;
    let repo = project.repository(&conn);
    let deleted = if args.recursive {
        repo.delete_subtree(&user, id)?
    } else {
        usize::from(repo.soft_delete(&user, id)?)
    };

    let report = DeleteReport {
        id: id.to_string(),
        recursive: args.recursive,
        deleted,
    };
    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "deleted {}  {}", r.id, r.deleted),
        |r, w| match r.deleted {
            0 => writeln!(w, "Block {} was already deleted.", r.id),
            1 => writeln!(w, "✓ Deleted block {}.", r.id),
            n => writeln!(w, "✓ Deleted {n} blocks in the subtree of {}.", r.id),
        },
    )
}
