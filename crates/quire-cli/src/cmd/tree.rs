//! `qr tree`: materialize the live subtree under a block.

use crate::cmd::show::write_block_line;
use crate::cmd::{Project, parse_block_id};
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};
use clap::Args;
use quire_core::error::BlockError;
use quire_core::tree::{BlockNode, TraversalStrategy};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Root block ID.
    pub id: String,

    /// Maximum depth below the root, at most 4096 (overrides `[tree] max_depth`).
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Traversal strategy: `breadth_first` or `recursive` (overrides `[tree] strategy`).
    #[arg(long)]
    pub strategy: Option<String>,
}

/// Pre-order walk, one indented line per node.
fn write_outline(w: &mut dyn Write, root: &BlockNode) -> io::Result<()> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let indent = usize::try_from(node.depth).unwrap_or(usize::MAX / 2);
        write!(w, "{:width$}", "", width = indent * 2)?;
        write_block_line(w, &node.block)?;
        stack.extend(node.children.iter().rev());
    }
    Ok(())
}

/// Execute `qr tree <id>`.
///
/// # Errors
///
/// Returns `InvalidInput` for a cap above the ceiling, `NotFound` for a
/// missing or deleted root, `DepthLimitExceeded` when the tree is deeper than
/// the cap, or a storage error.
pub fn run_tree(args: &TreeArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let id = parse_block_id(&args.id)?;

    let mut options = project.config.tree.options();
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    if let Some(raw) = &args.strategy {
        options.strategy = raw.parse::<TraversalStrategy>().map_err(BlockError::from)?;
    }

    let conn = project.open_store()?;
    let tree = project.materializer(&conn).with_options(options).materialize(id)?;

    render_mode(output, &tree, |t, w| write_outline(w, t), |t, w| {
        pretty_section(
            w,
            &format!("{} blocks, {} levels deep", t.node_count(), t.max_depth()),
        )?;
        write_outline(w, t)?;
        pretty_rule(w)
    })
}
