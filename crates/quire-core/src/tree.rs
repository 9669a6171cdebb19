//! Tree materializer: expands a root block into its full live subtree.
//!
//! Blocks are fetched flat, ordered by depth, then attached bottom-up through
//! a parent index. No node holds a pointer to its parent.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fmt, str::FromStr};

use crate::db::query;
use crate::error::{BlockError, BlockResult};
use crate::model::{Block, BlockId, ParseEnumError};

/// Depth cap used when the config does not set one. The root is depth 0.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

/// Largest accepted `max_depth`, whether from config or a caller.
pub const MAX_DEPTH_CEILING: u32 = 4_096;

/// How the flat subtree is pulled from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalStrategy {
    /// Level-by-level `parent_id IN (...)` range queries.
    #[default]
    BreadthFirst,
    /// One `WITH RECURSIVE` closure query.
    #[serde(rename = "recursive", alias = "recursive_query")]
    RecursiveQuery,
}

impl TraversalStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth_first",
            Self::RecursiveQuery => "recursive",
        }
    }
}

impl fmt::Display for TraversalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraversalStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "breadth_first" | "bfs" => Ok(Self::BreadthFirst),
            "recursive" | "recursive_query" | "cte" => Ok(Self::RecursiveQuery),
            _ => Err(ParseEnumError {
                expected: "traversal strategy",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub max_depth: u32,
    pub strategy: TraversalStrategy,
}

impl TreeOptions {
    /// Reject a `max_depth` above [`MAX_DEPTH_CEILING`].
    ///
    /// # Errors
    ///
    /// `InvalidInput` naming the offending value.
    pub fn validate(&self) -> BlockResult<()> {
        if self.max_depth > MAX_DEPTH_CEILING {
            return Err(BlockError::invalid(format!(
                "max_depth {} exceeds the ceiling of {MAX_DEPTH_CEILING}",
                self.max_depth
            )));
        }
        Ok(())
    }
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strategy: TraversalStrategy::default(),
        }
    }
}

/// One block in a materialized tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNode {
    #[serde(flatten)]
    pub block: Block,
    pub depth: u32,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// Total nodes including this one.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Deepest `depth` anywhere in the tree.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        let mut deepest = self.depth;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            deepest = deepest.max(node.depth);
            stack.extend(node.children.iter());
        }
        deepest
    }

    /// Block ids in pre-order.
    #[must_use]
    pub fn ids(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.block.id);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

pub struct TreeMaterializer<'conn> {
    conn: &'conn Connection,
    options: TreeOptions,
}

impl<'conn> TreeMaterializer<'conn> {
    #[must_use]
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            options: TreeOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn options(&self) -> TreeOptions {
        self.options
    }

    /// Materialize the live subtree under `root_id`.
    ///
    /// Reads run inside one deferred transaction so every level sees the same
    /// snapshot.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `max_depth` is above [`MAX_DEPTH_CEILING`].
    /// - `NotFound` if the root is missing or soft-deleted.
    /// - `DepthLimitExceeded` if any live node sits deeper than `max_depth`,
    ///   which is also how a parent cycle surfaces.
    /// - `Storage` if a query fails.
    pub fn materialize(&self, root_id: BlockId) -> BlockResult<BlockNode> {
        self.options.validate()?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let rows = match self.options.strategy {
            TraversalStrategy::BreadthFirst => self.breadth_first(&tx, root_id)?,
            TraversalStrategy::RecursiveQuery => self.recursive(&tx, root_id)?,
        };
        tx.commit()?;

        let tree = assemble(rows).ok_or_else(|| BlockError::not_found(root_id))?;
        tracing::debug!(
            root_id = %root_id,
            nodes = tree.node_count(),
            depth = tree.max_depth(),
            strategy = %self.options.strategy,
            "materialized block tree"
        );
        Ok(tree)
    }

    fn breadth_first(&self, conn: &Connection, root_id: BlockId) -> BlockResult<Vec<(Block, u32)>> {
        let root = query::get_block(conn, root_id, false)?
            .ok_or_else(|| BlockError::not_found(root_id))?;

        let mut frontier = vec![root.id];
        let mut rows = vec![(root, 0)];
        let mut depth = 0;
        loop {
            let level = query::get_children_of_many(conn, &frontier)?;
            if level.is_empty() {
                break;
            }
            if depth >= self.options.max_depth {
                return Err(self.depth_exceeded(root_id));
            }
            depth += 1;
            frontier = level.iter().map(|block| block.id).collect();
            rows.extend(level.into_iter().map(|block| (block, depth)));
        }
        Ok(rows)
    }

    fn recursive(&self, conn: &Connection, root_id: BlockId) -> BlockResult<Vec<(Block, u32)>> {
        let limit = self.options.max_depth.saturating_add(1);
        let rows = query::subtree_with_depth(conn, root_id, limit)?;
        if rows.is_empty() {
            return Err(BlockError::not_found(root_id));
        }
        if rows.iter().any(|(_, depth)| *depth > self.options.max_depth) {
            return Err(self.depth_exceeded(root_id));
        }
        Ok(rows)
    }

    fn depth_exceeded(&self, root_id: BlockId) -> BlockError {
        tracing::warn!(
            root_id = %root_id,
            limit = self.options.max_depth,
            "block tree exceeds depth limit"
        );
        BlockError::DepthLimitExceeded {
            root_id,
            limit: self.options.max_depth,
        }
    }
}

/// Nest depth-ordered rows under the first row.
///
/// Walks from the deepest row back to the root, moving each node into its
/// parent. Children arrive in reverse, so each list is flipped once when its
/// owner is moved.
fn assemble(rows: Vec<(Block, u32)>) -> Option<BlockNode> {
    let index: HashMap<BlockId, usize> = rows
        .iter()
        .enumerate()
        .map(|(idx, (block, _))| (block.id, idx))
        .collect();

    let mut nodes: Vec<Option<BlockNode>> = rows
        .into_iter()
        .map(|(block, depth)| {
            Some(BlockNode {
                block,
                depth,
                children: Vec::new(),
            })
        })
        .collect();

    for idx in (1..nodes.len()).rev() {
        let Some(mut node) = nodes[idx].take() else {
            continue;
        };
        node.children.reverse();

        let parent_idx = node
            .block
            .parent_id
            .and_then(|parent_id| index.get(&parent_id).copied())
            .filter(|parent_idx| *parent_idx < idx);
        match parent_idx.and_then(|p| nodes[p].as_mut()) {
            Some(parent) => parent.children.push(node),
            None => tracing::warn!(block_id = %node.block.id, "dropping block with no parent in tree"),
        }
    }

    let mut root = nodes.into_iter().next().flatten()?;
    root.children.reverse();
    Some(root)
}
