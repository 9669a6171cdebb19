use serde::Serialize;
use serde_json::Value;

use super::BlockId;

/// Pre-mutation snapshot of a block's content.
///
/// `version` is the block's version before the mutation that wrote the row,
/// so the row labelled `n` holds the content the block had at version `n`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockHistory {
    pub id: i64,
    pub block_id: BlockId,
    pub content: Value,
    pub version: i64,
    pub modified_by: String,
    pub modified_at_us: i64,
}
