//! `SQLite` read helpers for the block store.
//!
//! Every function takes a shared `&Connection` (a `Transaction` derefs to one)
//! and returns typed structs, never raw rows. All block queries alias the
//! table as `b` so the column list can be shared.

use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::Type};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::str::FromStr;
use uuid::Uuid;

use crate::model::{
    Block, BlockHistory, BlockId, BlockType, Permissions, Property, PropertyType, Relation,
    RelationDirection, RelationId,
};

/// Columns read by [`row_to_block`], in order.
pub const BLOCK_COLUMNS: &str = "b.id, b.type, b.content, b.parent_id, b.workspace_id, \
     b.created_by, b.created_at_us, b.updated_at_us, b.is_deleted, b.deleted_at_us, \
     b.version, b.permissions";

const BLOCK_COLUMN_COUNT: usize = 12;

/// Stable sibling order: creation time, then insertion order.
pub const SIBLING_ORDER: &str = "b.created_at_us ASC, b.rowid ASC";

const PROPERTY_COLUMNS: &str =
    "id, block_id, name, type, config, value, position, created_at_us, updated_at_us";

const RELATION_COLUMNS: &str =
    "id, source_block, target_block, relation_type, properties, created_at_us, updated_at_us";

/// Upper bound on bound parameters per `IN (...)` query.
pub const MAX_IN_PARAMS: usize = 500;

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Fetch a single block by id.
///
/// Returns `None` if the block does not exist, or is soft-deleted unless
/// `include_deleted` is true.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_block(
    conn: &Connection,
    id: BlockId,
    include_deleted: bool,
) -> rusqlite::Result<Option<Block>> {
    let filter = if include_deleted {
        ""
    } else {
        " AND b.is_deleted = 0"
    };
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks b WHERE b.id = ?1{filter}");
    conn.query_row(&sql, params![id.to_string()], row_to_block)
        .optional()
}

/// Live children of `parent_id` in sibling order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_children(conn: &Connection, parent_id: BlockId) -> rusqlite::Result<Vec<Block>> {
    let sql = format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks b \
         WHERE b.parent_id = ?1 AND b.is_deleted = 0 \
         ORDER BY {SIBLING_ORDER}"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![parent_id.to_string()], row_to_block)?;
    rows.collect()
}

/// Live children of any of `parent_ids`, in sibling order.
///
/// Large inputs are split into chunks of [`MAX_IN_PARAMS`]. Sibling order is
/// preserved per parent because each parent lands in exactly one chunk.
///
/// # Errors
///
/// Returns an error if any query fails.
pub fn get_children_of_many(
    conn: &Connection,
    parent_ids: &[BlockId],
) -> rusqlite::Result<Vec<Block>> {
    let mut out = Vec::new();
    for chunk in parent_ids.chunks(MAX_IN_PARAMS) {
        let mut placeholders = String::new();
        for idx in 1..=chunk.len() {
            if idx > 1 {
                placeholders.push_str(", ");
            }
            let _ = write!(placeholders, "?{idx}");
        }
        let sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks b \
             WHERE b.parent_id IN ({placeholders}) AND b.is_deleted = 0 \
             ORDER BY {SIBLING_ORDER}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = chunk.iter().map(ToString::to_string);
        let rows = stmt.query_map(params_from_iter(ids), row_to_block)?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}

/// Live root-level blocks of a workspace, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_roots(
    conn: &Connection,
    workspace_id: &str,
    block_type: Option<BlockType>,
) -> rusqlite::Result<Vec<Block>> {
    let sql = format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks b \
         WHERE b.workspace_id = ?1 AND b.parent_id IS NULL AND b.is_deleted = 0 \
         AND (?2 IS NULL OR b.type = ?2) \
         ORDER BY {SIBLING_ORDER}"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(
        params![workspace_id, block_type.map(BlockType::as_str)],
        row_to_block,
    )?;
    rows.collect()
}

/// Live blocks reachable from `root_id` with their depth, via a recursive
/// closure over `parent_id`.
///
/// Rows come back ordered by depth, then sibling order. Expansion stops at
/// `depth_limit`, so a parent cycle yields rows up to that depth instead of
/// looping.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn subtree_with_depth(
    conn: &Connection,
    root_id: BlockId,
    depth_limit: u32,
) -> rusqlite::Result<Vec<(Block, u32)>> {
    let sql = format!(
        "WITH RECURSIVE tree(id, depth) AS (
            SELECT id, 0 FROM blocks WHERE id = ?1 AND is_deleted = 0
            UNION ALL
            SELECT child.id, tree.depth + 1
            FROM blocks child
            INNER JOIN tree ON child.parent_id = tree.id
            WHERE child.is_deleted = 0 AND tree.depth < ?2
        )
        SELECT {BLOCK_COLUMNS}, tree.depth
        FROM tree INNER JOIN blocks b ON b.id = tree.id
        ORDER BY tree.depth ASC, {SIBLING_ORDER}"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(
        params![root_id.to_string(), i64::from(depth_limit)],
        |row| {
            let block = row_to_block(row)?;
            let depth: u32 = row.get(BLOCK_COLUMN_COUNT)?;
            Ok((block, depth))
        },
    )?;
    rows.collect()
}

/// Whether `candidate` sits anywhere below `ancestor`, deleted rows included.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn is_descendant(
    conn: &Connection,
    ancestor: BlockId,
    candidate: BlockId,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "WITH RECURSIVE below(id) AS (
            SELECT id FROM blocks WHERE parent_id = ?1
            UNION
            SELECT child.id FROM blocks child INNER JOIN below ON child.parent_id = below.id
        )
        SELECT EXISTS(SELECT 1 FROM below WHERE id = ?2)",
        params![ancestor.to_string(), candidate.to_string()],
        |row| row.get(0),
    )
}

/// Count live blocks in a workspace.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_live_blocks(conn: &Connection, workspace_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM blocks WHERE workspace_id = ?1 AND is_deleted = 0",
        params![workspace_id],
        |row| row.get(0),
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Properties of a block in position order, insertion order breaking ties.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_properties(conn: &Connection, block_id: BlockId) -> rusqlite::Result<Vec<Property>> {
    let sql = format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties \
         WHERE block_id = ?1 ORDER BY position ASC, rowid ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![block_id.to_string()], row_to_property)?;
    rows.collect()
}

/// A single property by `(block_id, name)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_property(
    conn: &Connection,
    block_id: BlockId,
    name: &str,
) -> rusqlite::Result<Option<Property>> {
    let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE block_id = ?1 AND name = ?2");
    conn.query_row(&sql, params![block_id.to_string(), name], row_to_property)
        .optional()
}

/// Position one past the current last property of a block.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn next_property_position(conn: &Connection, block_id: BlockId) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM properties WHERE block_id = ?1",
        params![block_id.to_string()],
        |row| row.get(0),
    )
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// History rows of a block, oldest version first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_history(conn: &Connection, block_id: BlockId) -> rusqlite::Result<Vec<BlockHistory>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, block_id, content, version, modified_by, modified_at_us \
         FROM block_history WHERE block_id = ?1 ORDER BY version ASC",
    )?;
    let rows = stmt.query_map(params![block_id.to_string()], row_to_history)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// A relation by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_relation(conn: &Connection, id: RelationId) -> rusqlite::Result<Option<Relation>> {
    let sql = format!("SELECT {RELATION_COLUMNS} FROM relations WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_relation)
        .optional()
}

/// Relations touching `block_id` on the requested side, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_relations(
    conn: &Connection,
    block_id: BlockId,
    direction: RelationDirection,
) -> rusqlite::Result<Vec<Relation>> {
    let filter = match direction {
        RelationDirection::Outgoing => "source_block = ?1",
        RelationDirection::Incoming => "target_block = ?1",
        RelationDirection::Both => "(source_block = ?1 OR target_block = ?1)",
    };
    let sql = format!(
        "SELECT {RELATION_COLUMNS} FROM relations WHERE {filter} \
         ORDER BY created_at_us ASC, rowid ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![block_id.to_string()], row_to_relation)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a row selected with [`BLOCK_COLUMNS`].
///
/// # Errors
///
/// Returns an error if a column is missing or holds malformed data.
pub fn row_to_block(row: &Row<'_>) -> rusqlite::Result<Block> {
    let permissions: Value = json_column(row, 11)?;
    let permissions: Permissions = serde_json::from_value(permissions)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;

    Ok(Block {
        id: uuid_column(row, 0)?,
        block_type: enum_column(row, 1)?,
        content: json_column(row, 2)?,
        parent_id: optional_uuid_column(row, 3)?,
        workspace_id: row.get(4)?,
        created_by: row.get(5)?,
        created_at_us: row.get(6)?,
        updated_at_us: row.get(7)?,
        is_deleted: row.get::<_, i64>(8)? != 0,
        deleted_at_us: row.get(9)?,
        version: row.get(10)?,
        permissions,
    })
}

fn row_to_property(row: &Row<'_>) -> rusqlite::Result<Property> {
    let value: Option<String> = row.get(5)?;
    let value = value
        .map(|raw| parse_json(&raw, 5))
        .transpose()?;

    Ok(Property {
        id: uuid_column(row, 0)?,
        block_id: uuid_column(row, 1)?,
        name: row.get(2)?,
        property_type: enum_column::<PropertyType>(row, 3)?,
        config: json_column(row, 4)?,
        value,
        position: row.get(6)?,
        created_at_us: row.get(7)?,
        updated_at_us: row.get(8)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<BlockHistory> {
    Ok(BlockHistory {
        id: row.get(0)?,
        block_id: uuid_column(row, 1)?,
        content: json_column(row, 2)?,
        version: row.get(3)?,
        modified_by: row.get(4)?,
        modified_at_us: row.get(5)?,
    })
}

fn row_to_relation(row: &Row<'_>) -> rusqlite::Result<Relation> {
    Ok(Relation {
        id: uuid_column(row, 0)?,
        source_block: uuid_column(row, 1)?,
        target_block: uuid_column(row, 2)?,
        relation_type: row.get(3)?,
        properties: json_column(row, 4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    parse_uuid(&raw, idx)
}

fn optional_uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_uuid(&value, idx)).transpose()
}

fn parse_uuid(raw: &str, idx: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    parse_json(&raw, idx)
}

fn parse_json(raw: &str, idx: usize) -> rusqlite::Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Serialize a value into the JSON text stored in payload columns.
///
/// # Errors
///
/// Returns a conversion error if serialization fails.
pub fn json_text<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use rusqlite::Connection;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// Insert a block row with minimal required fields.
    fn insert_block(conn: &Connection, n: u128, parent: Option<u128>, created_at_us: i64) {
        conn.execute(
            "INSERT INTO blocks (id, type, content, parent_id, workspace_id, created_by, \
             created_at_us, updated_at_us) VALUES (?1, 'text', '{}', ?2, 'ws', 'ana', ?3, ?3)",
            params![
                id(n).to_string(),
                parent.map(|p| id(p).to_string()),
                created_at_us
            ],
        )
        .expect("insert block");
    }

    fn mark_deleted(conn: &Connection, n: u128) {
        conn.execute(
            "UPDATE blocks SET is_deleted = 1, deleted_at_us = 9 WHERE id = ?1",
            params![id(n).to_string()],
        )
        .expect("soft delete");
    }

    #[test]
    fn get_block_excludes_deleted_by_default() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 10);
        mark_deleted(&conn, 1);

        assert!(get_block(&conn, id(1), false).expect("query").is_none());
        let row = get_block(&conn, id(1), true)
            .expect("query")
            .expect("row present");
        assert!(row.is_deleted);
        assert_eq!(row.deleted_at_us, Some(9));
        assert_eq!(row.permissions, Permissions::default());
    }

    #[test]
    fn get_block_not_found() {
        let conn = open_in_memory().expect("db");
        assert!(get_block(&conn, id(404), true).expect("query").is_none());
    }

    #[test]
    fn children_are_ordered_by_creation_then_insertion() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 10);
        insert_block(&conn, 3, Some(1), 30);
        insert_block(&conn, 2, Some(1), 20);
        insert_block(&conn, 4, Some(1), 20);
        insert_block(&conn, 5, Some(1), 5);
        mark_deleted(&conn, 5);

        let ids: Vec<_> = get_children(&conn, id(1))
            .expect("children")
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![id(2), id(4), id(3)]);
    }

    #[test]
    fn children_of_many_spans_chunks() {
        let conn = open_in_memory().expect("db");
        let parents: Vec<u128> = (1..=(MAX_IN_PARAMS as u128 + 3)).collect();
        for p in &parents {
            insert_block(&conn, *p, None, 1);
        }
        let first_child = 10_000;
        insert_block(&conn, first_child, Some(1), 2);
        insert_block(&conn, first_child + 1, Some(*parents.last().expect("parent")), 2);

        let parent_ids: Vec<_> = parents.iter().map(|p| id(*p)).collect();
        let children = get_children_of_many(&conn, &parent_ids).expect("children");
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn subtree_with_depth_orders_by_depth() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 1);
        insert_block(&conn, 2, Some(1), 2);
        insert_block(&conn, 3, Some(2), 3);
        insert_block(&conn, 4, Some(1), 4);

        let rows = subtree_with_depth(&conn, id(1), 10).expect("subtree");
        let shape: Vec<_> = rows.iter().map(|(b, d)| (b.id, *d)).collect();
        assert_eq!(
            shape,
            vec![(id(1), 0), (id(2), 1), (id(4), 1), (id(3), 2)]
        );
    }

    #[test]
    fn subtree_stops_at_depth_limit_on_cycles() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 1);
        insert_block(&conn, 2, Some(1), 2);
        conn.execute(
            "UPDATE blocks SET parent_id = ?1 WHERE id = ?2",
            params![id(2).to_string(), id(1).to_string()],
        )
        .expect("write cycle");

        let rows = subtree_with_depth(&conn, id(1), 5).expect("bounded");
        let deepest = rows.iter().map(|(_, d)| *d).max().expect("rows");
        assert_eq!(deepest, 5);
    }

    #[test]
    fn is_descendant_walks_all_levels() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 1);
        insert_block(&conn, 2, Some(1), 2);
        insert_block(&conn, 3, Some(2), 3);

        assert!(is_descendant(&conn, id(1), id(3)).expect("query"));
        assert!(!is_descendant(&conn, id(3), id(1)).expect("query"));
        assert!(!is_descendant(&conn, id(1), id(1)).expect("query"));
    }

    #[test]
    fn list_roots_filters_by_type() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 1);
        insert_block(&conn, 2, Some(1), 2);
        conn.execute(
            "INSERT INTO blocks (id, type, workspace_id, created_by, created_at_us, updated_at_us) \
             VALUES (?1, 'page', 'ws', 'ana', 3, 3)",
            params![id(7).to_string()],
        )
        .expect("insert page");

        assert_eq!(list_roots(&conn, "ws", None).expect("roots").len(), 2);
        let pages = list_roots(&conn, "ws", Some(BlockType::Page)).expect("pages");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, id(7));
        assert!(list_roots(&conn, "other", None).expect("roots").is_empty());
        assert_eq!(count_live_blocks(&conn, "ws").expect("count"), 3);
    }

    #[test]
    fn malformed_uuid_is_a_conversion_error() {
        let conn = open_in_memory().expect("db");
        conn.execute(
            "INSERT INTO blocks (id, type, workspace_id, created_by, created_at_us, updated_at_us) \
             VALUES ('not-a-uuid', 'text', 'ws', 'ana', 1, 1)",
            [],
        )
        .expect("insert raw row");
        let err = conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks b"),
                [],
                row_to_block,
            )
            .expect_err("bad uuid");
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _)
        ));
    }

    #[test]
    fn next_property_position_starts_at_zero() {
        let conn = open_in_memory().expect("db");
        insert_block(&conn, 1, None, 1);
        assert_eq!(next_property_position(&conn, id(1)).expect("pos"), 0);
    }
}
