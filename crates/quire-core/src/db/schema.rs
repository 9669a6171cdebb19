//! Canonical SQLite schema for the quire block store.
//!
//! - `blocks` is the self-referencing hierarchy, soft-deleted in place
//! - `properties` and `block_history` are owned by their block
//! - `relations` links blocks across the hierarchy
//! - `search_index` holds one placeholder row per block; vectors stay empty
//! - `store_meta` tracks the applied schema version

/// Migration v1: tables.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK (type IN ('page', 'text', 'heading', 'database', 'table', 'todo')),
    content TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(content)),
    parent_id TEXT REFERENCES blocks(id),
    workspace_id TEXT NOT NULL CHECK (length(trim(workspace_id)) > 0),
    created_by TEXT NOT NULL CHECK (length(trim(created_by)) > 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    deleted_at_us INTEGER,
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    permissions TEXT NOT NULL DEFAULT '{"public":false}' CHECK (json_valid(permissions)),
    CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE TABLE IF NOT EXISTS properties (
    id TEXT PRIMARY KEY,
    block_id TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    type TEXT NOT NULL CHECK (type IN (
        'text', 'number', 'select', 'multi_select', 'date', 'person', 'file', 'formula'
    )),
    config TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(config)),
    value TEXT CHECK (value IS NULL OR json_valid(value)),
    position INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (block_id, name)
);

CREATE TABLE IF NOT EXISTS block_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_id TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    content TEXT NOT NULL CHECK (json_valid(content)),
    version INTEGER NOT NULL CHECK (version >= 1),
    modified_by TEXT NOT NULL,
    modified_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS search_index (
    block_id TEXT PRIMARY KEY REFERENCES blocks(id) ON DELETE CASCADE,
    content_vector BLOB,
    properties_vector BLOB,
    relations_vector BLOB,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS relations (
    id TEXT PRIMARY KEY,
    source_block TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    target_block TEXT NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL CHECK (length(trim(relation_type)) > 0),
    properties TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(properties)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER));
"#;

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_blocks_parent
    ON blocks(parent_id, is_deleted, created_at_us);

CREATE INDEX IF NOT EXISTS idx_blocks_workspace
    ON blocks(workspace_id, parent_id, is_deleted);

CREATE INDEX IF NOT EXISTS idx_blocks_type
    ON blocks(type);

CREATE INDEX IF NOT EXISTS idx_properties_block
    ON properties(block_id, position);

CREATE UNIQUE INDEX IF NOT EXISTS idx_block_history_version
    ON block_history(block_id, version);

CREATE INDEX IF NOT EXISTS idx_relations_source
    ON relations(source_block, relation_type);

CREATE INDEX IF NOT EXISTS idx_relations_target
    ON relations(target_block, relation_type);
";

/// Indexes the query layer relies on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_blocks_parent",
    "idx_blocks_workspace",
    "idx_blocks_type",
    "idx_properties_block",
    "idx_block_history_version",
    "idx_relations_source",
    "idx_relations_target",
];

/// Tables every migrated store has.
pub const REQUIRED_TABLES: &[&str] = &[
    "blocks",
    "properties",
    "block_history",
    "search_index",
    "relations",
    "store_meta",
];
