//! Block repository: create, read, update and soft-delete blocks together with
//! their properties, history and relations.
//!
//! Every multi-row write runs in one `BEGIN IMMEDIATE` transaction. An early
//! return drops the transaction, which rolls it back.

use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::query;
use crate::error::{BlockError, BlockResult};
use crate::ids::{IdGenerator, RandomIds};
use crate::model::{
    Block, BlockDetail, BlockHistory, BlockId, BlockPatch, BlockType, BlockWithProperties,
    NewBlock, NewProperty, NewRelation, Property, PropertyValue, Relation, RelationDirection,
    RelationId,
};

/// Behavior switches for [`BlockRepository`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Reject updates that do not carry an expected version.
    pub require_expected_version: bool,
}

/// Repository over a migrated block store connection.
pub struct BlockRepository<'conn> {
    conn: &'conn Connection,
    ids: Arc<dyn IdGenerator>,
    options: RepositoryOptions,
}

impl<'conn> BlockRepository<'conn> {
    #[must_use]
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            ids: Arc::new(RandomIds),
            options: RepositoryOptions::default(),
        }
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub const fn with_options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Create a block with its initial properties, history row and search
    /// placeholder. Page blocks also get a `title` property at position 0.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty workspace or actor, non-object content,
    ///   a malformed property, or a missing, deleted or foreign parent.
    /// - `DuplicateProperty` when two supplied properties share a name.
    /// - `Storage` if the transaction fails.
    pub fn create(&self, actor: &str, input: NewBlock) -> BlockResult<BlockDetail> {
        let actor = require_actor(actor)?;
        if input.workspace_id.trim().is_empty() {
            return Err(BlockError::invalid("workspace_id is required"));
        }
        let content = object_content(input.content)?;

        let id = self.ids.next_id();
        let mut seen = HashSet::new();
        let title = (input.block_type == BlockType::Page).then(|| {
            seen.insert("title".to_string());
            page_title(&content)
        });
        for property in &input.properties {
            property.validate()?;
            if !seen.insert(property.name.clone()) {
                return Err(BlockError::DuplicateProperty {
                    block_id: id,
                    name: property.name.clone(),
                });
            }
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(parent_id) = input.parent_id {
            ensure_parent(&tx, parent_id, &input.workspace_id)?;
        }

        let now = now_us();
        tx.execute(
            "INSERT INTO blocks (id, type, content, parent_id, workspace_id, created_by, \
             created_at_us, updated_at_us, is_deleted, version, permissions) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, 1, ?8)",
            params![
                id.to_string(),
                input.block_type.as_str(),
                query::json_text(&content)?,
                input.parent_id.map(|p| p.to_string()),
                input.workspace_id,
                actor,
                now,
                query::json_text(&crate::model::Permissions::default())?,
            ],
        )?;

        if let Some(title) = title {
            insert_property(&tx, self.ids.as_ref(), id, &NewProperty::page_title(&title), 0, now)?;
        }
        for (position, property) in (0_i64..).zip(&input.properties) {
            insert_property(&tx, self.ids.as_ref(), id, property, position, now)?;
        }

        tx.execute(
            "INSERT INTO block_history (block_id, content, version, modified_by, modified_at_us) \
             VALUES (?1, ?2, 1, ?3, ?4)",
            params![id.to_string(), query::json_text(&content)?, actor, now],
        )?;
        tx.execute(
            "INSERT INTO search_index (block_id, updated_at_us) VALUES (?1, ?2)",
            params![id.to_string(), now],
        )?;
        tx.commit()?;

        tracing::info!(
            block_id = %id,
            workspace_id = %input.workspace_id,
            block_type = %input.block_type,
            "created block"
        );
        self.detail(id, false)
    }

    /// A live block with its properties and live immediate children.
    ///
    /// # Errors
    ///
    /// `NotFound` if the block is missing or soft-deleted.
    pub fn get(&self, id: BlockId) -> BlockResult<BlockDetail> {
        self.detail(id, false)
    }

    /// Like [`Self::get`], but also resolves soft-deleted blocks.
    ///
    /// # Errors
    ///
    /// `NotFound` only if no row exists.
    pub fn get_including_deleted(&self, id: BlockId) -> BlockResult<BlockDetail> {
        self.detail(id, true)
    }

    /// Apply a partial update.
    ///
    /// The pre-mutation content is written to history at the current version,
    /// then the supplied fields change and the version goes up by one. A
    /// `null` content counts as not supplied.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the block is missing or soft-deleted.
    /// - `InvalidInput` for non-object content, a missing expected version
    ///   when one is required, or an invalid new parent.
    /// - `ConcurrencyConflict` if `expected_version` does not match.
    /// - `Storage` if the transaction fails.
    pub fn update(
        &self,
        actor: &str,
        id: BlockId,
        patch: BlockPatch,
    ) -> BlockResult<BlockWithProperties> {
        let actor = require_actor(actor)?;
        if self.options.require_expected_version && patch.expected_version.is_none() {
            return Err(BlockError::invalid(
                "expected_version is required for updates",
            ));
        }
        // A JSON null leaves content untouched, like an omitted field.
        let new_content = patch
            .content
            .filter(|c| !c.is_null())
            .map(|c| object_content(Some(c)))
            .transpose()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = require_live(&tx, id)?;

        if let Some(expected) = patch.expected_version
            && expected != current.version
        {
            return Err(BlockError::ConcurrencyConflict {
                block_id: id,
                expected,
                actual: current.version,
            });
        }

        if let Some(Some(parent_id)) = patch.parent_id {
            if parent_id == id {
                return Err(BlockError::invalid("a block cannot be its own parent"));
            }
            ensure_parent(&tx, parent_id, &current.workspace_id)?;
            if query::is_descendant(&tx, id, parent_id)? {
                return Err(BlockError::invalid(format!(
                    "parent '{parent_id}' is a descendant of '{id}'"
                )));
            }
        }

        let now = now_us();
        tx.execute(
            "INSERT OR IGNORE INTO block_history \
             (block_id, content, version, modified_by, modified_at_us) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                query::json_text(&current.content)?,
                current.version,
                actor,
                now
            ],
        )?;

        let content = new_content.unwrap_or(current.content);
        let block_type = patch.block_type.unwrap_or(current.block_type);
        let parent_id = patch.parent_id.unwrap_or(current.parent_id);
        let permissions = patch.permissions.unwrap_or(current.permissions);

        let changed = tx.execute(
            "UPDATE blocks SET content = ?1, type = ?2, parent_id = ?3, permissions = ?4, \
             version = version + 1, updated_at_us = ?5 \
             WHERE id = ?6 AND version = ?7 AND is_deleted = 0",
            params![
                query::json_text(&content)?,
                block_type.as_str(),
                parent_id.map(|p| p.to_string()),
                query::json_text(&permissions)?,
                now,
                id.to_string(),
                current.version,
            ],
        )?;
        if changed == 0 {
            let actual = query::get_block(&tx, id, true)?.map_or(current.version, |b| b.version);
            return Err(BlockError::ConcurrencyConflict {
                block_id: id,
                expected: current.version,
                actual,
            });
        }
        tx.commit()?;

        tracing::debug!(
            block_id = %id,
            version = current.version + 1,
            workspace_id = %current.workspace_id,
            "updated block"
        );

        let block = query::get_block(self.conn, id, false)?.ok_or_else(|| BlockError::not_found(id))?;
        let properties = query::get_properties(self.conn, id)?;
        Ok(BlockWithProperties { block, properties })
    }

    /// Mark one block deleted. Children are left untouched.
    ///
    /// Returns `true` if this call marked the block, `false` if it was already
    /// deleted.
    ///
    /// # Errors
    ///
    /// `NotFound` if no row exists; `Storage` if the write fails.
    pub fn soft_delete(&self, actor: &str, id: BlockId) -> BlockResult<bool> {
        let actor = require_actor(actor)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let block = query::get_block(&tx, id, true)?.ok_or_else(|| BlockError::not_found(id))?;
        if block.is_deleted {
            tracing::debug!(block_id = %id, "block already deleted");
            return Ok(false);
        }

        let now = now_us();
        tx.execute(
            "UPDATE blocks SET is_deleted = 1, deleted_at_us = ?1, updated_at_us = ?1 \
             WHERE id = ?2 AND is_deleted = 0",
            params![now, id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(block_id = %id, actor, workspace_id = %block.workspace_id, "deleted block");
        Ok(true)
    }

    /// Mark a block and every live descendant deleted in one transaction.
    ///
    /// Returns the number of rows this call marked.
    ///
    /// # Errors
    ///
    /// `NotFound` if no row exists; `Storage` if the write fails.
    pub fn delete_subtree(&self, actor: &str, id: BlockId) -> BlockResult<usize> {
        let actor = require_actor(actor)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if query::get_block(&tx, id, true)?.is_none() {
            return Err(BlockError::not_found(id));
        }

        let marked = tx.execute(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM blocks WHERE id = ?1
                UNION
                SELECT child.id
                FROM blocks child
                INNER JOIN subtree parent ON child.parent_id = parent.id
                WHERE child.is_deleted = 0
            )
            UPDATE blocks
            SET is_deleted = 1, deleted_at_us = ?2, updated_at_us = ?2
            WHERE id IN (SELECT id FROM subtree) AND is_deleted = 0",
            params![id.to_string(), now_us()],
        )?;
        tx.commit()?;

        tracing::info!(block_id = %id, actor, marked, "deleted block subtree");
        Ok(marked)
    }

    /// History rows of a block, oldest version first. Works for deleted blocks.
    ///
    /// # Errors
    ///
    /// `NotFound` if no row exists.
    pub fn history(&self, id: BlockId) -> BlockResult<Vec<BlockHistory>> {
        if query::get_block(self.conn, id, true)?.is_none() {
            return Err(BlockError::not_found(id));
        }
        Ok(query::get_history(self.conn, id)?)
    }

    /// Append a property after the block's current last one.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty name or a value that does not fit the type.
    /// - `NotFound` if the block is missing or deleted.
    /// - `DuplicateProperty` if the name is taken.
    pub fn add_property(
        &self,
        actor: &str,
        block_id: BlockId,
        property: NewProperty,
    ) -> BlockResult<Property> {
        require_actor(actor)?;
        property.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_live(&tx, block_id)?;
        if query::get_property(&tx, block_id, &property.name)?.is_some() {
            return Err(BlockError::DuplicateProperty {
                block_id,
                name: property.name,
            });
        }

        let position = query::next_property_position(&tx, block_id)?;
        insert_property(&tx, self.ids.as_ref(), block_id, &property, position, now_us())?;
        let stored = query::get_property(&tx, block_id, &property.name)?
            .ok_or_else(|| BlockError::not_found(format!("{block_id}/{}", property.name)))?;
        tx.commit()?;

        tracing::debug!(block_id = %block_id, name = %stored.name, position, "added property");
        Ok(stored)
    }

    /// Replace the value of an existing property. `None` clears it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the block is missing or deleted, or has no such property.
    /// - `InvalidInput` if the value does not fit the property type.
    pub fn set_property_value(
        &self,
        actor: &str,
        block_id: BlockId,
        name: &str,
        value: Option<Value>,
    ) -> BlockResult<Property> {
        require_actor(actor)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_live(&tx, block_id)?;
        let existing = query::get_property(&tx, block_id, name)?
            .ok_or_else(|| BlockError::not_found(format!("{block_id}/{name}")))?;
        if let Some(value) = &value {
            PropertyValue::parse(existing.property_type, value)?;
        }

        let value_text = value.as_ref().map(query::json_text).transpose()?;
        tx.execute(
            "UPDATE properties SET value = ?1, updated_at_us = ?2 WHERE id = ?3",
            params![value_text, now_us(), existing.id.to_string()],
        )?;
        let stored = query::get_property(&tx, block_id, name)?
            .ok_or_else(|| BlockError::not_found(format!("{block_id}/{name}")))?;
        tx.commit()?;

        tracing::debug!(block_id = %block_id, name, "set property value");
        Ok(stored)
    }

    /// Properties of a live block in position order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the block is missing or deleted.
    pub fn properties(&self, block_id: BlockId) -> BlockResult<Vec<Property>> {
        require_live(self.conn, block_id)?;
        Ok(query::get_properties(self.conn, block_id)?)
    }

    /// Link two live blocks.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty relation type or non-object properties.
    /// - `NotFound` if either block is missing or deleted.
    pub fn add_relation(&self, actor: &str, relation: NewRelation) -> BlockResult<Relation> {
        require_actor(actor)?;
        let relation_type = relation.relation_type.trim();
        if relation_type.is_empty() {
            return Err(BlockError::invalid("relation_type is required"));
        }
        let properties = object_content(relation.properties)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_live(&tx, relation.source_block)?;
        require_live(&tx, relation.target_block)?;

        let id = self.ids.next_id();
        let now = now_us();
        tx.execute(
            "INSERT INTO relations (id, source_block, target_block, relation_type, properties, \
             created_at_us, updated_at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id.to_string(),
                relation.source_block.to_string(),
                relation.target_block.to_string(),
                relation_type,
                query::json_text(&properties)?,
                now,
            ],
        )?;
        let stored = query::get_relation(&tx, id)?.ok_or_else(|| BlockError::not_found(id))?;
        tx.commit()?;

        tracing::debug!(
            relation_id = %id,
            source = %stored.source_block,
            target = %stored.target_block,
            relation_type = %stored.relation_type,
            "added relation"
        );
        Ok(stored)
    }

    /// Relations touching a block, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` if no block row exists.
    pub fn relations(
        &self,
        block_id: BlockId,
        direction: RelationDirection,
    ) -> BlockResult<Vec<Relation>> {
        if query::get_block(self.conn, block_id, true)?.is_none() {
            return Err(BlockError::not_found(block_id));
        }
        Ok(query::list_relations(self.conn, block_id, direction)?)
    }

    /// Delete a relation row.
    ///
    /// # Errors
    ///
    /// `NotFound` if the relation does not exist.
    pub fn remove_relation(&self, actor: &str, relation_id: RelationId) -> BlockResult<()> {
        require_actor(actor)?;
        let removed = self.conn.execute(
            "DELETE FROM relations WHERE id = ?1",
            params![relation_id.to_string()],
        )?;
        if removed == 0 {
            return Err(BlockError::not_found(relation_id));
        }
        tracing::debug!(relation_id = %relation_id, "removed relation");
        Ok(())
    }

    /// Live root-level blocks of a workspace, optionally of one type.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty workspace id.
    pub fn list_roots(
        &self,
        workspace_id: &str,
        block_type: Option<BlockType>,
    ) -> BlockResult<Vec<Block>> {
        if workspace_id.trim().is_empty() {
            return Err(BlockError::invalid("workspace_id is required"));
        }
        Ok(query::list_roots(self.conn, workspace_id, block_type)?)
    }

    fn detail(&self, id: BlockId, include_deleted: bool) -> BlockResult<BlockDetail> {
        let block = query::get_block(self.conn, id, include_deleted)?
            .ok_or_else(|| BlockError::not_found(id))?;
        let properties = query::get_properties(self.conn, id)?;
        let children = query::get_children(self.conn, id)?
            .into_iter()
            .map(|child| {
                let properties = query::get_properties(self.conn, child.id)?;
                Ok(BlockWithProperties {
                    block: child,
                    properties,
                })
            })
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(BlockDetail {
            block,
            properties,
            children,
        })
    }
}

fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn require_actor(actor: &str) -> BlockResult<&str> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(BlockError::invalid("created_by / actor is required"));
    }
    Ok(actor)
}

fn object_content(content: Option<Value>) -> BlockResult<Value> {
    match content {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(BlockError::invalid(format!(
            "payload must be a JSON object, got {other}"
        ))),
    }
}

fn page_title(content: &Value) -> String {
    content
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn require_live(conn: &Connection, id: BlockId) -> BlockResult<Block> {
    query::get_block(conn, id, false)?.ok_or_else(|| BlockError::not_found(id))
}

fn ensure_parent(conn: &Connection, parent_id: BlockId, workspace_id: &str) -> BlockResult<()> {
    let Some(parent) = query::get_block(conn, parent_id, false)? else {
        return Err(BlockError::invalid(format!(
            "parent block '{parent_id}' does not exist or is deleted"
        )));
    };
    if parent.workspace_id != workspace_id {
        return Err(BlockError::invalid(format!(
            "parent block '{parent_id}' belongs to workspace '{}', not '{workspace_id}'",
            parent.workspace_id
        )));
    }
    Ok(())
}

fn insert_property(
    conn: &Connection,
    ids: &dyn IdGenerator,
    block_id: BlockId,
    property: &NewProperty,
    position: i64,
    now: i64,
) -> BlockResult<()> {
    let value = property.value.as_ref().map(query::json_text).transpose()?;
    conn.execute(
        "INSERT INTO properties (id, block_id, name, type, config, value, position, \
         created_at_us, updated_at_us) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            ids.next_id().to_string(),
            block_id.to_string(),
            property.name,
            property.property_type.as_str(),
            query::json_text(&property.config)?,
            value,
            position,
            now,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BlockRepository, RepositoryOptions, object_content, page_title};
    use crate::db::open_in_memory;
    use crate::error::BlockError;
    use crate::ids::SequentialIds;
    use crate::model::{BlockPatch, BlockType, NewBlock, NewProperty, PropertyType};
    use rusqlite::Connection;
    use serde_json::json;
    use std::sync::Arc;

    fn repo(conn: &Connection) -> BlockRepository<'_> {
        BlockRepository::new(conn).with_ids(Arc::new(SequentialIds::default()))
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count rows")
    }

    #[test]
    fn page_title_defaults_to_untitled() {
        assert_eq!(page_title(&json!({"title": "Home"})), "Home");
        assert_eq!(page_title(&json!({"title": "  "})), "Untitled");
        assert_eq!(page_title(&json!({"title": 7})), "Untitled");
        assert_eq!(page_title(&json!({})), "Untitled");
    }

    #[test]
    fn object_content_rejects_scalars() {
        assert_eq!(object_content(None).expect("empty"), json!({}));
        assert_eq!(object_content(Some(json!(null))).expect("null"), json!({}));
        assert!(matches!(
            object_content(Some(json!([1]))),
            Err(BlockError::InvalidInput(_))
        ));
    }

    #[test]
    fn create_writes_every_side_row() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);

        let page = repo
            .create(
                "ana",
                NewBlock::new(BlockType::Page, "ws").with_content(json!({"title": "Home"})),
            )
            .expect("create page");

        assert_eq!(page.block.version, 1);
        assert!(!page.block.is_deleted);
        assert!(!page.block.permissions.public);
        assert!(page.children.is_empty());
        assert_eq!(page.properties.len(), 1);
        assert_eq!(page.properties[0].name, "title");
        assert_eq!(page.properties[0].position, 0);
        assert_eq!(page.properties[0].value, Some(json!({"text": "Home"})));
        assert_eq!(page.properties[0].config, json!({"format": "plain_text"}));

        assert_eq!(count(&conn, "blocks"), 1);
        assert_eq!(count(&conn, "block_history"), 1);
        assert_eq!(count(&conn, "search_index"), 1);
    }

    #[test]
    fn create_rejects_duplicate_input_property_without_writing() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);

        let err = repo
            .create(
                "ana",
                NewBlock::new(BlockType::Database, "ws")
                    .with_property(NewProperty::new("status", PropertyType::Select))
                    .with_property(NewProperty::new("status", PropertyType::Text)),
            )
            .expect_err("duplicate");
        assert!(matches!(err, BlockError::DuplicateProperty { ref name, .. } if name == "status"));
        assert_eq!(count(&conn, "blocks"), 0);
    }

    #[test]
    fn page_rejects_caller_title_property() {
        let conn = open_in_memory().expect("db");
        let err = repo(&conn)
            .create(
                "ana",
                NewBlock::new(BlockType::Page, "ws")
                    .with_property(NewProperty::new("title", PropertyType::Text)),
            )
            .expect_err("title is synthesized");
        assert!(matches!(err, BlockError::DuplicateProperty { .. }));
    }

    #[test]
    fn create_requires_workspace_and_actor() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);
        assert!(matches!(
            repo.create("ana", NewBlock::new(BlockType::Text, " ")),
            Err(BlockError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.create("", NewBlock::new(BlockType::Text, "ws")),
            Err(BlockError::InvalidInput(_))
        ));
        assert_eq!(count(&conn, "blocks"), 0);
    }

    #[test]
    fn required_expected_version_is_enforced() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn).with_options(RepositoryOptions {
            require_expected_version: true,
        });
        let block = repo
            .create("ana", NewBlock::new(BlockType::Text, "ws"))
            .expect("create");

        let err = repo
            .update("ana", block.block.id, BlockPatch::default().content(json!({"x": 1})))
            .expect_err("missing expected version");
        assert!(matches!(err, BlockError::InvalidInput(_)));

        let updated = repo
            .update(
                "ana",
                block.block.id,
                BlockPatch::default().content(json!({"x": 1})).expect_version(1),
            )
            .expect("versioned update");
        assert_eq!(updated.block.version, 2);
    }

    #[test]
    fn stale_expected_version_is_a_conflict_and_writes_nothing() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);
        let id = repo
            .create("ana", NewBlock::new(BlockType::Text, "ws"))
            .expect("create")
            .block
            .id;
        repo.update("ana", id, BlockPatch::default().content(json!({"x": 2})))
            .expect("first update");

        let err = repo
            .update(
                "bo",
                id,
                BlockPatch::default().content(json!({"x": 3})).expect_version(1),
            )
            .expect_err("stale");
        assert!(matches!(
            err,
            BlockError::ConcurrencyConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(repo.history(id).expect("history").len(), 1);
        assert_eq!(repo.get(id).expect("get").block.content, json!({"x": 2}));
    }

    #[test]
    fn reparent_under_descendant_is_rejected() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);
        let root = repo
            .create("ana", NewBlock::new(BlockType::Page, "ws"))
            .expect("root")
            .block
            .id;
        let child = repo
            .create("ana", NewBlock::new(BlockType::Text, "ws").with_parent(root))
            .expect("child")
            .block
            .id;

        let err = repo
            .update("ana", root, BlockPatch::default().parent(Some(child)))
            .expect_err("cycle");
        assert!(matches!(err, BlockError::InvalidInput(_)));

        let err = repo
            .update("ana", root, BlockPatch::default().parent(Some(root)))
            .expect_err("self parent");
        assert!(matches!(err, BlockError::InvalidInput(_)));

        assert_eq!(repo.get(root).expect("root").block.version, 1);
    }

    #[test]
    fn move_to_root_clears_parent() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);
        let root = repo
            .create("ana", NewBlock::new(BlockType::Page, "ws"))
            .expect("root")
            .block
            .id;
        let child = repo
            .create("ana", NewBlock::new(BlockType::Text, "ws").with_parent(root))
            .expect("child")
            .block
            .id;

        let moved = repo
            .update("ana", child, BlockPatch::default().parent(None))
            .expect("move");
        assert_eq!(moved.block.parent_id, None);
        assert_eq!(moved.block.version, 2);
        assert!(repo.get(root).expect("root").children.is_empty());
    }

    #[test]
    fn set_property_value_validates_against_type() {
        let conn = open_in_memory().expect("db");
        let repo = repo(&conn);
        let id = repo
            .create(
                "ana",
                NewBlock::new(BlockType::Database, "ws")
                    .with_property(NewProperty::new("count", PropertyType::Number)),
            )
            .expect("create")
            .block
            .id;

        let err = repo
            .set_property_value("ana", id, "count", Some(json!("lots")))
            .expect_err("not a number");
        assert!(matches!(err, BlockError::InvalidInput(_)));

        let stored = repo
            .set_property_value("ana", id, "count", Some(json!(4)))
            .expect("set");
        assert_eq!(stored.value, Some(json!(4)));

        let cleared = repo
            .set_property_value("ana", id, "count", None)
            .expect("clear");
        assert_eq!(cleared.value, None);

        assert!(matches!(
            repo.set_property_value("ana", id, "missing", None),
            Err(BlockError::NotFound(_))
        ));
    }
}
