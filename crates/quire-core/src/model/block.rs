use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{ParseEnumError, Property, normalize, property::NewProperty};

/// Blocks are addressed by a generated UUID, never a caller-supplied one.
pub type BlockId = Uuid;

/// The closed set of block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Page,
    Text,
    Heading,
    Database,
    Table,
    Todo,
}

impl BlockType {
    pub const ALL: [Self; 6] = [
        Self::Page,
        Self::Text,
        Self::Heading,
        Self::Database,
        Self::Table,
        Self::Todo,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Text => "text",
            Self::Heading => "heading",
            Self::Database => "database",
            Self::Table => "table",
            Self::Todo => "todo",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "page" => Ok(Self::Page),
            "text" => Ok(Self::Text),
            "heading" => Ok(Self::Heading),
            "database" => Ok(Self::Database),
            "table" => Ok(Self::Table),
            "todo" => Ok(Self::Todo),
            _ => Err(ParseEnumError {
                expected: "block type",
                got: s.to_string(),
            }),
        }
    }
}

/// Stored sharing flags. Not enforced by the core.
///
/// Unknown keys are kept so a round trip never drops caller data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub public: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Permissions {
    #[must_use]
    pub fn public() -> Self {
        Self {
            public: true,
            extra: Map::new(),
        }
    }
}

/// A persisted block row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: Value,
    pub parent_id: Option<BlockId>,
    pub workspace_id: String,
    pub created_by: String,
    pub created_at_us: i64,
    pub updated_at_us: i64,
    pub is_deleted: bool,
    pub deleted_at_us: Option<i64>,
    pub version: i64,
    pub permissions: Permissions,
}

impl Block {
    /// The `title` string of the content payload, if it has one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.content.get("title").and_then(Value::as_str)
    }
}

/// A block together with its ordered properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockWithProperties {
    #[serde(flatten)]
    pub block: Block,
    pub properties: Vec<Property>,
}

/// A block, its properties, and its live immediate children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDetail {
    #[serde(flatten)]
    pub block: Block,
    pub properties: Vec<Property>,
    pub children: Vec<BlockWithProperties>,
}

/// Input for creating a block.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub block_type: BlockType,
    /// Must be a JSON object. `None` stores `{}`.
    pub content: Option<Value>,
    pub parent_id: Option<BlockId>,
    pub workspace_id: String,
    pub properties: Vec<NewProperty>,
}

impl NewBlock {
    pub fn new(block_type: BlockType, workspace_id: impl Into<String>) -> Self {
        Self {
            block_type,
            content: None,
            parent_id: None,
            workspace_id: workspace_id.into(),
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub const fn with_parent(mut self, parent_id: BlockId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: NewProperty) -> Self {
        self.properties.push(property);
        self
    }
}

/// A partial update. Only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockPatch {
    pub content: Option<Value>,
    pub block_type: Option<BlockType>,
    /// `Some(None)` moves the block to the workspace root.
    pub parent_id: Option<Option<BlockId>>,
    pub permissions: Option<Permissions>,
    /// When set, the update applies only if the stored version matches.
    pub expected_version: Option<i64>,
}

impl BlockPatch {
    #[must_use]
    pub fn content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub const fn block_type(mut self, block_type: BlockType) -> Self {
        self.block_type = Some(block_type);
        self
    }

    #[must_use]
    pub const fn parent(mut self, parent_id: Option<BlockId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    #[must_use]
    pub const fn expect_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}
