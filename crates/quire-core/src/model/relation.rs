use serde::Serialize;
use serde_json::Value;
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{BlockId, ParseEnumError, normalize};

pub type RelationId = Uuid;

/// A typed, directed link between two blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    pub id: RelationId,
    pub source_block: BlockId,
    pub target_block: BlockId,
    pub relation_type: String,
    pub properties: Value,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Input for linking two blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelation {
    pub source_block: BlockId,
    pub target_block: BlockId,
    pub relation_type: String,
    pub properties: Option<Value>,
}

/// Which side of a relation a block sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationDirection {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl RelationDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for RelationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            "both" | "all" => Ok(Self::Both),
            _ => Err(ParseEnumError {
                expected: "relation direction",
                got: s.to_string(),
            }),
        }
    }
}
