//! Typed data model for blocks and everything a block owns.

pub mod block;
pub mod history;
pub mod property;
pub mod relation;

use std::fmt;

pub use block::{
    Block, BlockDetail, BlockId, BlockPatch, BlockType, BlockWithProperties, NewBlock, Permissions,
};
pub use history::BlockHistory;
pub use property::{DateValue, NewProperty, Property, PropertyId, PropertyType, PropertyValue};
pub use relation::{NewRelation, Relation, RelationDirection, RelationId};

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl From<ParseEnumError> for crate::error::BlockError {
    fn from(err: ParseEnumError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}
