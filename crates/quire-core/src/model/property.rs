use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{BlockId, ParseEnumError, normalize};
use crate::error::{BlockError, BlockResult};

pub type PropertyId = Uuid;

/// The closed set of property kinds. The kind decides the shape of `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Person,
    File,
    Formula,
}

impl PropertyType {
    pub const ALL: [Self; 8] = [
        Self::Text,
        Self::Number,
        Self::Select,
        Self::MultiSelect,
        Self::Date,
        Self::Person,
        Self::File,
        Self::Formula,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Date => "date",
            Self::Person => "person",
            Self::File => "file",
            Self::Formula => "formula",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "select" => Ok(Self::Select),
            "multi_select" => Ok(Self::MultiSelect),
            "date" => Ok(Self::Date),
            "person" => Ok(Self::Person),
            "file" => Ok(Self::File),
            "formula" => Ok(Self::Formula),
            _ => Err(ParseEnumError {
                expected: "property type",
                got: s.to_string(),
            }),
        }
    }
}

/// A property row attached to a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: PropertyId,
    pub block_id: BlockId,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub config: Value,
    pub value: Option<Value>,
    pub position: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Property {
    /// Typed view of the stored value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the stored value does not fit the property type.
    pub fn typed_value(&self) -> BlockResult<Option<PropertyValue>> {
        self.value
            .as_ref()
            .map(|value| PropertyValue::parse(self.property_type, value))
            .transpose()
    }
}

/// Input for attaching a property to a block.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProperty {
    pub name: String,
    pub property_type: PropertyType,
    pub config: Value,
    pub value: Option<Value>,
}

impl NewProperty {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            config: json!({}),
            value: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// The synthesized `title` property every page carries.
    pub(crate) fn page_title(title: &str) -> Self {
        Self::new("title", PropertyType::Text)
            .with_config(json!({"format": "plain_text"}))
            .with_value(json!({"text": title}))
    }

    pub(crate) fn validate(&self) -> BlockResult<()> {
        if self.name.trim().is_empty() {
            return Err(BlockError::invalid("property name must not be empty"));
        }
        if let Some(value) = &self.value {
            PropertyValue::parse(self.property_type, value)?;
        }
        Ok(())
    }
}

/// A calendar day or an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    Day(NaiveDate),
    Instant(DateTime<FixedOffset>),
}

/// Typed interpretation of a property value, keyed by its property type.
///
/// Values are stored exactly as supplied; this union only checks and reads them.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Select(String),
    MultiSelect(Vec<String>),
    Date(DateValue),
    Person(Vec<String>),
    File(Value),
    Formula(Value),
}

impl PropertyValue {
    /// Interpret `value` as a value of `property_type`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the JSON shape does not fit the type.
    pub fn parse(property_type: PropertyType, value: &Value) -> BlockResult<Self> {
        let mismatch = || {
            BlockError::invalid(format!(
                "value {value} does not fit property type {property_type}"
            ))
        };

        match property_type {
            PropertyType::Text => match value {
                Value::String(text) => Ok(Self::Text(text.clone())),
                Value::Object(map) => map
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|text| Self::Text(text.to_string()))
                    .ok_or_else(mismatch),
                _ => Err(mismatch()),
            },
            PropertyType::Number => value.as_f64().map(Self::Number).ok_or_else(mismatch),
            PropertyType::Select => value
                .as_str()
                .map(|s| Self::Select(s.to_string()))
                .ok_or_else(mismatch),
            PropertyType::MultiSelect => string_list(value)
                .map(Self::MultiSelect)
                .ok_or_else(mismatch),
            PropertyType::Date => value
                .as_str()
                .and_then(parse_date)
                .map(Self::Date)
                .ok_or_else(mismatch),
            PropertyType::Person => match value {
                Value::String(person) => Ok(Self::Person(vec![person.clone()])),
                Value::Array(_) => string_list(value).map(Self::Person).ok_or_else(mismatch),
                _ => Err(mismatch()),
            },
            PropertyType::File => match value {
                Value::String(_) | Value::Object(_) => Ok(Self::File(value.clone())),
                _ => Err(mismatch()),
            },
            PropertyType::Formula => Ok(Self::Formula(value.clone())),
        }
    }

    #[must_use]
    pub const fn property_type(&self) -> PropertyType {
        match self {
            Self::Text(_) => PropertyType::Text,
            Self::Number(_) => PropertyType::Number,
            Self::Select(_) => PropertyType::Select,
            Self::MultiSelect(_) => PropertyType::MultiSelect,
            Self::Date(_) => PropertyType::Date,
            Self::Person(_) => PropertyType::Person,
            Self::File(_) => PropertyType::File,
            Self::Formula(_) => PropertyType::Formula,
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn parse_date(raw: &str) -> Option<DateValue> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(DateValue::Instant(instant));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(DateValue::Day)
}
