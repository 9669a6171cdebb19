//! `qr create`: create a block, optionally under a parent.

use crate::cmd::show::render_detail;
use crate::cmd::{Project, parse_block_id, parse_json, parse_loose_value};
use crate::identity;
use crate::output::OutputMode;
use clap::Args;
use quire_core::error::BlockError;
use quire_core::model::{BlockType, NewBlock, NewProperty, PropertyType};
use serde_json::{Map, Value};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Workspace the block belongs to.
    #[arg(short, long)]
    pub workspace: String,

    /// Block type: page, text, heading, database, table, or todo.
    #[arg(short = 't', long = "type", default_value = "page")]
    pub block_type: String,

    /// Title, stored as `content.title` (and as the title property of a page).
    #[arg(long)]
    pub title: Option<String>,

    /// Content payload as a JSON object.
    #[arg(long)]
    pub content: Option<String>,

    /// Parent block ID.
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Initial property as `NAME:TYPE[=VALUE]` (repeatable).
    #[arg(long = "prop", value_name = "NAME:TYPE[=VALUE]")]
    pub props: Vec<String>,
}

/// Parse `NAME:TYPE[=VALUE]`. The value is JSON when it parses, else a string.
pub fn parse_property_arg(raw: &str) -> Result<NewProperty, BlockError> {
    let (head, value) = match raw.split_once('=') {
        Some((head, value)) => (head, Some(parse_loose_value(value))),
        None => (raw, None),
    };
    let (name, kind) = head.split_once(':').ok_or_else(|| {
        BlockError::InvalidInput(format!("property '{raw}' must look like NAME:TYPE[=VALUE]"))
    })?;
    let property = NewProperty::new(name.trim(), kind.parse::<PropertyType>()?);
    Ok(match value {
        Some(value) => property.with_value(value),
        None => property,
    })
}

fn build_content(args: &CreateArgs) -> Result<Option<Value>, BlockError> {
    let content = args
        .content
        .as_deref()
        .map(|raw| parse_json("content", raw))
        .transpose()?;
    let Some(title) = &args.title else {
        return Ok(content);
    };

    let mut object = match content {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(BlockError::InvalidInput(
                "--content must be a JSON object when --title is set".to_string(),
            ));
        }
    };
    object.insert("title".to_string(), Value::String(title.clone()));
    Ok(Some(Value::Object(object)))
}

/// Execute `qr create`.
///
/// # Errors
///
/// Returns an error when no user identity resolves, an argument is
/// malformed, or the repository rejects the block.
pub fn run_create(
    args: &CreateArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let user = identity::require_user(user_flag)?;

    let block_type: BlockType = args.block_type.parse().map_err(BlockError::from)?;
    let mut input = NewBlock::new(block_type, args.workspace.clone());
    input.content = build_content(args)?;
    if let Some(parent) = &args.parent {
        input = input.with_parent(parse_block_id(parent)?);
    }
    for raw in &args.props {
        input = input.with_property(parse_property_arg(raw)?);
    }

    let conn = project.open_store()?;
    let detail = project.repository(&conn).create(&user, input)?;
    render_detail(output, &detail)
}
