//! `qr prop`: add, set and list typed block properties.

use crate::cmd::{Project, parse_block_id, parse_json, parse_loose_value};
use crate::identity;
use crate::output::{OutputMode, pretty_section, render, render_mode};
use clap::{Args, Subcommand};
use quire_core::error::BlockError;
use quire_core::model::{NewProperty, Property, PropertyType};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct PropArgs {
    #[command(subcommand)]
    pub command: PropCommand,
}

#[derive(Subcommand, Debug)]
pub enum PropCommand {
    /// Attach a new property to a block.
    Add {
        /// Block ID.
        id: String,
        /// Property name, unique per block.
        name: String,
        /// Property type: text, number, select, multi_select, date, person, file, or formula.
        #[arg(short = 't', long = "type")]
        property_type: String,
        /// Initial value (JSON, or a bare string).
        #[arg(long)]
        value: Option<String>,
        /// Type-specific configuration (JSON object).
        #[arg(long)]
        config: Option<String>,
    },
    /// Replace the value of an existing property.
    Set {
        /// Block ID.
        id: String,
        /// Property name.
        name: String,
        /// New value (JSON, or a bare string).
        #[arg(required_unless_present = "clear")]
        value: Option<String>,
        /// Clear the value instead.
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },
    /// List a block's properties in position order.
    List {
        /// Block ID.
        id: String,
    },
}

fn write_property_line(w: &mut dyn Write, prop: &Property) -> io::Result<()> {
    let value = prop.value.as_ref().map_or_else(String::new, ToString::to_string);
    writeln!(w, "{}  {}  {}  {value}", prop.position, prop.name, prop.property_type)
}

fn write_property_lines(w: &mut dyn Write, props: &[Property]) -> io::Result<()> {
    for prop in props {
        write_property_line(w, prop)?;
    }
    Ok(())
}

fn render_one(output: OutputMode, prop: &Property) -> anyhow::Result<()> {
    render(output, prop, |p, w| write_property_line(w, p))
}

fn render_list(output: OutputMode, props: &[Property]) -> anyhow::Result<()> {
    render_mode(
        output,
        &props,
        |props, w| write_property_lines(w, props),
        |props, w| {
            pretty_section(w, "Properties")?;
            write_property_lines(w, props)
        },
    )
}

/// Execute `qr prop <add|set|list>`.
///
/// # Errors
///
/// Returns an error when a write has no user identity, an argument is
/// malformed, the block is missing or deleted, or the repository rejects
/// the property.
pub fn run_prop(
    args: &PropArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    match &args.command {
        PropCommand::Add {
            id,
            name,
            property_type,
            value,
            config,
        } => {
            let user = identity::require_user(user_flag)?;
            let id = parse_block_id(id)?;
            let property_type: PropertyType =
                property_type.parse().map_err(BlockError::from)?;
            let mut property = NewProperty::new(name.clone(), property_type);
            if let Some(raw) = config {
                property = property.with_config(parse_json("config", raw)?);
            }
            if let Some(raw) = value {
                property = property.with_value(parse_loose_value(raw));
            }
            let conn = project.open_store()?;
            let added = project.repository(&conn).add_property(&user, id, property)?;
            render_one(output, &added)
        }
        PropCommand::Set {
            id,
            name,
            value,
            clear,
        } => {
            let user = identity::require_user(user_flag)?;
            let id = parse_block_id(id)?;
            let value = if *clear {
                None
            } else {
                value.as_deref().map(parse_loose_value)
            };
            let conn = project.open_store()?;
            let updated = project
                .repository(&conn)
                .set_property_value(&user, id, name, value)?;
            render_one(output, &updated)
        }
        PropCommand::List { id } => {
            let id = parse_block_id(id)?;
            let conn = project.open_store()?;
            let props = project.repository(&conn).properties(id)?;
            render_list(output, &props)
        }
    }
}
