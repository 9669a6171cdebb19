//! `qr relate`, `qr relations` and `qr unrelate`: typed links between blocks.

use crate::cmd::{Project, parse_block_id, parse_json};
use crate::identity;
use crate::output::{OutputMode, pretty_section, render, render_mode};
use clap::Args;
use quire_core::error::BlockError;
use quire_core::model::{NewRelation, Relation, RelationDirection};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct RelateArgs {
    /// Source block ID.
    pub source: String,

    /// Target block ID.
    pub target: String,

    /// Relation type, e.g. `references` or `blocks`.
    #[arg(short = 't', long = "type")]
    pub relation_type: String,

    /// Relation metadata (JSON object).
    #[arg(long)]
    pub properties: Option<String>,
}

#[derive(Args, Debug)]
pub struct RelationsArgs {
    /// Block ID whose relations to list.
    pub id: String,

    /// Which side to list: outgoing, incoming, or both.
    #[arg(short, long, default_value = "both")]
    pub direction: String,
}

#[derive(Args, Debug)]
pub struct UnrelateArgs {
    /// Relation ID to remove.
    pub relation_id: String,
}

fn write_relation_line(w: &mut dyn Write, relation: &Relation) -> io::Result<()> {
    writeln!(
        w,
        "{}  {} -[{}]-> {}",
        relation.id, relation.source_block, relation.relation_type, relation.target_block
    )
}

/// Execute `qr relate <source> <target> --type <type>`.
///
/// # Errors
///
/// Returns an error when no user identity resolves, an argument is
/// malformed, or either block is missing or deleted.
pub fn run_relate(
    args: &RelateArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let user = identity::require_user(user_flag)?;
    let relation = NewRelation {
        source_block: parse_block_id(&args.source)?,
        target_block: parse_block_id(&args.target)?,
        relation_type: args.relation_type.clone(),
        properties: args
            .properties
            .as_deref()
            .map(|raw| parse_json("properties", raw))
            .transpose()?,
    };

    let conn = project.open_store()?;
    let created = project.repository(&conn).add_relation(&user, relation)?;
    render(output, &created, |r, w| write_relation_line(w, r))
}

/// Execute `qr relations <id>`.
///
/// # Errors
///
/// Returns an error if the id or direction is malformed, the block is
/// unknown, or the store fails.
pub fn run_relations(
    args: &RelationsArgs,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let id = parse_block_id(&args.id)?;
    let direction: RelationDirection = args.direction.parse().map_err(BlockError::from)?;

    let conn = project.open_store()?;
    let relations = project.repository(&conn).relations(id, direction)?;

    let write_all = |relations: &Vec<Relation>, w: &mut dyn Write| -> io::Result<()> {
        for relation in relations {
            write_relation_line(w, relation)?;
        }
        Ok(())
    };
    render_mode(output, &relations, write_all, |relations, w| {
        pretty_section(w, &format!("Relations of {id} ({direction})"))?;
        if relations.is_empty() {
            writeln!(w, "(none)")?;
        }
        write_all(relations, w)
    })
}

#[derive(Debug, Serialize)]
struct UnrelateReport {
    removed: String,
}

/// Execute `qr unrelate <relation-id>`.
///
/// # Errors
///
/// Returns an error when no user identity resolves, the id is malformed,
/// or no such relation exists.
pub fn run_unrelate(
    args: &UnrelateArgs,
    user_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let user = identity::require_user(user_flag)?;
    let relation_id = parse_block_id(&args.relation_id)?;

    let conn = project.open_store()?;
    project.repository(&conn).remove_relation(&user, relation_id)?;

    let report = UnrelateReport {
        removed: relation_id.to_string(),
    };
    render(output, &report, |r, w| writeln!(w, "removed {}", r.removed))
}
