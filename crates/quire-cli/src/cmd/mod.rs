pub mod completions;
pub mod create;
pub mod delete;
pub mod history;
pub mod init;
pub mod prop;
pub mod relate;
pub mod roots;
pub mod show;
pub mod tree;
pub mod update;

use crate::output::CliError;
use anyhow::Result;
use quire_core::config::ProjectConfig;
use quire_core::db;
use quire_core::error::{BlockError, ErrorCode};
use quire_core::model::BlockId;
use quire_core::tree::TreeMaterializer;
use quire_core::BlockRepository;
use rusqlite::Connection;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The project a command runs against: its root directory and loaded config.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub const fn new(root: PathBuf, config: ProjectConfig) -> Self {
        Self { root, config }
    }

    pub fn store_path(&self) -> PathBuf {
        self.config.store.resolved_path(&self.root)
    }

    /// Open the project's store, failing when `qr init` has not run.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::NotInitialized`] if the store file is missing, or
    /// the underlying error if it cannot be opened or migrated.
    pub fn open_store(&self) -> Result<Connection> {
        let path = self.store_path();
        match db::open_existing_store(&path, self.config.store.busy_timeout())? {
            Some(conn) => Ok(conn),
            None => Err(CliError::from_code(
                ErrorCode::NotInitialized,
                format!("block store not found at {}", path.display()),
            )
            .into()),
        }
    }

    pub fn repository<'conn>(&self, conn: &'conn Connection) -> BlockRepository<'conn> {
        BlockRepository::new(conn).with_options(self.config.blocks.options())
    }

    pub fn materializer<'conn>(&self, conn: &'conn Connection) -> TreeMaterializer<'conn> {
        TreeMaterializer::new(conn).with_options(self.config.tree.options())
    }

    #[cfg(test)]
    pub fn at(root: &Path) -> Self {
        Self::new(root.to_path_buf(), ProjectConfig::default())
    }
}

/// Parse a block id argument.
pub fn parse_block_id(raw: &str) -> Result<BlockId, BlockError> {
    BlockId::parse_str(raw.trim())
        .map_err(|_| BlockError::InvalidInput(format!("'{raw}' is not a valid block id")))
}

/// Parse a JSON argument, naming the flag it came from on failure.
pub fn parse_json(flag: &str, raw: &str) -> Result<Value, BlockError> {
    serde_json::from_str(raw)
        .map_err(|e| BlockError::InvalidInput(format!("--{flag} is not valid JSON: {e}")))
}

/// Parse a value argument: JSON when it parses, otherwise a bare string.
pub fn parse_loose_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Resolve `project_root` to the directory holding the `.quire` project.
pub fn project_root_from(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|dir| dir.join(quire_core::config::PROJECT_DIR).is_dir())
        .unwrap_or(cwd)
        .to_path_buf()
}
