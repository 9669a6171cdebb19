//! `qr init`: create the `.quire/` project skeleton and an empty store.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use quire_core::config::{self, PROJECT_DIR};
use quire_core::db::{self, migrations};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.quire/config.toml` even if the project already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "quire.db\nquire.db-wal\nquire.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    project_dir: String,
    store: String,
    schema_version: u32,
}

/// Execute `qr init`. Creates the project skeleton:
///
/// ```text
/// .quire/
///   config.toml   (default project config)
///   .gitignore    (store files)
///   quire.db      (migrated block store)
/// ```
///
/// # Errors
///
/// Returns an error if `.quire/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project: &Project) -> Result<()> {
    let quire_dir = project.root.join(PROJECT_DIR);

    if quire_dir.exists() && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `qr init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&quire_dir)
        .with_context(|| format!("Failed to create {}", quire_dir.display()))?;

    let config_path = quire_dir.join("config.toml");
    std::fs::write(&config_path, config::default_project_config_toml()?)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = quire_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    // Re-read: the store path must match the config just written.
    let project = Project::new(project.root.clone(), config::load_project_config(&project.root)?);
    let store_path = project.store_path();
    let conn = db::open_store(&store_path, project.config.store.busy_timeout())?;
    let schema_version = migrations::current_schema_version(&conn)?;
    tracing::info!(store = %store_path.display(), schema_version, "initialized project");

    let report = InitReport {
        project_dir: quire_dir.display().to_string(),
        store: store_path.display().to_string(),
        schema_version,
    };

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "initialized {} (schema v{})", r.store, r.schema_version),
        |r, w| {
            writeln!(w, "✓ Initialized {PROJECT_DIR}/ project structure.")?;
            writeln!(w)?;
            pretty_kv(w, "Store", &r.store)?;
            pretty_kv(w, "Schema", format!("v{}", r.schema_version))?;
            pretty_kv(w, "Config", format!("{PROJECT_DIR}/config.toml"))?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Set your identity (required for writes):")?;
            writeln!(w, "    export QUIRE_USER=your-name")?;
            writeln!(w)?;
            writeln!(w, "  Create your first page:")?;
            writeln!(w, "    qr create --workspace my-ws --title \"Home\"")
        },
    )
}
