use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::repository::RepositoryOptions;
use crate::tree::{DEFAULT_MAX_DEPTH, TraversalStrategy, TreeOptions};

/// Directory holding the store and project config, relative to the project root.
pub const PROJECT_DIR: &str = ".quire";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub blocks: BlocksConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Store location, resolved against `project_root` when relative.
    #[must_use]
    pub fn resolved_path(&self, project_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_root.join(&self.path)
        }
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub strategy: TraversalStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            strategy: TraversalStrategy::default(),
        }
    }
}

impl TreeConfig {
    #[must_use]
    pub const fn options(&self) -> TreeOptions {
        TreeOptions {
            max_depth: self.max_depth,
            strategy: self.strategy,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksConfig {
    #[serde(default)]
    pub require_expected_version: bool,
}

impl BlocksConfig {
    #[must_use]
    pub const fn options(&self) -> RepositoryOptions {
        RepositoryOptions {
            require_expected_version: self.require_expected_version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.quire/config.toml` under `project_root`. A missing file means defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// `[tree] max_depth` is above [`MAX_DEPTH_CEILING`](crate::tree::MAX_DEPTH_CEILING).
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .tree
        .options()
        .validate()
        .with_context(|| format!("Invalid [tree] section in {}", path.display()))?;
    Ok(config)
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("quire/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render the default project config as TOML, for `qr init`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn default_project_config_toml() -> Result<String> {
    toml::to_string_pretty(&ProjectConfig::default()).context("serialize default project config")
}

/// Merge project config, user config and environment into one view.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or malformed.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_store_path() -> PathBuf {
    Path::new(PROJECT_DIR).join("quire.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir(label: &str) -> std::path::PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "quire-config-test-{label}-{}-{id}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir must be created");
        dir
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = make_temp_dir("project-default");
        let cfg = load_project_config(&root).expect("load should succeed");
        assert_eq!(cfg.store.path, PathBuf::from(".quire/quire.db"));
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
        assert_eq!(cfg.tree.max_depth, 256);
        assert_eq!(cfg.tree.strategy, TraversalStrategy::BreadthFirst);
        assert!(!cfg.blocks.require_expected_version);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn max_depth_above_ceiling_is_rejected() {
        let root = make_temp_dir("project-depth");
        std::fs::create_dir_all(root.join(PROJECT_DIR)).expect("create .quire");
        let path = root.join(PROJECT_DIR).join("config.toml");

        std::fs::write(&path, "[tree]\nmax_depth = 4096\n").expect("write config");
        let cfg = load_project_config(&root).expect("ceiling is accepted");
        assert_eq!(cfg.tree.max_depth, crate::tree::MAX_DEPTH_CEILING);

        std::fs::write(&path, "[tree]\nmax_depth = 4294967295\n").expect("write config");
        let err = load_project_config(&root).expect_err("above ceiling");
        assert!(format!("{err:#}").contains("exceeds the ceiling"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = make_temp_dir("project-partial");
        std::fs::create_dir_all(root.join(PROJECT_DIR)).expect("create .quire");
        std::fs::write(
            root.join(PROJECT_DIR).join("config.toml"),
            "[tree]\nstrategy = \"recursive\"\n\n[blocks]\nrequire_expected_version = true\n",
        )
        .expect("write config");

        let cfg = load_project_config(&root).expect("load should succeed");
        assert_eq!(cfg.tree.strategy, TraversalStrategy::RecursiveQuery);
        assert_eq!(cfg.tree.max_depth, 256);
        assert!(cfg.blocks.require_expected_version);
        assert!(cfg.blocks.options().require_expected_version);
        assert_eq!(cfg.store, StoreConfig::default());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = make_temp_dir("project-bad");
        std::fs::create_dir_all(root.join(PROJECT_DIR)).expect("create .quire");
        std::fs::write(
            root.join(PROJECT_DIR).join("config.toml"),
            "[tree]\nmax_depth = \"deep\"\n",
        )
        .expect("write config");

        let err = load_project_config(&root).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn store_path_resolves_against_project_root() {
        let store = StoreConfig::default();
        assert_eq!(
            store.resolved_path(Path::new("/work/notes")),
            PathBuf::from("/work/notes/.quire/quire.db")
        );

        let absolute = StoreConfig {
            path: PathBuf::from("/var/lib/quire.db"),
            busy_timeout_ms: 10,
        };
        assert_eq!(
            absolute.resolved_path(Path::new("/work/notes")),
            PathBuf::from("/var/lib/quire.db")
        );
        assert_eq!(absolute.busy_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn default_config_toml_roundtrips() {
        let rendered = default_project_config_toml().expect("render");
        let parsed: ProjectConfig = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, ProjectConfig::default());
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()));
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("human".to_string()), Some("table".to_string()));
        assert_eq!(text, "text");
    }

    #[test]
    fn unknown_env_format_falls_through_to_user_config() {
        let output = resolve_output(false, Some("json".to_string()), Some("yaml".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"text\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("text"));
        let empty: UserConfig = toml::from_str("").expect("parse empty");
        assert!(empty.output.is_none());
    }
}
