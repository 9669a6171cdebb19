//! User identity resolution for mutating commands.
//!
//! The resolution chain: `--user` flag > `QUIRE_USER` env > `USER` env (TTY only).
//! Every write records the resolved identity as `created_by` or
//! `modified_by`; read-only commands work without one.

use crate::output::CliError;
use quire_core::error::ErrorCode;
use std::env;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_user_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(user) = cli_flag.map(str::trim)
        && !user.is_empty()
    {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("QUIRE_USER") {
        return Some(val);
    }

    // USER only on an interactive terminal.
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the acting user, or `None` when no source provides one.
pub fn resolve_user(cli_flag: Option<&str>) -> Option<String> {
    resolve_user_with(cli_flag, &RealEnv)
}

/// Resolve the acting user, failing with a missing-identity error.
///
/// # Errors
///
/// Returns [`ErrorCode::MissingIdentity`] when no identity source is set.
pub fn require_user(cli_flag: Option<&str>) -> Result<String, CliError> {
    resolve_user(cli_flag).ok_or_else(|| {
        CliError::from_code(
            ErrorCode::MissingIdentity,
            "user identity required for this command",
        )
    })
}
