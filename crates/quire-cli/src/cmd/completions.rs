use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `qr completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Generate a shell completion script for `qr` to stdout.
///
/// # Errors
///
/// Returns an error if writing to stdout fails.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> Result<()> {
    let mut out = std::io::stdout();
    generate(args.shell, command, "qr", &mut out);
    Ok(())
}
