#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::Project;
use output::{CliError, OutputMode, render_error};
use quire_core::config;
use quire_core::error::ErrorCode;
use std::env;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quire: a versioned block-tree store",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override user identity (skips env resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Get the user flag as an Option<&str> for resolution.
    fn user_flag(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a quire project",
        long_about = "Create .quire/ with a default config and an empty, migrated block store.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    qr init\n\n    # Rewrite the config of an existing project\n    qr init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Blocks",
        about = "Create a block",
        long_about = "Create a block at version 1, with its initial history row and properties.",
        after_help = "EXAMPLES:\n    # Create a root page\n    qr create --workspace ws --title \"Home\"\n\n    # Create a todo under a page\n    qr create -w ws --type todo --parent <id> --content '{\"text\":\"Ship it\"}'\n\n    # Attach properties up front\n    qr create -w ws --title Tasks --prop status:select=open --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one block",
        long_about = "Show a block with its properties and its direct live children.",
        after_help = "EXAMPLES:\n    # Show a block\n    qr show <id>\n\n    # Include a soft-deleted block\n    qr show <id> --include-deleted --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the block tree under a root",
        long_about = "Materialize every live block reachable from a root, nested by parent.",
        after_help = "EXAMPLES:\n    # Outline a page\n    qr tree <id>\n\n    # Use the recursive query strategy with a tighter cap\n    qr tree <id> --strategy recursive --max-depth 16 --json"
    )]
    Tree(cmd::tree::TreeArgs),

    #[command(
        next_help_heading = "Blocks",
        about = "Update a block",
        long_about = "Apply a partial update. The prior content is kept in history and the version increments.",
        after_help = "EXAMPLES:\n    # Replace content\n    qr update <id> --content '{\"text\":\"v2\"}'\n\n    # Move under another parent, only if still at version 3\n    qr update <id> --parent <parent-id> --expect-version 3"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Blocks",
        about = "Soft-delete a block",
        long_about = "Mark a block deleted. With --recursive, every live descendant is marked too.",
        after_help = "EXAMPLES:\n    # Delete one block\n    qr delete <id>\n\n    # Delete a whole subtree\n    qr delete <id> --recursive"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a block's version history",
        after_help = "EXAMPLES:\n    # List snapshots\n    qr history <id> --json"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Properties",
        about = "Add, set, or list block properties",
        after_help = "EXAMPLES:\n    # Add a select property\n    qr prop add <id> status --type select --value open\n\n    # Change it\n    qr prop set <id> status done\n\n    # List properties\n    qr prop list <id>"
    )]
    Prop(cmd::prop::PropArgs),

    #[command(
        next_help_heading = "Relations",
        about = "Link two blocks",
        after_help = "EXAMPLES:\n    # Record a reference\n    qr relate <source-id> <target-id> --type references"
    )]
    Relate(cmd::relate::RelateArgs),

    #[command(
        next_help_heading = "Relations",
        about = "List a block's relations",
        after_help = "EXAMPLES:\n    # Outgoing links only\n    qr relations <id> --direction outgoing"
    )]
    Relations(cmd::relate::RelationsArgs),

    #[command(
        next_help_heading = "Relations",
        about = "Remove a relation",
        after_help = "EXAMPLES:\n    # Remove a relation by its ID\n    qr unrelate <relation-id>"
    )]
    Unrelate(cmd::relate::UnrelateArgs),

    #[command(
        next_help_heading = "Read",
        about = "List a workspace's root blocks",
        after_help = "EXAMPLES:\n    # Root pages of a workspace\n    qr roots --workspace ws --type page"
    )]
    Roots(cmd::roots::RootsArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash completions\n    qr completions bash > ~/.local/share/bash-completion/completions/qr"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUIRE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "quire=debug,info"
        } else {
            "quire=info,warn"
        })
    });

    let format = env::var("QUIRE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn dispatch(cli: &Cli, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, project),
        Commands::Create(ref args) => {
            cmd::create::run_create(args, cli.user_flag(), output, project)
        }
        Commands::Show(ref args) => cmd::show::run_show(args, output, project),
        Commands::Tree(ref args) => cmd::tree::run_tree(args, output, project),
        Commands::Update(ref args) => {
            cmd::update::run_update(args, cli.user_flag(), output, project)
        }
        Commands::Delete(ref args) => {
            cmd::delete::run_delete(args, cli.user_flag(), output, project)
        }
        Commands::History(ref args) => cmd::history::run_history(args, output, project),
        Commands::Prop(ref args) => cmd::prop::run_prop(args, cli.user_flag(), output, project),
        Commands::Relate(ref args) => {
            cmd::relate::run_relate(args, cli.user_flag(), output, project)
        }
        Commands::Relations(ref args) => cmd::relate::run_relations(args, output, project),
        Commands::Unrelate(ref args) => {
            cmd::relate::run_unrelate(args, cli.user_flag(), output, project)
        }
        Commands::Roots(ref args) => cmd::roots::run_roots(args, output, project),
        Commands::Completions(ref args) => {
            cmd::completions::run_completions(args, &mut Cli::command())
        }
    }
}

fn fail(output: OutputMode, error: &CliError) -> ExitCode {
    if render_error(output, error).is_err() {
        eprintln!("error: {}", error.message);
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let fallback = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            return fail(
                fallback,
                &CliError::from_code(
                    ErrorCode::InternalUnexpected,
                    format!("cannot read current directory: {err}"),
                ),
            );
        }
    };
    // `init` always targets the current directory; everything else finds
    // the nearest enclosing project.
    let root = if matches!(cli.command, Commands::Init(_)) {
        cwd
    } else {
        cmd::project_root_from(&cwd)
    };

    let effective = match config::resolve_config(&root, cli.json) {
        Ok(effective) => effective,
        Err(err) => {
            return fail(
                fallback,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            );
        }
    };
    let output = OutputMode::from_resolved(&effective.resolved_output);
    let project = Project::new(root, effective.project);
    debug!(root = %project.root.display(), ?output, "resolved project");

    match dispatch(&cli, output, &project) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(output, &CliError::from_anyhow(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["qr", "--json", "roots", "--workspace", "ws"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["qr", "roots", "--workspace", "ws", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn user_flag_is_global() {
        let cli = Cli::parse_from(["qr", "delete", "some-id", "--user", "ana"]);
        assert_eq!(cli.user_flag(), Some("ana"));
        assert!(matches!(cli.command, Commands::Delete(ref args) if !args.recursive));
    }

    #[test]
    fn delete_recursive_flag() {
        let cli = Cli::parse_from(["qr", "delete", "some-id", "-r"]);
        assert!(matches!(cli.command, Commands::Delete(ref args) if args.recursive));
    }

    #[test]
    fn verbose_flag_short_form() {
        let cli = Cli::parse_from(["qr", "-v", "history", "some-id"]);
        assert!(cli.verbose);
        assert!(cli.user_flag().is_none());
    }

    #[test]
    fn prop_subcommands_parse() {
        let cli = Cli::parse_from(["qr", "prop", "set", "some-id", "status", "done"]);
        assert!(matches!(
            cli.command,
            Commands::Prop(cmd::prop::PropArgs {
                command: cmd::prop::PropCommand::Set { .. }
            })
        ));
    }

    #[test]
    fn create_requires_workspace() {
        assert!(Cli::try_parse_from(["qr", "create", "--title", "Home"]).is_err());
    }

    #[test]
    fn tree_options_parse() {
        let cli = Cli::parse_from([
            "qr",
            "tree",
            "root-id",
            "--max-depth",
            "8",
            "--strategy",
            "recursive",
        ]);
        let Commands::Tree(args) = cli.command else {
            panic!("expected tree command");
        };
        assert_eq!(args.max_depth, Some(8));
        assert_eq!(args.strategy.as_deref(), Some("recursive"));
    }

    #[test]
    fn completions_accept_known_shells() {
        assert!(Cli::try_parse_from(["qr", "completions", "zsh"]).is_ok());
        assert!(Cli::try_parse_from(["qr", "completions", "tcsh"]).is_err());
    }
}
