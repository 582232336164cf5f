mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    agent::AgentSubcommand, bug::BugSubcommand, sprint::SprintSubcommand,
    story::StorySubcommand, task::TaskSubcommand, worktree::WorktreeSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cadence",
    about = "Agent-driven sprint execution — backlog, planning, worktrees, and sequential task runs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .cadence/ or .git/)
    #[arg(long, global = true, env = "CADENCE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize cadence in the current project
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Project status: active sprint, backlog, agents
    Status,

    /// Manage user stories
    Story {
        #[command(subcommand)]
        subcommand: StorySubcommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Manage bug reports
    Bug {
        #[command(subcommand)]
        subcommand: BugSubcommand,
    },

    /// Plan, start, and complete sprints
    Sprint {
        #[command(subcommand)]
        subcommand: SprintSubcommand,
    },

    /// Inspect the agent registry
    Agent {
        #[command(subcommand)]
        subcommand: AgentSubcommand,
    },

    /// Manage task worktrees
    Worktree {
        #[command(subcommand)]
        subcommand: WorktreeSubcommand,
    },

    /// Copy the data directory into a timestamped backup
    Backup,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Story { subcommand } => cmd::story::run(&root, subcommand, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Bug { subcommand } => cmd::bug::run(&root, subcommand, cli.json),
        Commands::Sprint { subcommand } => cmd::sprint::run(&root, subcommand, cli.json),
        Commands::Agent { subcommand } => cmd::agent::run(&root, subcommand, cli.json),
        Commands::Worktree { subcommand } => cmd::worktree::run(&root, subcommand, cli.json),
        Commands::Backup => cmd::init::backup(&root),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
