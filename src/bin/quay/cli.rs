//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use quay::ops::ErrorPolicy;
use quay::util::ColorChoice;

/// Quay - build orchestrator for binding-module groups
#[derive(Parser)]
#[command(name = "quay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArgs {
    pub verbose: bool,
    pub quiet: bool,
    pub color: ColorChoice,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            verbose: self.verbose,
            quiet: self.quiet,
            color: if self.no_color {
                ColorChoice::Never
            } else {
                ColorChoice::Auto
            },
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and install every enabled module group
    Build(BuildArgs),

    /// Print the build targets without building
    Plan(PlanArgs),

    /// Discover binding units and regenerate glue only
    Glue(GlueArgs),

    /// List the module groups and whether they are enabled
    Groups(GroupsArgs),

    /// Remove build outputs
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Group enablement flags from the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct GroupArgs {
    /// Enable groups by flag key (e.g. `copyleft_cgal`)
    #[arg(long, value_name = "GROUP", value_delimiter = ',')]
    pub enable: Vec<String>,

    /// Disable groups by flag key (e.g. `restricted_triangle`)
    #[arg(long, value_name = "GROUP", value_delimiter = ',')]
    pub disable: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub groups: GroupArgs,

    /// What to do when a group fails
    #[arg(long, value_enum)]
    pub policy: Option<ErrorPolicy>,

    /// Shorthand for `--policy best-effort`
    #[arg(long, conflicts_with = "policy")]
    pub keep_going: bool,

    /// Fail a group when its interface manifest cannot be generated
    #[arg(long)]
    pub require_manifest: bool,

    /// Emit the build plan as JSON (no build)
    #[arg(long)]
    pub plan: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format for build messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub groups: GroupArgs,
}

#[derive(Args)]
pub struct GlueArgs {
    #[command(flatten)]
    pub groups: GroupArgs,

    /// Output format for messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub groups: GroupArgs,

    /// Print the group list as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Also remove installed modules
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
