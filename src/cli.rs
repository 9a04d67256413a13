use crate::scenario::Scenario;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative multi-cloud Kubernetes stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Stack file to use instead of ./nimbus.toml or the user config
    #[arg(short, long, global = true, env = "NIMBUS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what a scenario declares, grouped by type
    Preview(PreviewArgs),

    /// Converge a scenario against the local preview engine
    Up(UpArgs),

    /// Show convergence waves and teardown order
    Graph(GraphArgs),

    /// List the available scenarios
    Scenarios,

    /// Inspect the stack configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Stack Commands
// ============================================================================

#[derive(Args)]
pub struct PreviewArgs {
    /// Scenario to build
    #[arg(value_enum)]
    pub scenario: Scenario,

    /// Show the full ownership tree instead of per-type groups
    #[arg(long)]
    pub tree: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct UpArgs {
    /// Scenario to converge
    #[arg(value_enum)]
    pub scenario: Scenario,

    /// Nodes realized in parallel within a wave
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    /// Only converge matching nodes and what they need (type or type.name)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Print outputs as JSON
    #[arg(long)]
    pub json: bool,

    /// Print secret outputs in plain text
    #[arg(long)]
    pub show_secrets: bool,

    /// Simulate a failure while realizing the given identity (repeatable)
    #[arg(long, value_name = "IDENTITY")]
    pub fail: Vec<String>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Scenario to plan
    #[arg(value_enum)]
    pub scenario: Scenario,

    /// Only plan matching nodes and what they need (type or type.name)
    #[arg(short, long)]
    pub target: Option<String>,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective stack configuration and where it came from
    Show,

    /// Check the configuration, optionally for one scenario
    Validate {
        /// Scenario whose required settings to check (all when omitted)
        #[arg(value_enum)]
        scenario: Option<Scenario>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_up_arguments() {
        let cli = Cli::try_parse_from([
            "nimbus",
            "up",
            "multi-cloud",
            "--jobs",
            "2",
            "--target",
            "namespace",
            "--fail",
            "demo-vpc",
        ])
        .unwrap();
        match cli.command {
            Command::Up(args) => {
                assert_eq!(args.scenario, Scenario::MultiCloud);
                assert_eq!(args.jobs, 2);
                assert_eq!(args.target.as_deref(), Some("namespace"));
                assert_eq!(args.fail, vec!["demo-vpc"]);
            }
            _ => panic!("expected up"),
        }
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        assert!(Cli::try_parse_from(["nimbus", "preview", "openshift"]).is_err());
    }
}
