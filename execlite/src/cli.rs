use clap::{Args, Parser, Subcommand, ValueEnum};
use execlite_core::Language;
use std::path::PathBuf;

/// execlite - run tool-calling code in a sandbox, get back a summary
#[derive(Parser, Debug)]
#[command(name = "execlite")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub paths: PathArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the configured locations.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Directory of tool schema JSON files (default: ./tools)
    #[arg(long, global = true, value_name = "DIR", env = "EXECLITE_TOOLS_DIR")]
    pub tools_dir: Option<PathBuf>,

    /// Root that tool file access is confined to (default: current directory)
    #[arg(long, global = true, value_name = "DIR", env = "EXECLITE_WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LanguageArg {
    #[value(alias = "ts")]
    Typescript,
    #[value(alias = "py")]
    Python,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Typescript => Language::TypeScript,
            LanguageArg::Python => Language::Python,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SandboxArg {
    Process,
    Vm,
    Container,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an intent through discovery, generation, validation and the sandbox
    Execute {
        /// What the program should accomplish
        #[arg(value_name = "INTENT", required_unless_present = "request")]
        intent: Option<String>,

        /// Target language of the generated program
        #[arg(long, short, value_enum, default_value = "typescript")]
        language: LanguageArg,

        /// Task body to run instead of the synthesized one. "-" reads stdin.
        #[arg(long, value_name = "FILE")]
        code: Option<String>,

        /// Full request as JSON ({intent, language, code?, options, approved}). "-" reads stdin.
        #[arg(long, value_name = "FILE", conflicts_with_all = ["intent", "code"])]
        request: Option<String>,

        /// Maximum number of tools bound into the program
        #[arg(long)]
        max_tools: Option<usize>,

        /// Execution timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Minimum isolation tier
        #[arg(long, value_enum)]
        sandbox: Option<SandboxArg>,

        /// Run even if validation requires approval
        #[arg(long, default_value = "false")]
        approve: bool,
    },

    /// Statically validate a program without running it
    Validate {
        /// Program file. "-" reads stdin.
        #[arg(value_name = "FILE")]
        file: String,

        /// Language; inferred from the file extension when omitted
        #[arg(long, short, value_enum)]
        language: Option<LanguageArg>,

        /// Output JSON instead of a report
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List indexed tools, optionally ranked against a query
    Tools {
        /// Rank tools against this text
        #[arg(long, short)]
        query: Option<String>,

        /// Maximum number of tools to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Output JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Reclaim orphaned sandboxes and stale session workspaces
    Cleanup {
        /// Also sweep labelled containers (requires docker)
        #[arg(long, default_value = "false")]
        containers: bool,

        /// Remove session workspaces older than this many seconds
        #[arg(long, value_name = "SECS")]
        max_age_secs: Option<u64>,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries
        #[arg(long, short, default_value = "20")]
        n: usize,
    },
}
