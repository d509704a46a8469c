//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "grievance",
    version,
    about = "Complaint triage: severity scoring and similarity clustering",
    long_about = "Grievance enriches free-text student complaints (formal rewrite, category, \
                  severity tier, embedding) and groups similar complaints into issue clusters \
                  for administrative triage."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/grievance/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a complaint through the full pipeline
    Submit {
        /// Complaint text
        text: String,

        /// Category chosen by the submitter (classified automatically when omitted)
        #[arg(long)]
        category: Option<String>,

        /// Submitter reference (anonymous when omitted)
        #[arg(long)]
        student_id: Option<String>,

        /// Print the stored complaint as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit one complaint per non-empty line of a file
    Import {
        /// Text file with one complaint per line
        file: PathBuf,
    },

    /// Score the severity of a text without storing it
    Severity {
        /// Text to score
        text: String,

        /// Show the rules behind the result
        #[arg(long)]
        explain: bool,
    },

    /// Inspect issue clusters
    Clusters {
        #[command(subcommand)]
        action: ClusterAction,
    },

    /// Run cluster maintenance jobs
    Maintain {
        #[command(subcommand)]
        action: MaintainAction,
    },

    /// Merge one cluster into another
    Merge {
        /// Cluster that is kept
        keep: i64,

        /// Cluster whose complaints move into KEEP; deleted afterwards
        absorb: i64,
    },

    /// Upvote a complaint
    Upvote {
        /// Complaint id
        id: i64,
    },

    /// Show dashboard statistics
    Stats {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClusterAction {
    /// List every cluster
    List {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show a cluster and its newest complaints
    Show {
        /// Cluster id
        id: i64,

        /// Maximum number of complaints to include
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },

    /// Clusters with the most new complaints in a recent window
    Trending {
        /// Window size in days
        #[arg(short, long, default_value = "7")]
        days: i64,

        /// Maximum number of clusters to return
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum MaintainAction {
    /// Recount members and delete empty clusters
    Update,

    /// Delete clusters whose stored count is zero
    Cleanup,

    /// Re-cluster every complaint
    Recalculate,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and severity lexicon
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
