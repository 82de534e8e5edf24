use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve a query against a loaded state and print its build order
    Query {
        /// `{src|bin|repo}:<loc>` selecting the state to query
        tpath: String,
        /// Source or provider names to seed the query with
        names: Vec<String>,
        /// Write the lifted graph in DOT form to this path
        #[arg(long)]
        dot: Option<Utf8PathBuf>,
        /// Print tiered output instead of a flat order
        #[arg(short, long)]
        tiers: bool,
        /// Forward neighborhood expansion depth
        #[arg(short = 'F', long, default_value_t = 0)]
        forward: usize,
        /// Reverse neighborhood expansion depth
        #[arg(short = 'R', long, default_value_t = 0)]
        reverse: usize,
        /// Render each node as `source{sub1, sub2}`
        #[arg(long)]
        show_sub: bool,
    },
    /// Diff two states and print per-source classification
    Diff {
        /// `{src|bin|repo}:<loc>` for the old state
        old: String,
        /// `{src|bin|repo}:<loc>` for the new state
        new: String,
        /// Report downgrades and conflicts as warnings rather than errors
        #[arg(short, long)]
        strict: bool,
    },
    /// Diff two states, compute the build order for changed sources, and
    /// submit them to a remote build controller
    Push {
        /// `{src|bin|repo}:<loc>` for the old state
        old: String,
        /// `{src|bin|repo}:<loc>` for the new state
        new: String,
        /// Restrict the push to these source names; default is every
        /// changed source
        names: Vec<String>,
        /// Ignore conflict/downgrade/unresolved safeties
        #[arg(short, long)]
        force: bool,
        /// Compute and print the order; do not submit
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// `git push` each recipe's repository before submitting
        #[arg(short = 'p', long)]
        push: bool,
        /// `user@host` of the build controller
        #[arg(long, default_value = "build-controller@build.getsol.us")]
        controller: String,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "recipeforge", author, about, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Be verbose. Specify twice to be more verbose
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging but errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}
