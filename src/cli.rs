use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::RunOptions;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate a book into the destination repository.
    Run(RunArgs),
    /// Print what `run` would do with the same flags, then exit.
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Settings file (JSON, or YAML for `.yaml`/`.yml`).
    #[arg(long, short)]
    pub settings: PathBuf,

    /// Bookmap manifest (`.csv` or `.tsv`).
    #[arg(long = "input", short = 'i')]
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct PhaseArgs {
    /// Create placeholder modules.
    #[arg(long, short)]
    pub modules: bool,

    /// Create one workgroup per chapter to hold its placeholders.
    #[arg(long, short)]
    pub workgroups: bool,

    /// Copy source content into the placeholders.
    #[arg(long, short)]
    pub copy: bool,

    /// Edit roles on every copied module.
    #[arg(long, short, requires = "copy")]
    pub roles: bool,

    /// Accept pending role requests for the configured people.
    #[arg(long, short)]
    pub accept_roles: bool,

    /// Assemble the book collection.
    #[arg(long = "collection", short = 'o')]
    pub collection: bool,

    /// Group chapters into unit subcollections.
    #[arg(long, short)]
    pub units: bool,

    /// Publish every module after copying.
    #[arg(long, short)]
    pub publish: bool,

    /// Publish the collection once assembled.
    #[arg(long, requires = "collection")]
    pub publish_collection: bool,

    /// Restrict the run to these chapters (default: every chapter).
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub chapters: Vec<String>,

    /// Chapters to leave out.
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Log the plan without contacting the destination.
    #[arg(long)]
    pub dry_run: bool,
}

impl PhaseArgs {
    #[must_use]
    pub fn to_options(&self) -> RunOptions {
        RunOptions {
            modules: self.modules,
            workgroups: self.workgroups,
            copy: self.copy,
            roles: self.roles,
            accept_roles: self.accept_roles,
            collections: self.collection,
            units: self.units,
            publish: self.publish,
            publish_collection: self.publish_collection,
            dry_run: self.dry_run,
            chapters: chapter_list(&self.chapters),
            exclude: chapter_list(&self.exclude),
        }
    }
}

/// `--chapters "1, 2"` names chapters `1` and `2`; empty entries are dropped.
fn chapter_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub phases: PhaseArgs,

    /// Skip the confirmation prompt.
    #[arg(long, short)]
    pub yes: bool,

    /// Per-request timeout against the destination.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub phases: PhaseArgs,
}
