//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use appimagelint::elf::IntrospectorKind;
use appimagelint::{Distro, SymbolFamily};

/// Check AppImages for compatibility with Linux distribution releases
#[derive(Parser)]
#[command(name = "appimagelint")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    /// Show debug messages
    #[arg(long, global = true)]
    pub debug: bool,

    /// Prefix log messages with timestamps
    #[arg(long, global = true)]
    pub log_timestamps: bool,

    /// Show source file and line of log messages
    #[arg(long, global = true)]
    pub log_source_location: bool,

    /// Use colors even when not writing to a terminal
    #[arg(long, global = true)]
    pub force_colors: bool,

    /// Never access the network; use cached or bundled data only
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(flatten)]
    pub check: CheckArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// AppImages or AppDirs to check
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Write a JSON report of all results to this file
    #[arg(long, value_name = "PATH")]
    pub json_report: Option<PathBuf>,

    /// Distribution to check against (default: all)
    #[arg(long = "distro", value_name = "DISTRO")]
    pub distros: Vec<Distro>,

    /// Check to run: glibc, glibcxx (default: all)
    #[arg(long = "check", value_name = "CHECK")]
    pub checks: Vec<SymbolFamily>,

    /// Number of parallel jobs for scanning binaries
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// ELF introspection backend: native, readelf
    #[arg(long, value_name = "BACKEND")]
    pub introspector: Option<IntrospectorKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the reference data cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Download every record now, ignoring freshness
    Update(CacheUpdateArgs),

    /// Show every record and its state
    List,

    /// Show the cache directory
    Path,

    /// Remove the user cache
    Clean,

    /// Show the digest records must carry to be valid
    Digest,
}

#[derive(Args)]
pub struct CacheUpdateArgs {
    /// Write to the bundled data directory instead of the user cache
    #[arg(long)]
    pub bundled: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
