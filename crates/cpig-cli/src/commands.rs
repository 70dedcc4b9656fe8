use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cpig")]
#[command(about = "Catalog images by content hash and keep the catalog in step with its directory", long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ./.cpig_config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// List individual files instead of counts only
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the catalog database configured in db_path
    Create,
    /// Add individual files to the catalog
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Refuse files whose content is already catalogued under another path
        #[arg(long)]
        check_duplicates: bool,
    },
    /// Catalog every unregistered image below the catalog root
    Scan {
        /// Refuse files whose content is already catalogued under another path
        #[arg(long)]
        check_duplicates: bool,
    },
    /// Compare the catalog with the files on disk
    Check {
        /// Also list catalogued files that are missing on disk
        #[arg(long)]
        lost: bool,
    },
    /// Print catalog statistics
    Stats,
    /// List files sharing the same content
    Duplicates {
        /// Delete one copy per duplicate group (the one with the longest path)
        #[arg(long)]
        delete: bool,
        /// Skip the confirmation prompt
        #[arg(long, requires = "delete")]
        yes: bool,
    },
    /// Compute hashes for catalogued files that have none
    Rehash,
    /// Print configuration values
    PrintConfig,
    /// Write the default configuration to the config path
    MakeDefaultConfig,
}
