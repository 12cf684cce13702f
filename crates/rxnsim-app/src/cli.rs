//! CLI argument definitions for the rxnsim binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rxnsim - exact similarity search and group statistics over reaction
/// fingerprints.
#[derive(Parser, Debug)]
#[command(name = "rxnsim", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Batch phases. Each phase reads the artifacts of the previous one from the
/// paths in the configuration.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Normalize raw fingerprints and write the similarity index.
    BuildIndex {
        /// Raw vectors (JSON array of arrays). Defaults to `paths.vectors_file`.
        #[arg(long)]
        vectors: Option<PathBuf>,
        /// Output index file. Defaults to `paths.index_file`.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Rank all reactions by similarity to one reaction.
    Search {
        /// Reaction id, e.g. rxn00001.
        #[arg(short = 'r', long)]
        reaction: String,
        /// Number of neighbours. Defaults to `search.default_k`.
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },
    /// Search with a seeded random query vector.
    Probe {
        /// Defaults to `search.probe_seed`.
        #[arg(long)]
        seed: Option<u64>,
        /// Defaults to `search.probe_k`.
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },
    /// Compute and save the full pairwise similarity matrix.
    Matrix {
        /// Output matrix file. Defaults to `paths.matrix_file`.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Similarity within an EC group and between the group and the rest.
    GroupStats {
        /// EC number prefix. Defaults to `analysis.ec_prefix`.
        #[arg(long)]
        ec_prefix: Option<String>,
        /// Read values from the saved full matrix instead of computing the
        /// needed blocks.
        #[arg(long)]
        materialized: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > RXNSIM_CONFIG env var > ./rxnsim.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("RXNSIM_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("rxnsim.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let args =
            CliArgs::try_parse_from(["rxnsim", "search", "--reaction", "rxn00010", "-k", "5"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Search {
                reaction: "rxn00010".to_string(),
                k: Some(5)
            }
        );
        assert!(args.config.is_none());
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "rxnsim",
            "group-stats",
            "--ec-prefix",
            "2.7.",
            "--materialized",
            "-c",
            "/tmp/rxnsim.toml",
            "-l",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/rxnsim.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(
            args.command,
            Command::GroupStats {
                ec_prefix: Some("2.7.".to_string()),
                materialized: true
            }
        );
    }

    #[test]
    fn test_parse_defaults() {
        let args = CliArgs::try_parse_from(["rxnsim", "probe"]).unwrap();
        assert_eq!(args.command, Command::Probe { seed: None, k: None });

        let args = CliArgs::try_parse_from(["rxnsim", "build-index"]).unwrap();
        assert_eq!(
            args.command,
            Command::BuildIndex {
                vectors: None,
                output: None
            }
        );
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(CliArgs::try_parse_from(["rxnsim"]).is_err());
        assert!(CliArgs::try_parse_from(["rxnsim", "search"]).is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args =
            CliArgs::try_parse_from(["rxnsim", "-c", "custom.toml", "matrix"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("custom.toml"));
    }
}
