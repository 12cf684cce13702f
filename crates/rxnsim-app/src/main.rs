//! rxnsim binary - composition root.
//!
//! Runs one batch phase per invocation:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (flag > RUST_LOG > config)
//! 3. Dispatch to the requested phase and print its report

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rxnsim_core::config::SimConfig;
use rxnsim_vector::SearchHit;

use cli::{CliArgs, Command};
use commands::{GroupReport, RankedReaction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before the subscriber exists; its outcome is logged below.
    let config_file = args.resolve_config_path();
    let loaded = SimConfig::load(&config_file);

    let filter = match (&args.log_level, &loaded) {
        (Some(level), _) => EnvFilter::new(level),
        (None, Ok(config)) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        (None, Err(_)) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting rxnsim v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            SimConfig::default()
        }
    };

    let outcome = match args.command {
        Command::BuildIndex { vectors, output } => {
            commands::build_index(&config, vectors.as_deref(), output.as_deref()).map(|index| {
                println!(
                    "Indexed {} vectors of dimension {}",
                    index.size(),
                    index.dimension()
                );
            })
        }
        Command::Search { reaction, k } => commands::search_reaction(&config, &reaction, k)
            .map(|ranking| print_ranking(&reaction, &ranking)),
        Command::Probe { seed, k } => {
            commands::probe(&config, seed, k).map(|hits| print_hits(&hits))
        }
        Command::Matrix { output } => {
            commands::build_matrix(&config, output.as_deref()).map(|matrix| {
                println!("Computed {0}x{0} similarity matrix", matrix.size());
            })
        }
        Command::GroupStats {
            ec_prefix,
            materialized,
        } => commands::group_stats(&config, ec_prefix.as_deref(), materialized)
            .map(|report| print_group_report(&report)),
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "Command failed");
        return Err(e.into());
    }
    Ok(())
}

fn print_ranking(reaction: &str, ranking: &[RankedReaction]) {
    println!("Reactions most similar to {}:", reaction);
    for row in ranking {
        println!(
            "{:>4}  {:<10} {:<14} {:>8.5}  {}",
            row.rank, row.rxn_id, row.ec_number, row.score, row.name
        );
    }
}

fn print_hits(hits: &[SearchHit]) {
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>4}  vector {:<8} {:>8.5}", rank + 1, hit.id, hit.score);
    }
}

fn print_group_report(report: &GroupReport) {
    let c = &report.comparison;
    let source = if report.materialized {
        "full matrix"
    } else {
        "pair blocks"
    };
    println!(
        "EC {} ({} reactions vs {} others, from {})",
        report.ec_prefix, c.group_size, c.rest_size, source
    );
    println!(
        "  intra-group: mean {:.5}  std {:.5}  ({} pairs)",
        c.intra.mean, c.intra.std_dev, c.intra.count
    );
    println!(
        "  cross-group: mean {:.5}  std {:.5}  ({} pairs)",
        c.cross.mean, c.cross.std_dev, c.cross.count
    );
}
