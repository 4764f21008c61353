//! Rolemine unified CLI.
//!
//! Mines RBAC decompositions from user-permission datasets under a
//! per-role user cardinality ceiling.
//!
//! # Quick Start
//!
//! ```bash
//! # Greedy covering run, cap of 50 users per role
//! rolemine mine datasets/hc.txt --mur 50
//!
//! # Strict engine with reproducible splitting
//! rolemine strict datasets/hc.txt --mur 10 --seed 42
//!
//! # Retrofit the cap onto an existing decomposition
//! rolemine post decompositions/hc_fastMin.txt --mur 10
//!
//! # Full experiment sweep, LaTeX output
//! rolemine sweep datasets/hc.txt --murs 3,6,9 --latex
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Rolemine - cardinality-constrained RBAC role mining.
#[derive(Parser)]
#[command(name = "rolemine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one greedy covering variant on a user-permission dataset.
    Mine {
        /// Path to the dataset (one "user permission" pair per line).
        dataset: PathBuf,

        /// Seed policy (by-user, by-user-or-permission, by-full-row,
        /// by-residual-row-full-test).
        #[arg(short, long)]
        policy: Option<String>,

        /// Maximum users per role (0 = no cap).
        #[arg(short, long)]
        mur: Option<usize>,

        /// Merge users with identical permission rows before mining.
        #[arg(long)]
        collapse: bool,
    },

    /// Run the strict engine with online cardinality enforcement.
    Strict {
        /// Path to the dataset.
        dataset: PathBuf,

        /// Maximum users per role (0 = no cap).
        #[arg(short, long)]
        mur: Option<usize>,

        /// Matrix ranking seed users (full, residual).
        #[arg(long)]
        matrix: Option<String>,

        /// Seed selection criterion (min, max).
        #[arg(long)]
        criterion: Option<String>,

        /// RNG seed for reproducible splits.
        #[arg(long)]
        seed: Option<u64>,

        /// Prune redundant and unused roles from the mined decomposition.
        #[arg(long)]
        reduce: bool,
    },

    /// Retrofit the cap onto an existing role-block decomposition.
    Post {
        /// Path to the decomposition (role/permissions/users blocks).
        decomposition: PathBuf,

        /// Maximum users per role (0 = no cap).
        #[arg(short, long)]
        mur: Option<usize>,

        /// Skip redundant/unused role pruning before enforcement.
        #[arg(long)]
        no_prune: bool,
    },

    /// Run every variant across a list of MUR values and tabulate
    /// role counts, WSC, and timings.
    Sweep {
        /// Path to the dataset.
        dataset: PathBuf,

        /// MUR values to sweep, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        murs: Vec<usize>,

        /// Role-block decompositions to post-optimize at each MUR.
        #[arg(long, value_delimiter = ',')]
        decompositions: Vec<PathBuf>,

        /// Emit LaTeX tables instead of plain text.
        #[arg(long)]
        latex: bool,

        /// Write tables to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mine {
            dataset,
            policy,
            mur,
            collapse,
        } => commands::mine::run(&dataset, policy.as_deref(), mur, collapse),
        Commands::Strict {
            dataset,
            mur,
            matrix,
            criterion,
            seed,
            reduce,
        } => commands::strict::run(&dataset, mur, matrix.as_deref(), criterion.as_deref(), seed, reduce),
        Commands::Post {
            decomposition,
            mur,
            no_prune,
        } => commands::post::run(&decomposition, mur, !no_prune),
        Commands::Sweep {
            dataset,
            murs,
            decompositions,
            latex,
            output,
        } => commands::sweep::run(&dataset, &murs, &decompositions, latex, output.as_deref()),
    }
}
