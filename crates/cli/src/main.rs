use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::report;
use cryptoscan_core::config;
use cryptoscan_core::config::AppConfig;
use cryptoscan_core::evaluator::Evaluator;
use cryptoscan_core::pipeline;
use cryptoscan_core::scanner::Scan;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report lines, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { root } => run_scan(cfg, root).await,
        Commands::Inspect { file } => run_inspect(cfg, file).await,
        Commands::Evaluate { root } => run_evaluate(cfg, root).await,
        Commands::Vulns {
            package,
            language,
            algorithm,
            installed,
        } => run_vulns(cfg, package, language, algorithm, installed).await,
    }
}

#[derive(Parser)]
#[command(name = "cryptoscan")]
#[command(about = "Classifies source files by the cryptography they implement or use", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every file under a folder
    Scan {
        /// Root folder to walk
        root: PathBuf,
    },
    /// Print the raw neighbors retrieved for one file
    Inspect {
        /// File to look up
        file: PathBuf,
    },
    /// Classify a labeled fixture tree and report accuracy
    Evaluate {
        /// Root folder whose sub-folders are named after categories
        #[arg(default_value = "examples")]
        root: PathBuf,
    },
    /// List a dependency's OSV advisories that affect an algorithm
    Vulns {
        /// Package name as published
        package: String,
        /// Project language (python, java, anything else means npm)
        language: String,
        /// Algorithm the advisories are checked against, e.g. RSA
        algorithm: String,
        /// Only report advisories listing this installed version
        #[arg(long)]
        installed: Option<String>,
    },
}

async fn run_scan(cfg: AppConfig, root: PathBuf) -> Result<()> {
    let classifier = pipeline::build_classifier(&cfg)?;
    let mut scan = Scan::new(&classifier, &root, &cfg.scan.exclude)?;
    while let Some(item) = scan.next().await {
        let item = item?;
        println!("{}", report::item_line(&item));
    }
    Ok(())
}

async fn run_inspect(cfg: AppConfig, file: PathBuf) -> Result<()> {
    let classifier = pipeline::build_classifier(&cfg)?;
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let raw = classifier.neighbors(&text).await?;
    println!("{}", report::neighbors_json(&raw)?);
    Ok(())
}

async fn run_evaluate(cfg: AppConfig, root: PathBuf) -> Result<()> {
    let classifier = pipeline::build_classifier(&cfg)?;
    let evaluation = pipeline::evaluate_tree(
        &classifier,
        &root,
        &cfg.scan.exclude,
        Evaluator::new(),
        |item| println!("{}", report::item_line(item)),
    )
    .await?;
    for line in report::evaluation_lines(&evaluation) {
        println!("{}", line);
    }
    Ok(())
}

async fn run_vulns(
    cfg: AppConfig,
    package: String,
    language: String,
    algorithm: String,
    installed: Option<String>,
) -> Result<()> {
    let checker = pipeline::build_vuln_checker(&cfg)?;
    let vulns = checker
        .affecting(&package, &language, &algorithm)
        .await
        .with_context(|| format!("Failed to check {} for {}", package, algorithm))?;
    for vuln in &vulns {
        for line in report::vuln_lines(&package, vuln, installed.as_deref()) {
            println!("{}", line);
        }
    }
    Ok(())
}
