//! HTTP Expectation Mock - CLI Entry Point
//!
//! Validates expectation fixtures and checks recorded requests against them
//! offline.

use anyhow::Result;
use clap::Parser;
use http_expectation_mock::{Intercept, MockConfig, MockRequest};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "http-expectation-mock",
    about = "Check HTTP requests against expectation fixtures",
    version
)]
struct Args {
    /// Path to the expectation fixture
    #[arg(short, long, default_value = "expectations.yaml")]
    config: PathBuf,

    /// YAML list of requests to replay against the fixture
    #[arg(short, long)]
    requests: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print a sample fixture and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the fixture and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let sample = include_str!("../demos/expectations.yaml");
        println!("{}", sample);
        return Ok(());
    }

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    }
    info!(path = ?args.config, "Loading expectations");
    let config = MockConfig::from_file(&args.config)?;

    if args.validate {
        println!(
            "Configuration is valid ({} expectations defined)",
            config.expectations.len()
        );
        return Ok(());
    }

    let requests: Vec<MockRequest> = match &args.requests {
        Some(path) => {
            info!(path = ?path, "Loading requests");
            serde_yaml::from_str(&std::fs::read_to_string(path)?)?
        }
        None => Vec::new(),
    };

    let mut mock = config.build_mock()?;
    for request in &requests {
        let response = mock.intercept(request);
        println!(
            "{} {} -> {} {}",
            request.method,
            request.url,
            response.status,
            response.body_text()
        );
    }

    match mock.verify() {
        Ok(()) => {
            println!(
                "All {} expectations satisfied by {} requests",
                mock.expectations().len(),
                requests.len()
            );
            Ok(())
        }
        Err(e) => {
            for failure in e.failures() {
                eprintln!("- {}", failure);
            }
            anyhow::bail!("{} unsatisfied expectation(s)", e.failures().len())
        }
    }
}
